use std::path::PathBuf;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::ElispotError;
use crate::model::assignment::PlateSize;
use crate::model::params::{
    DEFAULT_COVERAGE, DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_COVERAGE,
    DEFAULT_MIN_POSITIVE_SPOT_COUNT, DEFAULT_PEPTIDES_PER_POOL, DEFAULT_RANDOM_SEED,
    DEFAULT_SIMILARITY_THRESHOLD, DeconvolveParams, GenerateParams,
};
use crate::model::peptide::{Peptide, PeptideSource};
use crate::report::columnar::{ColumnarTable, from_columnar};

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Generate(GenerateRequest),
    Deconvolve(DeconvolveRequest),
    Identify(IdentifyRequest),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PeptidesField {
    Rows(Vec<Peptide>),
    Columnar(ColumnarTable),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PlateSizeField {
    Wells(u64),
    Label(String),
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default = "default_yes", deserialize_with = "yes_no")]
    pub sequences_available: bool,
    #[serde(default)]
    pub peptides: Option<PeptidesField>,
    #[serde(default)]
    pub num_peptides: Option<usize>,
    #[serde(default = "default_peptides_per_pool")]
    pub num_peptides_per_pool: usize,
    #[serde(default = "default_coverage")]
    pub num_coverage: usize,
    #[serde(default)]
    pub plate_size: Option<PlateSizeField>,
    #[serde(default = "default_yes", deserialize_with = "yes_no")]
    pub cluster_peptides: bool,
    #[serde(default)]
    pub similarity_function: Option<String>,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub initialization_strategy: Option<String>,
    #[serde(default, deserialize_with = "yes_no")]
    pub allow_extra_pools: bool,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
}

#[derive(Debug, Deserialize)]
pub struct DeconvolveRequest {
    pub assignments: ColumnarTable,
    pub spot_counts: ColumnarTable,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default = "default_min_coverage")]
    pub min_coverage: usize,
    #[serde(default = "default_min_positive_spot_count")]
    pub min_positive_spot_count: f64,
}

#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    pub counts_path: PathBuf,
    pub configuration_path: PathBuf,
    #[serde(default = "default_min_positive_spot_count")]
    pub min_positive_spot_count: f64,
}

fn default_yes() -> bool {
    true
}

fn default_peptides_per_pool() -> usize {
    DEFAULT_PEPTIDES_PER_POOL
}

fn default_coverage() -> usize {
    DEFAULT_COVERAGE
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_random_seed() -> u64 {
    DEFAULT_RANDOM_SEED
}

fn default_min_coverage() -> usize {
    DEFAULT_MIN_COVERAGE
}

fn default_min_positive_spot_count() -> f64 {
    DEFAULT_MIN_POSITIVE_SPOT_COUNT
}

/// Accepts JSON booleans or the strings "yes"/"no" (and "true"/"false").
fn yes_no<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }
    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" => Ok(true),
            "no" | "n" | "false" => Ok(false),
            other => Err(D::Error::custom(format!("expected yes or no, got {other:?}"))),
        },
    }
}

pub fn parse_plate_size(field: Option<&PlateSizeField>) -> Result<PlateSize, ElispotError> {
    match field {
        None => Ok(PlateSize::Wells96),
        Some(PlateSizeField::Wells(n)) => n.to_string().parse(),
        Some(PlateSizeField::Label(s)) => s.parse(),
    }
}

impl GenerateRequest {
    pub fn into_parts(self) -> Result<(PeptideSource, GenerateParams), ElispotError> {
        let params = GenerateParams {
            peptides_per_pool: self.num_peptides_per_pool,
            coverage: self.num_coverage,
            plate_size: parse_plate_size(self.plate_size.as_ref())?,
            cluster_peptides: self.cluster_peptides,
            similarity_function: match &self.similarity_function {
                Some(name) => name.parse()?,
                None => GenerateParams::default().similarity_function,
            },
            similarity_threshold: self.similarity_threshold,
            max_iterations: self.max_iterations,
            init_strategy: match &self.initialization_strategy {
                Some(name) => name.parse()?,
                None => GenerateParams::default().init_strategy,
            },
            allow_extra_pools: self.allow_extra_pools,
            seed: self.random_seed,
        };

        let peptides = match self.peptides {
            Some(PeptidesField::Rows(rows)) => rows,
            Some(PeptidesField::Columnar(table)) => from_columnar(&table)?,
            None => Vec::new(),
        };
        let source = if self.sequences_available {
            if peptides.is_empty() {
                return Err(ElispotError::invalid_parameter(
                    "peptides",
                    "[]",
                    "sequences_available is set but no peptides were given",
                ));
            }
            PeptideSource::Sequences(peptides)
        } else {
            let count = self.num_peptides.unwrap_or(peptides.len());
            PeptideSource::Count(count)
        };
        Ok((source, params))
    }
}

impl DeconvolveRequest {
    pub fn params(&self) -> Result<DeconvolveParams, ElispotError> {
        let mut params = DeconvolveParams {
            min_coverage: self.min_coverage,
            min_positive_spot_count: self.min_positive_spot_count,
            ..DeconvolveParams::default()
        };
        if let Some(method) = &self.method {
            params.method = method.parse()?;
        }
        Ok(params)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/request.rs"]
mod tests;
