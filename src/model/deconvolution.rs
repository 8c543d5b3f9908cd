use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ElispotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitLabel {
    ConfidentHit,
    CandidateHit,
    Negative,
}

impl HitLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            HitLabel::ConfidentHit => "confident_hit",
            HitLabel::CandidateHit => "candidate_hit",
            HitLabel::Negative => "negative",
        }
    }

    pub fn is_hit(self) -> bool {
        !matches!(self, HitLabel::Negative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeconvolutionMethod {
    Cem,
    Em,
    Empirical,
    Lasso,
}

impl DeconvolutionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DeconvolutionMethod::Cem => "cem",
            DeconvolutionMethod::Em => "em",
            DeconvolutionMethod::Empirical => "empirical",
            DeconvolutionMethod::Lasso => "lasso",
        }
    }
}

impl FromStr for DeconvolutionMethod {
    type Err = ElispotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cem" | "constrained_em" => Ok(DeconvolutionMethod::Cem),
            "em" => Ok(DeconvolutionMethod::Em),
            "empirical" => Ok(DeconvolutionMethod::Empirical),
            "lasso" => Ok(DeconvolutionMethod::Lasso),
            other => Err(ElispotError::invalid_parameter(
                "method",
                other,
                "expected one of cem, em, empirical, lasso",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeconvolutionResult {
    pub peptide_id: String,
    pub peptide_sequence: String,
    pub hit_well_ids: Vec<String>,
    pub hit_well_ids_count: usize,
    pub hit_pool_ids: Vec<u32>,
    pub hit_pool_spot_counts: Vec<f64>,
    pub estimated_peptide_spot_count: f64,
    pub result: HitLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeconvolutionSummary {
    pub method: DeconvolutionMethod,
    pub min_coverage: usize,
    pub min_positive_spot_count: f64,
    pub num_peptides: usize,
    pub num_wells: usize,
    pub num_positive_wells: usize,
    pub background_spot_count: f64,
    pub iterations: usize,
    pub converged: bool,
    pub num_confident_hits: usize,
    pub num_candidate_hits: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deconvolution {
    pub results: Vec<DeconvolutionResult>,
    pub summary: DeconvolutionSummary,
}
