use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ElispotError;
use crate::model::assignment::PlateSize;
use crate::model::deconvolution::DeconvolutionMethod;
use crate::similarity::SimilarityFunction;

pub const DEFAULT_PEPTIDES_PER_POOL: usize = 5;
pub const DEFAULT_COVERAGE: usize = 3;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_ITERATIONS: usize = 2000;
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Repair cost weights: duplicate pool sets outrank co-pooled similar
/// peptides, which outrank pairs sharing more than one pool.
pub const DUPLICATE_WEIGHT: i64 = 1000;
pub const SIMILAR_WEIGHT: i64 = 100;
pub const REPEAT_WEIGHT: i64 = 1;

pub const DEFAULT_MIN_COVERAGE: usize = 3;
pub const DEFAULT_MIN_POSITIVE_SPOT_COUNT: f64 = 20.0;

/// Estimate, as a multiple of the positivity threshold, a hit needs to be
/// called confident.
pub const CONFIDENT_SPOT_MULTIPLE: f64 = 1.0;
pub const EM_MAX_ITERATIONS: usize = 1000;
pub const EM_TOLERANCE: f64 = 1e-6;
pub const LASSO_PENALTY_SCALE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStrategy {
    Greedy,
    Random,
    Repeat,
}

impl InitStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            InitStrategy::Greedy => "greedy",
            InitStrategy::Random => "random",
            InitStrategy::Repeat => "repeat",
        }
    }
}

impl FromStr for InitStrategy {
    type Err = ElispotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greedy" => Ok(InitStrategy::Greedy),
            "random" => Ok(InitStrategy::Random),
            "repeat" => Ok(InitStrategy::Repeat),
            other => Err(ElispotError::invalid_parameter(
                "initialization_strategy",
                other,
                "expected one of greedy, random, repeat",
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub peptides_per_pool: usize,
    pub coverage: usize,
    pub plate_size: PlateSize,
    pub cluster_peptides: bool,
    pub similarity_function: SimilarityFunction,
    pub similarity_threshold: f64,
    pub max_iterations: usize,
    pub init_strategy: InitStrategy,
    pub allow_extra_pools: bool,
    pub seed: u64,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            peptides_per_pool: DEFAULT_PEPTIDES_PER_POOL,
            coverage: DEFAULT_COVERAGE,
            plate_size: PlateSize::Wells96,
            cluster_peptides: true,
            similarity_function: SimilarityFunction::Euclidean,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            init_strategy: InitStrategy::Greedy,
            allow_extra_pools: false,
            seed: DEFAULT_RANDOM_SEED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeconvolveParams {
    pub method: DeconvolutionMethod,
    pub min_coverage: usize,
    pub min_positive_spot_count: f64,
}

impl Default for DeconvolveParams {
    fn default() -> Self {
        Self {
            method: DeconvolutionMethod::Cem,
            min_coverage: DEFAULT_MIN_COVERAGE,
            min_positive_spot_count: DEFAULT_MIN_POSITIVE_SPOT_COUNT,
        }
    }
}
