use std::collections::HashSet;

use tracing::info;

use crate::error::ElispotError;
use crate::model::design::{PairKey, pair_key};
use crate::model::params::GenerateParams;
use crate::model::peptide::{Peptide, PreferredPeptidePair};
use crate::similarity::{preferred_pairs, similar_index_pairs};

#[derive(Debug, Clone, Default)]
pub struct Stage2Output {
    pub preferred_pairs: Vec<PreferredPeptidePair>,
    pub flagged: HashSet<PairKey>,
}

pub fn run_stage2(
    peptides: &[Peptide],
    clustering: bool,
    params: &GenerateParams,
) -> Result<Stage2Output, ElispotError> {
    if !clustering {
        return Ok(Stage2Output::default());
    }
    let pairs = similar_index_pairs(
        peptides,
        params.similarity_threshold,
        params.similarity_function,
    )?;
    let flagged = pairs.iter().map(|&(i, j, _)| pair_key(i, j)).collect();
    info!(
        function = params.similarity_function.as_str(),
        threshold = params.similarity_threshold,
        pairs = pairs.len(),
        "similar peptide pairs flagged"
    );
    Ok(Stage2Output {
        preferred_pairs: preferred_pairs(peptides, &pairs),
        flagged,
    })
}
