use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::ElispotError;
use crate::model::design::DesignWarning;
use crate::model::params::GenerateParams;
use crate::model::peptide::{Peptide, PeptideSource, synthetic_peptides};
use crate::similarity::{validate_peptide, validate_threshold};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignPlan {
    pub num_peptides: usize,
    pub peptides_per_pool: usize,
    pub coverage: usize,
    pub base_pools_per_round: usize,
    pub pools_per_round: usize,
}

impl DesignPlan {
    pub fn extra_pools_per_round(&self) -> usize {
        self.pools_per_round - self.base_pools_per_round
    }
}

#[derive(Debug, Clone)]
pub struct Stage1Output {
    pub peptides: Vec<Peptide>,
    pub plan: DesignPlan,
    pub clustering: bool,
    pub warnings: Vec<DesignWarning>,
}

pub fn run_stage1(
    source: PeptideSource,
    params: &GenerateParams,
) -> Result<Stage1Output, ElispotError> {
    if params.peptides_per_pool == 0 {
        return Err(ElispotError::invalid_parameter(
            "num_peptides_per_pool",
            params.peptides_per_pool,
            "must be at least 1",
        ));
    }
    if params.coverage == 0 {
        return Err(ElispotError::invalid_parameter(
            "num_coverage",
            params.coverage,
            "must be at least 1",
        ));
    }

    let mut warnings = Vec::new();
    let has_sequences = source.has_sequences();
    let peptides = match source {
        PeptideSource::Sequences(peptides) => peptides,
        PeptideSource::Count(n) => synthetic_peptides(n),
    };
    if peptides.is_empty() {
        return Err(ElispotError::invalid_parameter(
            "num_peptides",
            0,
            "at least one peptide is required",
        ));
    }

    let mut seen = HashSet::with_capacity(peptides.len());
    for peptide in &peptides {
        if !seen.insert(peptide.id.as_str()) {
            return Err(ElispotError::DuplicatePeptideId(peptide.id.clone()));
        }
        if has_sequences {
            validate_peptide(peptide)?;
        }
    }

    let clustering = params.cluster_peptides && has_sequences;
    if params.cluster_peptides && !has_sequences {
        warn!("peptide clustering requested without sequences; clustering disabled");
        warnings.push(DesignWarning::ClusteringSkipped {
            reason: "peptide sequences are not available".to_string(),
        });
    }
    if clustering {
        validate_threshold(params.similarity_threshold, params.similarity_function)?;
    }

    let plan = plan_pools(
        peptides.len(),
        params.peptides_per_pool,
        params.coverage,
        params.allow_extra_pools,
    )?;
    info!(
        num_peptides = plan.num_peptides,
        pools_per_round = plan.pools_per_round,
        extra_pools_per_round = plan.extra_pools_per_round(),
        coverage = plan.coverage,
        "design plan ready"
    );

    Ok(Stage1Output {
        peptides,
        plan,
        clustering,
        warnings,
    })
}

/// Number of distinct pool combinations with `pools` pools in each of
/// `coverage` rounds.
pub fn num_signatures(pools: usize, coverage: usize) -> u128 {
    (pools as u128).saturating_pow(coverage.min(u32::MAX as usize) as u32)
}

pub fn plan_pools(
    num_peptides: usize,
    peptides_per_pool: usize,
    coverage: usize,
    allow_extra_pools: bool,
) -> Result<DesignPlan, ElispotError> {
    let base = num_peptides.div_ceil(peptides_per_pool);
    let mut pools = base;
    if num_signatures(pools, coverage) < num_peptides as u128 {
        if !allow_extra_pools {
            return Err(ElispotError::InfeasibleDesign {
                num_peptides,
                pools_per_coverage: base,
                coverage,
                num_signatures: num_signatures(base, coverage),
            });
        }
        while num_signatures(pools, coverage) < num_peptides as u128 {
            pools += 1;
        }
        warn!(
            base_pools = base,
            pools_per_round = pools,
            "adding extra pools per round so every peptide can get a unique pool set"
        );
    }
    Ok(DesignPlan {
        num_peptides,
        peptides_per_pool,
        coverage,
        base_pools_per_round: base,
        pools_per_round: pools,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_validate.rs"]
mod tests;
