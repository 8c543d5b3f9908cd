pub mod identify;
pub mod stage1_validate;
pub mod stage2_similarity;
pub mod stage3_init;
pub mod stage4_repair;
pub mod stage5_plates;
pub mod stage6_positive;
pub mod stage7_estimate;
pub mod stage8_classify;
pub mod verify;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::error::ElispotError;
use crate::model::assignment::Assignment;
use crate::model::deconvolution::{Deconvolution, DeconvolutionSummary, HitLabel};
use crate::model::design::{Design, DesignMetadata, DesignWarning};
use crate::model::params::{DeconvolveParams, GenerateParams};
use crate::model::peptide::PeptideSource;
use crate::model::readout::SpotCount;
use stage1_validate::run_stage1;
use stage2_similarity::run_stage2;
use stage3_init::{Stage3Inputs, run_stage3};
use stage4_repair::{Stage4Inputs, run_stage4};
use stage5_plates::{Stage5Inputs, run_stage5};
use stage6_positive::run_stage6;
use stage7_estimate::run_stage7;
use stage8_classify::{Stage8Inputs, run_stage8};

/// Builds a pooled-peptide design. The same inputs and seed always give the
/// same design.
pub fn generate(source: PeptideSource, params: &GenerateParams) -> Result<Design, ElispotError> {
    let stage1 = run_stage1(source, params)?;
    let stage2 = run_stage2(&stage1.peptides, stage1.clustering, params)?;

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let grid = run_stage3(
        &Stage3Inputs {
            plan: &stage1.plan,
            flagged: &stage2.flagged,
            strategy: params.init_strategy,
        },
        &mut rng,
    );
    let stage4 = run_stage4(
        grid,
        &Stage4Inputs {
            flagged: &stage2.flagged,
            max_iterations: params.max_iterations,
            allow_extra_pools: params.allow_extra_pools,
        },
        &mut rng,
    );
    let stage5 = run_stage5(&Stage5Inputs {
        peptides: &stage1.peptides,
        grid: &stage4.grid,
        plate_size: params.plate_size,
    });

    let stats = stage4.stats;
    let converged = stats.hard_violations() == 0;
    let mut warnings = stage1.warnings;
    if !converged {
        warn!(
            iterations = stage4.iterations,
            duplicate_signatures = stats.duplicate_signatures,
            similar_copools = stats.similar_copools,
            "pool assignment did not fully converge"
        );
        warnings.push(DesignWarning::PartialConvergence {
            iterations: stage4.iterations,
            duplicate_signatures: stats.duplicate_signatures,
            similar_copools: stats.similar_copools,
        });
    }

    let plan = &stage1.plan;
    let metadata = DesignMetadata {
        num_peptides: plan.num_peptides,
        num_peptides_per_pool: plan.peptides_per_pool,
        num_coverage: plan.coverage,
        num_pools_per_coverage: stage4.grid.pools_per_round.clone(),
        num_pools: stage4.grid.total_pools(),
        num_extra_pools: plan.extra_pools_per_round() * plan.coverage + stage4.extra_pools_added,
        plate_size: params.plate_size.label(),
        num_plates: stage5.num_plates,
        cluster_peptides: stage1.clustering,
        similarity_function: params.similarity_function,
        similarity_threshold: params.similarity_threshold,
        num_preferred_pairs: stage2.preferred_pairs.len(),
        max_iterations: params.max_iterations,
        iterations_used: stage4.iterations,
        initialization_strategy: params.init_strategy,
        allow_extra_pools: params.allow_extra_pools,
        random_seed: params.seed,
        converged,
        num_duplicate_signatures: stats.duplicate_signatures,
        num_similar_copools: stats.similar_copools,
        num_repeat_pairings: stats.repeat_pairings,
        warnings,
    };

    Ok(Design {
        assignments: stage5.assignments,
        bench_ready: stage5.bench_ready,
        metadata,
        preferred_pairs: stage2.preferred_pairs,
    })
}

/// Deconvolves per-well spot counts into per-peptide hit calls.
pub fn deconvolve(
    assignments: &[Assignment],
    spot_counts: &[SpotCount],
    params: &DeconvolveParams,
) -> Result<Deconvolution, ElispotError> {
    let table = run_stage6(assignments, spot_counts, params.min_positive_spot_count)?;
    let estimates = run_stage7(&table, params.method, params.min_positive_spot_count);
    let results = run_stage8(&Stage8Inputs {
        table: &table,
        estimates: &estimates,
        min_coverage: params.min_coverage,
        min_positive_spot_count: params.min_positive_spot_count,
    });

    let count = |label: HitLabel| results.iter().filter(|r| r.result == label).count();
    let summary = DeconvolutionSummary {
        method: params.method,
        min_coverage: params.min_coverage,
        min_positive_spot_count: params.min_positive_spot_count,
        num_peptides: table.peptides.len(),
        num_wells: table.wells.len(),
        num_positive_wells: table.num_positive_wells(),
        background_spot_count: estimates.background,
        iterations: estimates.iterations,
        converged: estimates.converged,
        num_confident_hits: count(HitLabel::ConfidentHit),
        num_candidate_hits: count(HitLabel::CandidateHit),
    };
    info!(
        method = params.method.as_str(),
        wells = summary.num_wells,
        positive_wells = summary.num_positive_wells,
        hits = results.iter().filter(|r| r.result.is_hit()).count(),
        "deconvolution finished"
    );
    Ok(Deconvolution { results, summary })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/tests.rs"]
mod tests;
