use crate::model::deconvolution::{DeconvolutionResult, DeconvolutionSummary, HitLabel};
use crate::model::design::{DesignMetadata, DesignWarning};
use crate::model::peptide::PreferredPeptidePair;
use crate::pipeline::verify::VerificationReport;
use crate::report::format_f64_6;

const MAX_LISTED: usize = 10;

pub fn render_design_report(meta: &DesignMetadata, pairs: &[PreferredPeptidePair]) -> String {
    let mut out = String::new();

    out.push_str("ELISpot Pool Design Report\n");
    out.push_str("==========================\n\n");

    out.push_str("1. Layout\n");
    out.push_str(&format!("Peptides: {}\n", meta.num_peptides));
    out.push_str(&format!("Peptides per pool: {}\n", meta.num_peptides_per_pool));
    out.push_str(&format!("Coverage: {}\n", meta.num_coverage));
    out.push_str(&format!(
        "Pools per coverage round: {}\n",
        meta.num_pools_per_coverage
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    out.push_str(&format!(
        "Total pools: {} ({} extra)\n",
        meta.num_pools, meta.num_extra_pools
    ));
    match meta.num_plates {
        Some(n) => out.push_str(&format!("Plates: {n} x {} wells\n\n", meta.plate_size)),
        None => out.push_str("Plates: not assigned\n\n"),
    }

    out.push_str("2. Similar peptides\n");
    if meta.cluster_peptides {
        out.push_str(&format!(
            "Function: {} (threshold {})\n",
            meta.similarity_function.as_str(),
            format_f64_6(meta.similarity_threshold)
        ));
        out.push_str(&format!("Pairs kept apart: {}\n", pairs.len()));
        for pair in pairs.iter().take(MAX_LISTED) {
            out.push_str(&format!(
                "  {} / {}: {}\n",
                pair.peptide_1_id,
                pair.peptide_2_id,
                format_f64_6(pair.similarity_score)
            ));
        }
        if pairs.len() > MAX_LISTED {
            out.push_str(&format!("  ... {} more\n", pairs.len() - MAX_LISTED));
        }
    } else {
        out.push_str("Clustering disabled\n");
    }
    out.push('\n');

    out.push_str("3. Optimization\n");
    out.push_str(&format!(
        "Initialization: {} (seed {})\n",
        meta.initialization_strategy.as_str(),
        meta.random_seed
    ));
    out.push_str(&format!(
        "Iterations: {} of {}\n",
        meta.iterations_used, meta.max_iterations
    ));
    out.push_str(&format!(
        "Converged: {}\n",
        if meta.converged { "yes" } else { "no" }
    ));
    out.push_str(&format!(
        "Duplicate pool sets: {}\nSimilar pairs sharing a pool: {}\nPairs sharing more than one pool: {}\n",
        meta.num_duplicate_signatures, meta.num_similar_copools, meta.num_repeat_pairings
    ));
    for warning in &meta.warnings {
        out.push_str(&format!("Warning: {}\n", warning_text(warning)));
    }

    out
}

fn warning_text(warning: &DesignWarning) -> String {
    match warning {
        DesignWarning::PartialConvergence {
            iterations,
            duplicate_signatures,
            similar_copools,
        } => format!(
            "stopped after {iterations} iterations with {duplicate_signatures} duplicate pool sets and {similar_copools} similar co-pooled pairs"
        ),
        DesignWarning::ClusteringSkipped { reason } => format!("clustering skipped: {reason}"),
    }
}

pub fn render_deconvolution_report(
    summary: &DeconvolutionSummary,
    results: &[DeconvolutionResult],
) -> String {
    let mut out = String::new();

    out.push_str("ELISpot Deconvolution Report\n");
    out.push_str("============================\n\n");

    out.push_str("1. Readout\n");
    out.push_str(&format!(
        "Wells: {} ({} positive at >= {} spots)\n",
        summary.num_wells,
        summary.num_positive_wells,
        format_f64_6(summary.min_positive_spot_count)
    ));
    out.push_str(&format!("Peptides: {}\n", summary.num_peptides));
    out.push_str(&format!("Minimum coverage: {}\n\n", summary.min_coverage));

    out.push_str("2. Estimation\n");
    out.push_str(&format!("Method: {}\n", summary.method.as_str()));
    out.push_str(&format!(
        "Background spot count: {}\n",
        format_f64_6(summary.background_spot_count)
    ));
    out.push_str(&format!(
        "Iterations: {} (converged: {})\n\n",
        summary.iterations,
        if summary.converged { "yes" } else { "no" }
    ));

    out.push_str("3. Hits\n");
    out.push_str(&format!(
        "Confident: {}\nCandidate: {}\n",
        summary.num_confident_hits, summary.num_candidate_hits
    ));
    for label in [HitLabel::ConfidentHit, HitLabel::CandidateHit] {
        for r in results.iter().filter(|r| r.result == label) {
            out.push_str(&format!(
                "  {} {} est={} wells={}\n",
                label.as_str(),
                r.peptide_id,
                format_f64_6(r.estimated_peptide_spot_count),
                r.hit_well_ids.join(",")
            ));
        }
    }

    out
}

pub fn render_verification_report(report: &VerificationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Peptides: {}\nPools: {}\nPair violation score: {}\nMost pools shared by a pair: {}\n",
        report.num_peptides, report.num_pools, report.pair_violation_score, report.max_shared_pools
    ));
    for check in &report.checks {
        out.push_str(&format!(
            "[{}] {}\n",
            if check.passed { "PASS" } else { "FAIL" },
            check.name
        ));
        for detail in check.details.iter().take(MAX_LISTED) {
            out.push_str(&format!("  {detail}\n"));
        }
        if check.details.len() > MAX_LISTED {
            out.push_str(&format!("  ... {} more\n", check.details.len() - MAX_LISTED));
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/text.rs"]
mod tests;
