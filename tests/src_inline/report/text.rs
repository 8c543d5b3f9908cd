use super::*;
use crate::model::deconvolution::DeconvolutionMethod;
use crate::model::params::InitStrategy;
use crate::pipeline::verify::ConstraintCheck;
use crate::similarity::SimilarityFunction;

fn metadata() -> DesignMetadata {
    DesignMetadata {
        num_peptides: 25,
        num_peptides_per_pool: 5,
        num_coverage: 3,
        num_pools_per_coverage: vec![5, 5, 5],
        num_pools: 15,
        num_extra_pools: 0,
        plate_size: "96".to_string(),
        num_plates: Some(1),
        cluster_peptides: true,
        similarity_function: SimilarityFunction::Euclidean,
        similarity_threshold: 0.7,
        num_preferred_pairs: 1,
        max_iterations: 2000,
        iterations_used: 12,
        initialization_strategy: InitStrategy::Greedy,
        allow_extra_pools: false,
        random_seed: 42,
        converged: false,
        num_duplicate_signatures: 1,
        num_similar_copools: 0,
        num_repeat_pairings: 4,
        warnings: vec![DesignWarning::PartialConvergence {
            iterations: 12,
            duplicate_signatures: 1,
            similar_copools: 0,
        }],
    }
}

#[test]
fn test_design_report_sections() {
    let pairs = vec![PreferredPeptidePair {
        peptide_1_id: "p1".to_string(),
        peptide_1_sequence: "SIINFEKL".to_string(),
        peptide_2_id: "p2".to_string(),
        peptide_2_sequence: "SIINFEKM".to_string(),
        similarity_score: 0.95,
    }];
    let text = render_design_report(&metadata(), &pairs);
    assert!(text.contains("1. Layout"));
    assert!(text.contains("Pools per coverage round: 5, 5, 5"));
    assert!(text.contains("Total pools: 15 (0 extra)"));
    assert!(text.contains("Plates: 1 x 96 wells"));
    assert!(text.contains("p1 / p2: 0.950000"));
    assert!(text.contains("Converged: no"));
    assert!(text.contains("Warning: stopped after 12 iterations"));
}

#[test]
fn test_design_report_without_clustering_or_plates() {
    let meta = DesignMetadata {
        cluster_peptides: false,
        num_plates: None,
        warnings: Vec::new(),
        ..metadata()
    };
    let text = render_design_report(&meta, &[]);
    assert!(text.contains("Clustering disabled"));
    assert!(text.contains("Plates: not assigned"));
    assert!(!text.contains("Warning:"));
}

#[test]
fn test_deconvolution_report_lists_hits() {
    let summary = DeconvolutionSummary {
        method: DeconvolutionMethod::Cem,
        min_coverage: 3,
        min_positive_spot_count: 200.0,
        num_peptides: 2,
        num_wells: 6,
        num_positive_wells: 3,
        background_spot_count: 0.4,
        iterations: 40,
        converged: true,
        num_confident_hits: 1,
        num_candidate_hits: 0,
    };
    let results = vec![DeconvolutionResult {
        peptide_id: "p1".to_string(),
        peptide_sequence: String::new(),
        hit_well_ids: vec!["A1".to_string(), "A4".to_string()],
        hit_well_ids_count: 2,
        hit_pool_ids: vec![1, 4],
        hit_pool_spot_counts: vec![250.0, 250.0],
        estimated_peptide_spot_count: 245.0,
        result: HitLabel::ConfidentHit,
    }];
    let text = render_deconvolution_report(&summary, &results);
    assert!(text.contains("Wells: 6 (3 positive at >= 200.000000 spots)"));
    assert!(text.contains("Method: cem"));
    assert!(text.contains("confident_hit p1 est=245.000000 wells=A1,A4"));
}

#[test]
fn test_verification_report_truncates_details() {
    let report = VerificationReport {
        num_peptides: 4,
        num_pools: 4,
        pair_violation_score: 2,
        max_shared_pools: 2,
        checks: vec![ConstraintCheck {
            name: "unique_pool_sets",
            passed: false,
            details: (0..12).map(|i| format!("detail {i}")).collect(),
        }],
    };
    let text = render_verification_report(&report);
    assert!(text.contains("Most pools shared by a pair: 2"));
    assert!(text.contains("[FAIL] unique_pool_sets"));
    assert!(text.contains("  detail 9\n"));
    assert!(!text.contains("detail 10"));
    assert!(text.contains("... 2 more"));
}
