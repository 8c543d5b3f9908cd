use std::collections::{BTreeSet, HashMap};

use super::*;
use crate::model::assignment::PlateSize;
use crate::model::deconvolution::DeconvolutionMethod;
use crate::model::params::InitStrategy;
use crate::model::peptide::{AMINO_ACIDS, Peptide};

fn well_count(plate_id: u32, well_id: impl Into<String>, spot_count: f64) -> SpotCount {
    SpotCount {
        pool_id: None,
        plate_id: Some(plate_id),
        well_id: Some(well_id.into()),
        spot_count,
    }
}

fn count_params(peptides_per_pool: usize, coverage: usize) -> GenerateParams {
    GenerateParams {
        peptides_per_pool,
        coverage,
        plate_size: PlateSize::Wells96,
        cluster_peptides: false,
        ..GenerateParams::default()
    }
}

fn pool_sets(design: &Design) -> HashMap<String, BTreeSet<u32>> {
    let mut out: HashMap<String, BTreeSet<u32>> = HashMap::new();
    for row in &design.assignments {
        out.entry(row.peptide_id.clone()).or_default().insert(row.pool_id);
    }
    out
}

/// 25 distinct 12-mers; peptide 6 differs from peptide 1 in its last residue
/// and peptide 16 from peptide 11.
fn similar_peptides() -> Vec<Peptide> {
    let alphabet = AMINO_ACIDS.as_bytes();
    let mut sequences = (0..25)
        .map(|i| {
            (0..12)
                .map(|k| alphabet[((i * 7919 + k * 104_729) ^ (i * k * 31)) % 20] as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>();
    for (source, copy) in [(0, 5), (10, 15)] {
        let mut s = sequences[source].clone();
        let last = if s.ends_with('W') { "Y" } else { "W" };
        s.replace_range(11..12, last);
        sequences[copy] = s;
    }
    sequences
        .into_iter()
        .enumerate()
        .map(|(i, s)| Peptide::new(format!("pep{}", i + 1), s))
        .collect()
}

fn copools(design: &Design, pairs: &[(String, String)]) -> usize {
    let sets = pool_sets(design);
    pairs
        .iter()
        .map(|(a, b)| sets[a].intersection(&sets[b]).count())
        .sum()
}

#[test]
fn test_generate_25_peptides_pool_5_coverage_3() {
    let design = generate(PeptideSource::Count(25), &count_params(5, 3)).unwrap();
    let meta = &design.metadata;
    assert_eq!(meta.num_pools_per_coverage, vec![5, 5, 5]);
    assert_eq!(meta.num_pools, 15);
    assert_eq!(meta.num_extra_pools, 0);
    assert_eq!(meta.num_plates, Some(1));
    assert!(meta.converged, "{meta:?}");
    assert!(!meta.cluster_peptides);
    assert_eq!(design.assignments.len(), 75);
    assert_eq!(design.bench_ready.len(), 15);

    let sets = pool_sets(&design);
    assert_eq!(sets.len(), 25);
    for (id, pools) in &sets {
        assert_eq!(pools.len(), 3, "{id}");
        let rows = design.assignments.iter().filter(|a| &a.peptide_id == id).count();
        assert_eq!(rows, 3);
    }
    let distinct = sets.values().collect::<BTreeSet<_>>();
    assert_eq!(distinct.len(), 25);

    for row in &design.assignments {
        assert!((1..=15).contains(&row.pool_id));
        assert_eq!(row.plate_id, Some(1));
        let round_start = (row.coverage_id - 1) * 5;
        assert!(row.pool_id > round_start && row.pool_id <= round_start + 5);
    }
}

#[test]
fn test_every_init_strategy_converges() {
    for strategy in [InitStrategy::Greedy, InitStrategy::Random, InitStrategy::Repeat] {
        let params = GenerateParams {
            init_strategy: strategy,
            ..count_params(5, 3)
        };
        let design = generate(PeptideSource::Count(25), &params).unwrap();
        assert!(design.metadata.converged, "{strategy:?}");
        assert!(design.metadata.warnings.is_empty(), "{strategy:?}");
    }
}

#[test]
fn test_pool_larger_than_input_is_infeasible() {
    let err = generate(PeptideSource::Count(3), &count_params(5, 1)).unwrap_err();
    assert_eq!(err.kind(), "infeasible_design");
}

#[test]
fn test_generate_is_deterministic_for_a_seed() {
    let peptides = similar_peptides();
    let params = GenerateParams {
        cluster_peptides: true,
        ..count_params(5, 3)
    };
    let a = generate(PeptideSource::Sequences(peptides.clone()), &params).unwrap();
    let b = generate(PeptideSource::Sequences(peptides), &params).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_clustering_never_increases_similar_copools() {
    let peptides = similar_peptides();
    let params = GenerateParams {
        cluster_peptides: true,
        similarity_threshold: 0.9,
        ..count_params(5, 3)
    };
    let clustered = generate(PeptideSource::Sequences(peptides.clone()), &params).unwrap();
    let unclustered = generate(
        PeptideSource::Sequences(peptides),
        &GenerateParams {
            cluster_peptides: false,
            ..params.clone()
        },
    )
    .unwrap();

    assert!(clustered.metadata.cluster_peptides);
    assert!(clustered.metadata.converged);
    assert!(unclustered.preferred_pairs.is_empty());
    let pairs = clustered
        .preferred_pairs
        .iter()
        .map(|p| (p.peptide_1_id.clone(), p.peptide_2_id.clone()))
        .collect::<Vec<_>>();
    assert!(pairs.contains(&("pep1".to_string(), "pep6".to_string())));
    assert!(pairs.contains(&("pep11".to_string(), "pep16".to_string())));
    assert_eq!(clustered.metadata.num_preferred_pairs, pairs.len());

    assert_eq!(copools(&clustered, &pairs), 0);
    assert!(copools(&clustered, &pairs) <= copools(&unclustered, &pairs));
}

#[test]
fn test_do_not_assign_reports_no_plates() {
    let params = GenerateParams {
        plate_size: PlateSize::DoNotAssign,
        ..count_params(5, 3)
    };
    let design = generate(PeptideSource::Count(25), &params).unwrap();
    assert_eq!(design.metadata.num_plates, None);
    assert_eq!(design.metadata.plate_size, "do_not_assign");
    let json = serde_json::to_value(&design.metadata).unwrap();
    assert_eq!(json["num_plates"], -1);
}

#[test]
fn test_exhausted_budget_is_flagged_not_fatal() {
    let params = GenerateParams {
        init_strategy: InitStrategy::Repeat,
        max_iterations: 0,
        ..count_params(5, 3)
    };
    let design = generate(PeptideSource::Count(25), &params).unwrap();
    assert!(!design.metadata.converged);
    assert_eq!(design.metadata.num_duplicate_signatures, 20);
    assert!(design.metadata.warnings.iter().any(|w| matches!(
        w,
        DesignWarning::PartialConvergence {
            iterations: 0,
            duplicate_signatures: 20,
            ..
        }
    )));
}

#[test]
fn test_extra_pools_reported_in_metadata() {
    let params = GenerateParams {
        allow_extra_pools: true,
        ..count_params(5, 1)
    };
    let design = generate(PeptideSource::Count(10), &params).unwrap();
    assert!(design.metadata.converged);
    assert_eq!(design.metadata.num_pools_per_coverage, vec![10]);
    assert_eq!(design.metadata.num_extra_pools, 8);
    assert_eq!(design.metadata.num_pools, 10);
}

#[test]
fn test_pools_opened_during_repair_show_in_metadata() {
    let params = GenerateParams {
        init_strategy: InitStrategy::Repeat,
        max_iterations: 0,
        allow_extra_pools: true,
        ..count_params(5, 3)
    };
    let design = generate(PeptideSource::Count(25), &params).unwrap();
    let meta = &design.metadata;
    assert!(meta.converged);
    assert_eq!(meta.num_pools_per_coverage, vec![5, 5, 9]);
    assert_eq!(meta.num_extra_pools, 4);
    assert_eq!(meta.num_pools, 19);
    assert_eq!(design.bench_ready.len(), 19);
}

fn grid_assignments() -> Vec<Assignment> {
    let mut rows = Vec::new();
    for i in 0..9u32 {
        let (r, c) = (i / 3, i % 3);
        for (round, pool) in [r + 1, c + 4, (r + c) % 3 + 7].into_iter().enumerate() {
            rows.push(Assignment {
                peptide_id: format!("P{}", i + 1),
                peptide_sequence: String::new(),
                pool_id: pool,
                coverage_id: round as u32 + 1,
                plate_id: Some(1),
                well_id: Some(format!("A{pool}")),
            });
        }
    }
    rows
}

fn grid_counts(positive: &[u32]) -> Vec<SpotCount> {
    (1..=9)
        .map(|p| well_count(1, format!("A{p}"), if positive.contains(&p) { 250.0 } else { 5.0 }))
        .collect()
}

fn deconvolve_params(min_coverage: usize, min_positive_spot_count: f64) -> DeconvolveParams {
    DeconvolveParams {
        method: DeconvolutionMethod::Cem,
        min_coverage,
        min_positive_spot_count,
    }
}

#[test]
fn test_deconvolve_single_hit_summary() {
    let out = deconvolve(&grid_assignments(), &grid_counts(&[1, 4, 7]), &deconvolve_params(3, 200.0))
        .unwrap();
    assert_eq!(out.results.len(), 9);
    assert_eq!(out.results[0].result, HitLabel::ConfidentHit);
    let s = &out.summary;
    assert_eq!(s.method, DeconvolutionMethod::Cem);
    assert_eq!(s.num_peptides, 9);
    assert_eq!(s.num_wells, 9);
    assert_eq!(s.num_positive_wells, 3);
    assert_eq!(s.num_confident_hits, 1);
    assert_eq!(s.num_candidate_hits, 0);
    assert!(s.converged);
}

#[test]
fn test_deconvolve_is_idempotent() {
    let assignments = grid_assignments();
    let counts = grid_counts(&[1, 4, 7, 2, 5]);
    for method in [
        DeconvolutionMethod::Cem,
        DeconvolutionMethod::Em,
        DeconvolutionMethod::Empirical,
        DeconvolutionMethod::Lasso,
    ] {
        let params = DeconvolveParams {
            method,
            ..deconvolve_params(3, 200.0)
        };
        let a = deconvolve(&assignments, &counts, &params).unwrap();
        let b = deconvolve(&assignments, &counts, &params).unwrap();
        assert_eq!(a, b, "{method:?}");
    }
}

#[test]
fn test_raising_spot_threshold_is_monotone() {
    let assignments = grid_assignments();
    let mut counts = grid_counts(&[1, 4, 7]);
    counts[1].spot_count = 120.0;
    counts[4].spot_count = 60.0;
    let mut previous_wells = usize::MAX;
    let mut previous_hits = usize::MAX;
    for threshold in [1.0, 10.0, 50.0, 100.0, 200.0, 300.0] {
        let out = deconvolve(&assignments, &counts, &deconvolve_params(1, threshold)).unwrap();
        let hits = out.results.iter().filter(|r| r.result.is_hit()).count();
        assert!(out.summary.num_positive_wells <= previous_wells, "threshold {threshold}");
        assert!(hits <= previous_hits, "threshold {threshold}");
        previous_wells = out.summary.num_positive_wells;
        previous_hits = hits;
    }
    assert_eq!(previous_wells, 0);
}

#[test]
fn test_generated_design_round_trips_through_deconvolution() {
    let design = generate(PeptideSource::Count(25), &count_params(5, 3)).unwrap();
    let hit_pools = design
        .assignments
        .iter()
        .filter(|a| a.peptide_id == "peptide_7")
        .map(|a| a.pool_id)
        .collect::<BTreeSet<_>>();
    let counts = design
        .bench_ready
        .iter()
        .map(|pool| {
            well_count(
                pool.plate_id.unwrap(),
                pool.well_id.clone().unwrap(),
                if hit_pools.contains(&pool.pool_id) { 250.0 } else { 3.0 },
            )
        })
        .collect::<Vec<_>>();

    let out = deconvolve(&design.assignments, &counts, &deconvolve_params(3, 200.0)).unwrap();
    for result in &out.results {
        if result.peptide_id == "peptide_7" {
            assert!(result.result.is_hit());
            assert_eq!(result.hit_well_ids_count, 3);
        } else {
            assert_eq!(result.result, HitLabel::Negative, "{}", result.peptide_id);
        }
    }
}

fn pool_count(pool_id: u32, spot_count: f64) -> SpotCount {
    SpotCount {
        pool_id: Some(pool_id),
        plate_id: None,
        well_id: None,
        spot_count,
    }
}

#[test]
fn test_unplaced_design_deconvolves_by_pool_id() {
    let params = GenerateParams {
        plate_size: PlateSize::DoNotAssign,
        ..count_params(5, 3)
    };
    let design = generate(PeptideSource::Count(25), &params).unwrap();
    assert!(design.assignments.iter().all(|a| a.well_id.is_none()));
    let hit_pools = design
        .assignments
        .iter()
        .filter(|a| a.peptide_id == "peptide_12")
        .map(|a| a.pool_id)
        .collect::<BTreeSet<_>>();
    let counts = (1..=design.metadata.num_pools as u32)
        .map(|pool| pool_count(pool, if hit_pools.contains(&pool) { 250.0 } else { 3.0 }))
        .collect::<Vec<_>>();

    let out = deconvolve(&design.assignments, &counts, &deconvolve_params(3, 200.0)).unwrap();
    assert_eq!(out.summary.num_wells, 15);
    assert_eq!(out.summary.num_positive_wells, 3);
    for result in &out.results {
        if result.peptide_id == "peptide_12" {
            assert!(result.result.is_hit());
            assert_eq!(result.hit_pool_ids, hit_pools.iter().copied().collect::<Vec<_>>());
            assert!(result.hit_well_ids.iter().all(|w| w.starts_with("pool-")));
        } else {
            assert_eq!(result.result, HitLabel::Negative, "{}", result.peptide_id);
        }
    }
}

#[test]
fn test_deconvolve_reports_mismatch() {
    let mut counts = grid_counts(&[]);
    counts.remove(3);
    let err = deconvolve(&grid_assignments(), &counts, &DeconvolveParams::default()).unwrap_err();
    assert_eq!(err.kind(), "deconvolution_input_mismatch");
}
