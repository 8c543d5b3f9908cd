use super::*;
use crate::model::assignment::Assignment;
use crate::model::deconvolution::DeconvolutionMethod;
use crate::model::readout::SpotCount;
use crate::pipeline::stage6_positive::{PeptideEntry, WellObservation, run_stage6};
use crate::pipeline::stage7_estimate::run_stage7;

fn well_count(plate_id: u32, well_id: impl Into<String>, spot_count: f64) -> SpotCount {
    SpotCount {
        pool_id: None,
        plate_id: Some(plate_id),
        well_id: Some(well_id.into()),
        spot_count,
    }
}

fn grid_table(positive: &[u32], min_positive_spot_count: f64) -> PoolTable {
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
    let spots = (1..=9)
        .map(|p| well_count(1, format!("A{p}"), if positive.contains(&p) { 250.0 } else { 5.0 }))
        .collect::<Vec<_>>();
    run_stage6(&rows, &spots, min_positive_spot_count).unwrap()
}

fn classify_grid(
    positive: &[u32],
    method: DeconvolutionMethod,
    min_coverage: usize,
    min_positive_spot_count: f64,
) -> Vec<DeconvolutionResult> {
    let table = grid_table(positive, min_positive_spot_count);
    let estimates = run_stage7(&table, method, min_positive_spot_count);
    run_stage8(&Stage8Inputs {
        table: &table,
        estimates: &estimates,
        min_coverage,
        min_positive_spot_count,
    })
}

fn labels(results: &[DeconvolutionResult]) -> Vec<HitLabel> {
    results.iter().map(|r| r.result).collect()
}

#[test]
fn test_single_hit_is_confident() {
    for method in [
        DeconvolutionMethod::Cem,
        DeconvolutionMethod::Em,
        DeconvolutionMethod::Lasso,
    ] {
        let results = classify_grid(&[1, 4, 7], method, 3, 200.0);
        assert_eq!(results[0].result, HitLabel::ConfidentHit, "{method:?}");
        assert!(results[1..].iter().all(|r| r.result == HitLabel::Negative));
    }
}

#[test]
fn test_empirical_single_hit_is_candidate() {
    let results = classify_grid(&[1, 4, 7], DeconvolutionMethod::Empirical, 3, 200.0);
    assert_eq!(results[0].result, HitLabel::CandidateHit);
}

#[test]
fn test_hit_rows_report_positive_wells() {
    let results = classify_grid(&[1, 4, 7], DeconvolutionMethod::Cem, 3, 200.0);
    let hit = &results[0];
    assert_eq!(hit.peptide_id, "P1");
    assert_eq!(hit.hit_well_ids, vec!["1-A1", "1-A4", "1-A7"]);
    assert_eq!(hit.hit_well_ids_count, 3);
    assert_eq!(hit.hit_pool_ids, vec![1, 4, 7]);
    assert_eq!(hit.hit_pool_spot_counts, vec![250.0, 250.0, 250.0]);

    let p2 = &results[1];
    assert_eq!(p2.hit_well_ids, vec!["1-A1"]);
    assert_eq!(p2.result, HitLabel::Negative);
}

#[test]
fn test_two_of_three_positive_pools_is_negative() {
    // P5 sits in pools 2, 5 and 9; only 2 and 5 read high.
    for method in [
        DeconvolutionMethod::Cem,
        DeconvolutionMethod::Em,
        DeconvolutionMethod::Empirical,
        DeconvolutionMethod::Lasso,
    ] {
        let results = classify_grid(&[1, 4, 7, 2, 5], method, 3, 200.0);
        assert!(results[0].result.is_hit(), "{method:?}");
        assert_eq!(results[4].hit_well_ids_count, 2);
        assert_eq!(results[4].result, HitLabel::Negative, "{method:?}");
    }
}

#[test]
fn test_raising_min_coverage_never_adds_hits() {
    let mut previous = usize::MAX;
    for min_coverage in 0..=4 {
        let results = classify_grid(&[1, 4, 7, 2, 5], DeconvolutionMethod::Cem, min_coverage, 200.0);
        let hits = results.iter().filter(|r| r.result.is_hit()).count();
        assert!(hits <= previous, "min_coverage {min_coverage}");
        previous = hits;
    }
    assert_eq!(previous, 0);
}

#[test]
fn test_zero_min_coverage_still_needs_a_positive_pool() {
    let results = classify_grid(&[1, 4, 7], DeconvolutionMethod::Cem, 0, 200.0);
    assert_eq!(results[4].result, HitLabel::Negative);
    assert!(results[1].result.is_hit());
}

fn shared_well_table() -> PoolTable {
    PoolTable {
        peptides: vec![
            PeptideEntry {
                id: "a".to_string(),
                sequence: String::new(),
            },
            PeptideEntry {
                id: "b".to_string(),
                sequence: String::new(),
            },
        ],
        wells: vec![WellObservation {
            pool_id: 1,
            plate_id: None,
            well_id: None,
            spot_count: 300.0,
            positive: true,
        }],
        peptide_wells: vec![vec![0], vec![0]],
        well_peptides: vec![vec![0, 1]],
    }
}

fn estimates(values: Vec<f64>, background: f64) -> Estimates {
    Estimates {
        values,
        background,
        iterations: 1,
        converged: true,
    }
}

#[test]
fn test_shared_wells_only_give_candidates() {
    let table = shared_well_table();
    let est = estimates(vec![290.0, 0.0], 10.0);
    let results = run_stage8(&Stage8Inputs {
        table: &table,
        estimates: &est,
        min_coverage: 1,
        min_positive_spot_count: 200.0,
    });
    assert_eq!(labels(&results), vec![HitLabel::CandidateHit, HitLabel::CandidateHit]);
    // The pool was never placed on a plate, so it is named by pool id.
    assert_eq!(results[0].hit_well_ids, vec!["pool-1"]);
    assert_eq!(results[0].hit_pool_ids, vec![1]);
}

#[test]
fn test_low_estimate_is_candidate() {
    let mut table = shared_well_table();
    table.peptides.truncate(1);
    table.peptide_wells.truncate(1);
    table.well_peptides = vec![vec![0]];

    let below_threshold = estimates(vec![150.0], 10.0);
    let results = run_stage8(&Stage8Inputs {
        table: &table,
        estimates: &below_threshold,
        min_coverage: 1,
        min_positive_spot_count: 200.0,
    });
    assert_eq!(results[0].result, HitLabel::CandidateHit);

    let below_background = estimates(vec![250.0], 260.0);
    let results = run_stage8(&Stage8Inputs {
        table: &table,
        estimates: &below_background,
        min_coverage: 1,
        min_positive_spot_count: 200.0,
    });
    assert_eq!(results[0].result, HitLabel::CandidateHit);

    let clear = estimates(vec![250.0], 10.0);
    let results = run_stage8(&Stage8Inputs {
        table: &table,
        estimates: &clear,
        min_coverage: 1,
        min_positive_spot_count: 200.0,
    });
    assert_eq!(results[0].result, HitLabel::ConfidentHit);
}
