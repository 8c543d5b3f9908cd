use super::*;
use crate::model::assignment::Assignment;
use crate::model::readout::SpotCount;
use crate::pipeline::stage6_positive::run_stage6;

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

#[test]
fn test_cem_recovers_single_hit() {
    let table = grid_table(&[1, 4, 7], 200.0);
    let est = run_stage7(&table, DeconvolutionMethod::Cem, 200.0);
    assert!(est.converged);
    assert!(est.values[0] > 240.0, "{:?}", est.values);
    for (i, v) in est.values.iter().enumerate().skip(1) {
        assert!(*v < 10.0, "peptide {i}: {v}");
    }
    // P5 and P9 sit in no positive pool.
    assert_eq!(est.values[4], 0.0);
    assert_eq!(est.values[8], 0.0);
}

#[test]
fn test_em_matches_cem_when_support_is_unused() {
    let table = grid_table(&[1, 4, 7], 200.0);
    let cem = run_stage7(&table, DeconvolutionMethod::Cem, 200.0);
    let em = run_stage7(&table, DeconvolutionMethod::Em, 200.0);
    assert!((cem.values[0] - em.values[0]).abs() < 1.0);
    assert!(em.values[4] < 1.0);
}

#[test]
fn test_lasso_shrinks_towards_zero() {
    let table = grid_table(&[1, 4, 7], 200.0);
    let est = run_stage7(&table, DeconvolutionMethod::Lasso, 200.0);
    assert!(est.converged);
    assert!(est.values[0] > 200.0 && est.values[0] < 245.0, "{:?}", est.values);
    assert!(est.values[1..].iter().all(|v| *v == 0.0));
    assert!(est.background >= 0.0);
}

#[test]
fn test_empirical_splits_positive_wells() {
    let table = grid_table(&[1, 4, 7], 200.0);
    let est = run_stage7(&table, DeconvolutionMethod::Empirical, 200.0);
    assert_eq!(est.iterations, 0);
    assert!((est.values[0] - 250.0 / 3.0).abs() < 1e-9);
    assert!((est.values[1] - 250.0 / 3.0).abs() < 1e-9);
    assert_eq!(est.values[4], 0.0);
    assert_eq!(est.background, 5.0);
}

#[test]
fn test_estimates_are_reproducible() {
    let table = grid_table(&[1, 4, 7, 2, 5], 200.0);
    for method in [
        DeconvolutionMethod::Cem,
        DeconvolutionMethod::Em,
        DeconvolutionMethod::Empirical,
        DeconvolutionMethod::Lasso,
    ] {
        let a = run_stage7(&table, method, 200.0);
        let b = run_stage7(&table, method, 200.0);
        assert_eq!(a, b, "{method:?}");
    }
}

#[test]
fn test_no_positive_wells_gives_no_signal() {
    let table = grid_table(&[], 200.0);
    let est = run_stage7(&table, DeconvolutionMethod::Cem, 200.0);
    assert!(est.values.iter().all(|v| *v == 0.0));
    assert!((est.background - 5.0).abs() < 1e-6);
}

#[test]
fn test_empirical_background_is_median_of_negative_wells() {
    let mut table = grid_table(&[1, 4, 7, 2, 5], 200.0);
    // Negative pools 3, 6, 8 and 9, read at 1, 2, 4 and 10 spots.
    for (pool, spots) in [(3, 1.0), (6, 2.0), (8, 4.0), (9, 10.0)] {
        table.wells[pool - 1].spot_count = spots;
    }
    let est = run_stage7(&table, DeconvolutionMethod::Empirical, 200.0);
    assert_eq!(est.background, 3.0);
}
