use rayon::prelude::*;
use tracing::{debug, info};

use crate::model::deconvolution::DeconvolutionMethod;
use crate::model::params::{EM_MAX_ITERATIONS, EM_TOLERANCE, LASSO_PENALTY_SCALE};
use crate::pipeline::stage6_positive::PoolTable;
use crate::report::median;

const EM_FLOOR: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub struct Estimates {
    pub values: Vec<f64>,
    pub background: f64,
    pub iterations: usize,
    pub converged: bool,
}

pub fn run_stage7(
    table: &PoolTable,
    method: DeconvolutionMethod,
    min_positive_spot_count: f64,
) -> Estimates {
    let estimates = match method {
        DeconvolutionMethod::Cem => {
            let support = (0..table.peptides.len())
                .map(|i| table.positive_count(i) > 0)
                .collect::<Vec<_>>();
            poisson_em(table, &support)
        }
        DeconvolutionMethod::Em => poisson_em(table, &vec![true; table.peptides.len()]),
        DeconvolutionMethod::Empirical => empirical(table),
        DeconvolutionMethod::Lasso => {
            lasso(table, LASSO_PENALTY_SCALE * min_positive_spot_count)
        }
    };
    info!(
        method = method.as_str(),
        background = estimates.background,
        iterations = estimates.iterations,
        converged = estimates.converged,
        "peptide spot counts estimated"
    );
    estimates
}

fn has_converged(change: f64, values: &[f64], background: f64) -> bool {
    let scale = values.iter().copied().fold(background.max(1.0), f64::max);
    change <= EM_TOLERANCE * scale
}

/// Poisson maximum-likelihood EM for `y_j = b + sum_i A_ji x_i`, with `x_i`
/// fixed at zero outside `support`.
fn poisson_em(table: &PoolTable, support: &[bool]) -> Estimates {
    let n = table.peptides.len();
    let num_wells = table.wells.len();
    if num_wells == 0 {
        return Estimates {
            values: vec![0.0; n],
            background: 0.0,
            iterations: 0,
            converged: true,
        };
    }
    let y = table.wells.iter().map(|w| w.spot_count).collect::<Vec<_>>();

    let mut x = (0..n)
        .map(|i| {
            if !support[i] || table.peptide_wells[i].is_empty() {
                return 0.0;
            }
            let share = table.peptide_wells[i]
                .iter()
                .map(|&j| y[j] / table.well_peptides[j].len() as f64)
                .sum::<f64>()
                / table.peptide_wells[i].len() as f64;
            share.max(EM_FLOOR)
        })
        .collect::<Vec<_>>();
    let mut b = y.iter().copied().fold(f64::INFINITY, f64::min).max(EM_FLOOR);

    let mut iterations = 0;
    let mut converged = false;
    while iterations < EM_MAX_ITERATIONS {
        iterations += 1;
        let ratio = (0..num_wells)
            .map(|j| {
                let mu = b + table.well_peptides[j].iter().map(|&i| x[i]).sum::<f64>();
                if mu > 0.0 { y[j] / mu } else { 0.0 }
            })
            .collect::<Vec<_>>();

        let next_x = (0..n)
            .into_par_iter()
            .map(|i| {
                let wells = &table.peptide_wells[i];
                if !support[i] || wells.is_empty() {
                    return 0.0;
                }
                let sum = wells.iter().map(|&j| ratio[j]).sum::<f64>();
                x[i] * sum / wells.len() as f64
            })
            .collect::<Vec<_>>();
        let next_b = b * ratio.iter().sum::<f64>() / num_wells as f64;

        let mut change = (next_b - b).abs();
        for (old, new) in x.iter().zip(next_x.iter()) {
            change = change.max((new - old).abs());
        }
        x = next_x;
        b = next_b;
        if has_converged(change, &x, b) {
            converged = true;
            break;
        }
    }
    debug!(iterations, converged, "em finished");

    Estimates {
        values: x,
        background: b,
        iterations,
        converged,
    }
}

/// Mean share of each positive well, split between the peptides in it that
/// sit in at least one positive well.
fn empirical(table: &PoolTable) -> Estimates {
    let n = table.peptides.len();
    let candidates = (0..n)
        .map(|i| table.positive_count(i) > 0)
        .collect::<Vec<_>>();
    let values = (0..n)
        .map(|i| {
            let positive = table.positive_wells(i).collect::<Vec<_>>();
            if positive.is_empty() {
                return 0.0;
            }
            positive
                .iter()
                .map(|&j| {
                    let sharing = table.well_peptides[j]
                        .iter()
                        .filter(|&&p| candidates[p])
                        .count()
                        .max(1);
                    table.wells[j].spot_count / sharing as f64
                })
                .sum::<f64>()
                / positive.len() as f64
        })
        .collect::<Vec<_>>();
    let negatives = table
        .wells
        .iter()
        .filter(|w| !w.positive)
        .map(|w| w.spot_count)
        .collect::<Vec<_>>();
    Estimates {
        values,
        background: median(&negatives),
        iterations: 0,
        converged: true,
    }
}

/// Non-negative lasso with an unpenalised, non-negative background, solved by
/// cyclic coordinate descent.
fn lasso(table: &PoolTable, penalty: f64) -> Estimates {
    let n = table.peptides.len();
    let num_wells = table.wells.len();
    if num_wells == 0 {
        return Estimates {
            values: vec![0.0; n],
            background: 0.0,
            iterations: 0,
            converged: true,
        };
    }
    let mut x = vec![0.0; n];
    let mut b = table.wells.iter().map(|w| w.spot_count).sum::<f64>() / num_wells as f64;
    let mut residual = table
        .wells
        .iter()
        .map(|w| w.spot_count - b)
        .collect::<Vec<_>>();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < EM_MAX_ITERATIONS {
        iterations += 1;
        let mut change: f64 = 0.0;
        for i in 0..n {
            let wells = &table.peptide_wells[i];
            if wells.is_empty() {
                continue;
            }
            let count = wells.len() as f64;
            let rho = wells.iter().map(|&j| residual[j]).sum::<f64>() + count * x[i];
            let next = ((rho - penalty) / count).max(0.0);
            let delta = next - x[i];
            if delta != 0.0 {
                for &j in wells {
                    residual[j] -= delta;
                }
                x[i] = next;
                change = change.max(delta.abs());
            }
        }
        let next_b = (b + residual.iter().sum::<f64>() / num_wells as f64).max(0.0);
        let delta = next_b - b;
        if delta != 0.0 {
            for r in residual.iter_mut() {
                *r -= delta;
            }
            b = next_b;
            change = change.max(delta.abs());
        }
        if has_converged(change, &x, b) {
            converged = true;
            break;
        }
    }
    debug!(iterations, converged, penalty, "lasso finished");

    Estimates {
        values: x,
        background: b,
        iterations,
        converged,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage7_estimate.rs"]
mod tests;
