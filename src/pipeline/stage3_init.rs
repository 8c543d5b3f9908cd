use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::model::design::{PairCounts, PairKey, PoolGrid, pair_key};
use crate::model::params::{DUPLICATE_WEIGHT, InitStrategy, REPEAT_WEIGHT, SIMILAR_WEIGHT};
use crate::pipeline::stage1_validate::DesignPlan;

#[derive(Debug, Clone)]
pub struct Stage3Inputs<'a> {
    pub plan: &'a DesignPlan,
    pub flagged: &'a HashSet<PairKey>,
    pub strategy: InitStrategy,
}

pub fn run_stage3(inputs: &Stage3Inputs<'_>, rng: &mut ChaCha8Rng) -> PoolGrid {
    let plan = inputs.plan;
    let mut grid = PoolGrid::new(
        plan.num_peptides,
        plan.coverage,
        plan.pools_per_round,
        plan.peptides_per_pool,
    );
    match inputs.strategy {
        InitStrategy::Greedy => fill_greedy(&mut grid, inputs.flagged),
        InitStrategy::Random => fill_random(&mut grid, rng),
        InitStrategy::Repeat => fill_repeat(&mut grid),
    }
    grid
}

fn fill_greedy(grid: &mut PoolGrid, flagged: &HashSet<PairKey>) {
    let n = grid.num_peptides();
    let rounds = grid.num_rounds();
    let capacity = grid.capacity;
    let mut pairs = PairCounts::default();

    for round in 0..rounds {
        let pools = grid.pools_per_round[round];
        let last = round + 1 == rounds;
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); pools];
        let mut completed: HashSet<Vec<usize>> = HashSet::new();

        for peptide in 0..n {
            let mut best: Option<(i64, usize, usize)> = None;
            for (pool, current) in members.iter().enumerate() {
                if current.len() >= capacity {
                    continue;
                }
                let mut cost = 0i64;
                for &other in current {
                    cost += REPEAT_WEIGHT * pairs.get(peptide, other) as i64;
                    if flagged.contains(&pair_key(peptide, other)) {
                        cost += SIMILAR_WEIGHT;
                    }
                }
                if last {
                    let mut signature = grid.membership[peptide].clone();
                    signature.push(pool);
                    if completed.contains(&signature) {
                        cost += DUPLICATE_WEIGHT;
                    }
                }
                let key = (cost, current.len(), pool);
                if best.is_none_or(|b| key < b) {
                    best = Some(key);
                }
            }
            // pools * capacity >= n, so some pool always has room.
            let pool = best.map_or(0, |(_, _, pool)| pool);
            for &other in &members[pool] {
                pairs.increment(peptide, other);
            }
            members[pool].push(peptide);
            grid.membership[peptide].push(pool);
            if last {
                completed.insert(grid.membership[peptide].clone());
            }
        }
    }
}

fn fill_random(grid: &mut PoolGrid, rng: &mut ChaCha8Rng) {
    let mut order = (0..grid.num_peptides()).collect::<Vec<_>>();
    for round in 0..grid.num_rounds() {
        let pools = grid.pools_per_round[round];
        order.shuffle(rng);
        for (position, &peptide) in order.iter().enumerate() {
            grid.membership[peptide].push(position % pools);
        }
    }
}

fn fill_repeat(grid: &mut PoolGrid) {
    for round in 0..grid.num_rounds() {
        let pools = grid.pools_per_round[round];
        for (peptide, signature) in grid.membership.iter_mut().enumerate() {
            signature.push(peptide % pools);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_init.rs"]
mod tests;
