use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::model::design::{PairCounts, PairKey, PoolGrid, pair_key};
use crate::model::params::{DUPLICATE_WEIGHT, REPEAT_WEIGHT, SIMILAR_WEIGHT};

const PROGRESS_EVERY: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConflictStats {
    pub duplicate_signatures: usize,
    pub similar_copools: usize,
    pub repeat_pairings: usize,
}

impl ConflictStats {
    pub fn cost(&self) -> i64 {
        DUPLICATE_WEIGHT * self.duplicate_signatures as i64
            + SIMILAR_WEIGHT * self.similar_copools as i64
            + REPEAT_WEIGHT * self.repeat_pairings as i64
    }

    pub fn hard_violations(&self) -> usize {
        self.duplicate_signatures + self.similar_copools
    }
}

pub fn conflict_stats(grid: &PoolGrid, flagged: &HashSet<PairKey>) -> ConflictStats {
    let pairs = PairCounts::from_grid(grid);
    let distinct = grid
        .membership
        .iter()
        .map(|s| s.as_slice())
        .collect::<HashSet<_>>()
        .len();
    ConflictStats {
        duplicate_signatures: grid.num_peptides() - distinct,
        similar_copools: flagged.iter().map(|&(a, b)| pairs.get(a, b) as usize).sum(),
        repeat_pairings: pairs.repeat_pairings(),
    }
}

#[derive(Debug, Clone)]
pub struct Stage4Inputs<'a> {
    pub flagged: &'a HashSet<PairKey>,
    pub max_iterations: usize,
    pub allow_extra_pools: bool,
}

#[derive(Debug, Clone)]
pub struct Stage4Output {
    pub grid: PoolGrid,
    pub iterations: usize,
    pub stats: ConflictStats,
    pub extra_pools_added: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Swap {
        round: usize,
        peptide: usize,
        other: usize,
    },
    Relocate {
        round: usize,
        peptide: usize,
        to_pool: usize,
    },
}

struct RepairState<'a> {
    grid: PoolGrid,
    members: Vec<Vec<Vec<usize>>>,
    pairs: PairCounts,
    signatures: HashMap<Vec<usize>, usize>,
    flagged: &'a HashSet<PairKey>,
}

impl<'a> RepairState<'a> {
    fn new(grid: PoolGrid, flagged: &'a HashSet<PairKey>) -> Self {
        let members = (0..grid.num_rounds())
            .map(|round| grid.members(round))
            .collect::<Vec<_>>();
        let pairs = PairCounts::from_grid(&grid);
        let mut signatures = HashMap::new();
        for signature in &grid.membership {
            *signatures.entry(signature.clone()).or_insert(0) += 1;
        }
        Self {
            grid,
            members,
            pairs,
            signatures,
            flagged,
        }
    }

    fn is_flagged(&self, a: usize, b: usize) -> bool {
        self.flagged.contains(&pair_key(a, b))
    }

    fn has_duplicate(&self, peptide: usize) -> bool {
        self.signatures
            .get(self.grid.signature(peptide))
            .is_some_and(|&count| count > 1)
    }

    /// Peptides involved in a duplicate pool set or a flagged co-pool, then
    /// peptides sharing more than one pool with a partner.
    fn violating(&self) -> (Vec<usize>, Vec<usize>) {
        let mut hard = Vec::new();
        let mut soft = Vec::new();
        for peptide in 0..self.grid.num_peptides() {
            let mut is_hard = self.has_duplicate(peptide);
            let mut is_soft = false;
            for (round, &pool) in self.grid.signature(peptide).iter().enumerate() {
                for &other in &self.members[round][pool] {
                    if other == peptide {
                        continue;
                    }
                    if self.is_flagged(peptide, other) {
                        is_hard = true;
                    }
                    if self.pairs.get(peptide, other) > 1 {
                        is_soft = true;
                    }
                }
            }
            if is_hard {
                hard.push(peptide);
            } else if is_soft {
                soft.push(peptide);
            }
        }
        (hard, soft)
    }

    fn pair_delta(&self, a: usize, b: usize, joining: bool) -> i64 {
        let count = self.pairs.get(a, b);
        let mut delta = if joining {
            if count >= 1 { REPEAT_WEIGHT } else { 0 }
        } else if count >= 2 {
            -REPEAT_WEIGHT
        } else {
            0
        };
        if self.is_flagged(a, b) {
            delta += if joining {
                SIMILAR_WEIGHT
            } else {
                -SIMILAR_WEIGHT
            };
        }
        delta
    }

    fn duplicate_delta(&self, old: &[&[usize]], new: &[Vec<usize>]) -> i64 {
        let mut keys: Vec<&[usize]> = Vec::with_capacity(old.len() + new.len());
        for key in old.iter().copied().chain(new.iter().map(|s| s.as_slice())) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        let mut distinct_delta = 0i64;
        for key in keys {
            let before = self.signatures.get(key).copied().unwrap_or(0) as i64;
            let removed = old.iter().filter(|s| **s == key).count() as i64;
            let added = new.iter().filter(|s| s.as_slice() == key).count() as i64;
            let after = before - removed + added;
            distinct_delta += i64::from(after > 0) - i64::from(before > 0);
        }
        -distinct_delta * DUPLICATE_WEIGHT
    }

    fn move_delta(&self, mv: Move) -> i64 {
        match mv {
            Move::Swap {
                round,
                peptide,
                other,
            } => {
                let from = self.grid.membership[peptide][round];
                let to = self.grid.membership[other][round];
                let mut delta = 0;
                for &x in &self.members[round][from] {
                    if x != peptide {
                        delta += self.pair_delta(peptide, x, false);
                        delta += self.pair_delta(other, x, true);
                    }
                }
                for &y in &self.members[round][to] {
                    if y != other {
                        delta += self.pair_delta(other, y, false);
                        delta += self.pair_delta(peptide, y, true);
                    }
                }
                let old_p = self.grid.signature(peptide);
                let old_q = self.grid.signature(other);
                let mut new_p = old_p.to_vec();
                new_p[round] = to;
                let mut new_q = old_q.to_vec();
                new_q[round] = from;
                delta + self.duplicate_delta(&[old_p, old_q], &[new_p, new_q])
            }
            Move::Relocate {
                round,
                peptide,
                to_pool,
            } => {
                let from = self.grid.membership[peptide][round];
                let mut delta = 0;
                for &x in &self.members[round][from] {
                    if x != peptide {
                        delta += self.pair_delta(peptide, x, false);
                    }
                }
                for &y in &self.members[round][to_pool] {
                    delta += self.pair_delta(peptide, y, true);
                }
                let old_p = self.grid.signature(peptide);
                let mut new_p = old_p.to_vec();
                new_p[round] = to_pool;
                delta + self.duplicate_delta(&[old_p], &[new_p])
            }
        }
    }

    fn best_move(&self, peptide: usize, round: usize) -> Option<(i64, Move)> {
        let from = self.grid.membership[peptide][round];
        let pools = self.grid.pools_per_round[round];
        let can_leave = self.members[round][from].len() > 1;
        let per_pool = (0..pools)
            .into_par_iter()
            .map(|to| {
                if to == from {
                    return None;
                }
                let mut best: Option<(i64, Move)> = None;
                for &other in &self.members[round][to] {
                    let mv = Move::Swap {
                        round,
                        peptide,
                        other,
                    };
                    let delta = self.move_delta(mv);
                    if best.is_none_or(|(d, _)| delta < d) {
                        best = Some((delta, mv));
                    }
                }
                if can_leave && self.members[round][to].len() < self.grid.capacity {
                    let mv = Move::Relocate {
                        round,
                        peptide,
                        to_pool: to,
                    };
                    let delta = self.move_delta(mv);
                    if best.is_none_or(|(d, _)| delta < d) {
                        best = Some((delta, mv));
                    }
                }
                best
            })
            .collect::<Vec<_>>();

        let mut best: Option<(i64, Move)> = None;
        for candidate in per_pool.into_iter().flatten() {
            if best.is_none_or(|(d, _)| candidate.0 < d) {
                best = Some(candidate);
            }
        }
        best
    }

    fn relocate(&mut self, round: usize, peptide: usize, to: usize) {
        let from = self.grid.membership[peptide][round];
        self.members[round][from].retain(|&x| x != peptide);
        for &x in &self.members[round][from] {
            self.pairs.decrement(peptide, x);
        }
        for &y in &self.members[round][to] {
            self.pairs.increment(peptide, y);
        }
        self.members[round][to].push(peptide);

        let old = self.grid.membership[peptide].clone();
        if let Some(count) = self.signatures.get_mut(&old) {
            *count -= 1;
            if *count == 0 {
                self.signatures.remove(&old);
            }
        }
        self.grid.membership[peptide][round] = to;
        *self
            .signatures
            .entry(self.grid.membership[peptide].clone())
            .or_insert(0) += 1;
    }

    fn apply(&mut self, mv: Move) {
        match mv {
            Move::Swap {
                round,
                peptide,
                other,
            } => {
                let from = self.grid.membership[peptide][round];
                let to = self.grid.membership[other][round];
                self.relocate(round, peptide, to);
                self.relocate(round, other, from);
            }
            Move::Relocate {
                round,
                peptide,
                to_pool,
            } => self.relocate(round, peptide, to_pool),
        }
    }

    /// Opens new pools in the last round for all but the first peptide of
    /// every group sharing a pool set. Returns the number of pools opened.
    fn open_extra_pools(&mut self) -> usize {
        let Some(round) = self.grid.num_rounds().checked_sub(1) else {
            return 0;
        };
        let mut first_seen: HashSet<Vec<usize>> = HashSet::new();
        let mut movers = Vec::new();
        for peptide in 0..self.grid.num_peptides() {
            if !first_seen.insert(self.grid.membership[peptide].clone()) {
                movers.push(peptide);
            }
        }

        let first_new = self.grid.pools_per_round[round];
        for peptide in movers {
            let prefix = self.grid.membership[peptide][..round].to_vec();
            let existing = (first_new..self.grid.pools_per_round[round]).find(|&pool| {
                let members = &self.members[round][pool];
                members.len() < self.grid.capacity
                    && members.iter().all(|&x| {
                        self.grid.membership[x][..round] != prefix[..]
                            && !self.is_flagged(peptide, x)
                    })
            });
            let pool = match existing {
                Some(pool) => pool,
                None => {
                    self.grid.pools_per_round[round] += 1;
                    self.members[round].push(Vec::new());
                    self.grid.pools_per_round[round] - 1
                }
            };
            self.relocate(round, peptide, pool);
        }
        self.grid.pools_per_round[round] - first_new
    }
}

pub fn run_stage4(
    grid: PoolGrid,
    inputs: &Stage4Inputs<'_>,
    rng: &mut ChaCha8Rng,
) -> Stage4Output {
    let rounds = grid.num_rounds();
    let mut state = RepairState::new(grid, inputs.flagged);
    let mut cost = conflict_stats(&state.grid, inputs.flagged).cost();
    let mut iterations = 0;

    while iterations < inputs.max_iterations && cost > 0 {
        let (hard, soft) = state.violating();
        let candidates = if hard.is_empty() { soft } else { hard };
        if candidates.is_empty() {
            break;
        }
        iterations += 1;
        let peptide = candidates[rng.gen_range(0..candidates.len())];
        let round = rng.gen_range(0..rounds);
        if let Some((delta, mv)) = state.best_move(peptide, round) {
            if delta <= 0 {
                state.apply(mv);
                cost += delta;
            }
        }
        if iterations % PROGRESS_EVERY == 0 {
            debug!(iterations, cost, "pool repair progress");
        }
    }

    let mut extra_pools_added = 0;
    if inputs.allow_extra_pools
        && conflict_stats(&state.grid, inputs.flagged).duplicate_signatures > 0
    {
        extra_pools_added = state.open_extra_pools();
        info!(extra_pools_added, "opened extra pools for duplicate pool sets");
    }

    let stats = conflict_stats(&state.grid, inputs.flagged);
    info!(
        iterations,
        duplicate_signatures = stats.duplicate_signatures,
        similar_copools = stats.similar_copools,
        repeat_pairings = stats.repeat_pairings,
        "pool repair finished"
    );
    Stage4Output {
        grid: state.grid,
        iterations,
        stats,
        extra_pools_added,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_repair.rs"]
mod tests;
