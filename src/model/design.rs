use std::collections::HashMap;

use serde::{Serialize, Serializer};

use crate::model::assignment::{Assignment, AssignmentBenchReady};
use crate::model::params::InitStrategy;
use crate::model::peptide::PreferredPeptidePair;
use crate::similarity::SimilarityFunction;

pub const NUM_PLATES_NOT_ASSIGNED: i64 = -1;

/// Pool membership of every peptide, one pool index per coverage round.
/// Pool indices are local to their round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolGrid {
    pub capacity: usize,
    pub pools_per_round: Vec<usize>,
    pub membership: Vec<Vec<usize>>,
}

impl PoolGrid {
    pub fn new(num_peptides: usize, rounds: usize, pools_per_round: usize, capacity: usize) -> Self {
        Self {
            capacity,
            pools_per_round: vec![pools_per_round; rounds],
            membership: vec![Vec::with_capacity(rounds); num_peptides],
        }
    }

    pub fn num_peptides(&self) -> usize {
        self.membership.len()
    }

    pub fn num_rounds(&self) -> usize {
        self.pools_per_round.len()
    }

    pub fn total_pools(&self) -> usize {
        self.pools_per_round.iter().sum()
    }

    pub fn pool_offset(&self, round: usize) -> usize {
        self.pools_per_round[..round].iter().sum()
    }

    /// Global 1-based pool id.
    pub fn pool_id(&self, round: usize, pool: usize) -> u32 {
        (self.pool_offset(round) + pool + 1) as u32
    }

    pub fn signature(&self, peptide: usize) -> &[usize] {
        &self.membership[peptide]
    }

    /// Members of every pool in `round`, ascending by peptide index.
    pub fn members(&self, round: usize) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.pools_per_round[round]];
        for (peptide, pools) in self.membership.iter().enumerate() {
            if let Some(&pool) = pools.get(round) {
                out[pool].push(peptide);
            }
        }
        out
    }
}

pub type PairKey = (usize, usize);

pub fn pair_key(a: usize, b: usize) -> PairKey {
    if a < b { (a, b) } else { (b, a) }
}

/// Number of pools each unordered peptide pair shares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairCounts {
    counts: HashMap<PairKey, u32>,
}

impl PairCounts {
    pub fn from_grid(grid: &PoolGrid) -> Self {
        let mut out = Self::default();
        for round in 0..grid.num_rounds() {
            for pool in grid.members(round) {
                out.add_pool(&pool);
            }
        }
        out
    }

    pub fn add_pool(&mut self, members: &[usize]) {
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                self.increment(a, b);
            }
        }
    }

    pub fn get(&self, a: usize, b: usize) -> u32 {
        self.counts.get(&pair_key(a, b)).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, a: usize, b: usize) {
        *self.counts.entry(pair_key(a, b)).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, a: usize, b: usize) {
        let key = pair_key(a, b);
        if let Some(count) = self.counts.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&key);
            }
        }
    }

    /// Sum over pairs of (shared pools - 1) for pairs sharing more than one pool.
    pub fn repeat_pairings(&self) -> usize {
        self.counts
            .values()
            .map(|&c| c.saturating_sub(1) as usize)
            .sum()
    }

    pub fn max_shared(&self) -> u32 {
        self.counts.values().copied().max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DesignWarning {
    PartialConvergence {
        iterations: usize,
        duplicate_signatures: usize,
        similar_copools: usize,
    },
    ClusteringSkipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignMetadata {
    pub num_peptides: usize,
    pub num_peptides_per_pool: usize,
    pub num_coverage: usize,
    /// Pools in each coverage round, extra pools included.
    pub num_pools_per_coverage: Vec<usize>,
    pub num_pools: usize,
    pub num_extra_pools: usize,
    pub plate_size: String,
    #[serde(serialize_with = "plates_or_sentinel")]
    pub num_plates: Option<usize>,
    pub cluster_peptides: bool,
    pub similarity_function: SimilarityFunction,
    pub similarity_threshold: f64,
    pub num_preferred_pairs: usize,
    pub max_iterations: usize,
    pub iterations_used: usize,
    pub initialization_strategy: InitStrategy,
    pub allow_extra_pools: bool,
    pub random_seed: u64,
    pub converged: bool,
    pub num_duplicate_signatures: usize,
    pub num_similar_copools: usize,
    pub num_repeat_pairings: usize,
    pub warnings: Vec<DesignWarning>,
}

fn plates_or_sentinel<S: Serializer>(value: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(n) => s.serialize_u64(*n as u64),
        None => s.serialize_i64(NUM_PLATES_NOT_ASSIGNED),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    pub assignments: Vec<Assignment>,
    pub bench_ready: Vec<AssignmentBenchReady>,
    pub metadata: DesignMetadata,
    pub preferred_pairs: Vec<PreferredPeptidePair>,
}
