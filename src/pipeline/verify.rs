use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::model::assignment::Assignment;
use crate::model::design::PairCounts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintCheck {
    pub name: &'static str,
    pub passed: bool,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub num_peptides: usize,
    pub num_pools: usize,
    pub pair_violation_score: usize,
    pub max_shared_pools: u32,
    pub checks: Vec<ConstraintCheck>,
}

impl VerificationReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

pub fn verify(
    assignments: &[Assignment],
    peptides_per_pool: usize,
    coverage: usize,
) -> VerificationReport {
    let mut order: Vec<&str> = Vec::new();
    let mut pools_by_peptide: HashMap<&str, Vec<u32>> = HashMap::new();
    let mut members_by_pool: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for row in assignments {
        let pools = pools_by_peptide
            .entry(row.peptide_id.as_str())
            .or_insert_with(|| {
                order.push(row.peptide_id.as_str());
                Vec::new()
            });
        pools.push(row.pool_id);
    }
    let index_of = order
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect::<HashMap<_, _>>();
    for row in assignments {
        let members = members_by_pool.entry(row.pool_id).or_default();
        let peptide = index_of[row.peptide_id.as_str()];
        if !members.contains(&peptide) {
            members.push(peptide);
        }
    }

    let mut coverage_details = Vec::new();
    for id in &order {
        let pools = &pools_by_peptide[id];
        let distinct = pools.iter().collect::<BTreeSet<_>>().len();
        if pools.len() != coverage || distinct != coverage {
            coverage_details.push(format!(
                "peptide {id} is in {distinct} distinct pools across {} rows (expected {coverage})",
                pools.len()
            ));
        }
    }

    let mut size_details = Vec::new();
    for (pool_id, members) in &members_by_pool {
        if members.len() > peptides_per_pool {
            size_details.push(format!(
                "pool {pool_id} holds {} peptides, limit is {peptides_per_pool}",
                members.len()
            ));
        }
    }

    let mut first_with_set: HashMap<Vec<u32>, &str> = HashMap::new();
    let mut unique_details = Vec::new();
    for id in &order {
        let mut set = pools_by_peptide[id].clone();
        set.sort_unstable();
        set.dedup();
        if let Some(previous) = first_with_set.get(&set) {
            unique_details.push(format!(
                "peptides {previous} and {id} share pools {}",
                join_pool_ids(&set)
            ));
        } else {
            first_with_set.insert(set, *id);
        }
    }

    let mut pairs = PairCounts::default();
    for members in members_by_pool.values() {
        pairs.add_pool(members);
    }
    let mut pair_details = Vec::new();
    for (i, a) in order.iter().enumerate() {
        for (j, b) in order.iter().enumerate().skip(i + 1) {
            let shared = pairs.get(i, j);
            if shared > 1 {
                pair_details.push(format!("peptides {a} and {b} share {shared} pools"));
            }
        }
    }

    let num_pools = members_by_pool.len();
    let expected_pools = if peptides_per_pool == 0 {
        0
    } else {
        order.len().div_ceil(peptides_per_pool) * coverage
    };
    let mut pool_details = Vec::new();
    if num_pools != expected_pools {
        pool_details.push(format!(
            "{num_pools} pools used, minimum is {expected_pools}"
        ));
    }

    VerificationReport {
        num_peptides: order.len(),
        num_pools,
        pair_violation_score: pairs.repeat_pairings(),
        max_shared_pools: pairs.max_shared(),
        checks: vec![
            check("each_peptide_in_coverage_pools", coverage_details),
            check("pool_size_within_limit", size_details),
            check("unique_pool_combinations", unique_details),
            check("pairs_share_at_most_one_pool", pair_details),
            check("minimal_pool_count", pool_details),
        ],
    }
}

fn check(name: &'static str, details: Vec<String>) -> ConstraintCheck {
    ConstraintCheck {
        name,
        passed: details.is_empty(),
        details,
    }
}

fn join_pool_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/verify.rs"]
mod tests;
