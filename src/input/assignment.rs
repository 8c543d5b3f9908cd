use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::input::{InputError, read_records};
use crate::model::assignment::Assignment;

const MAX_COLORING_STEPS: usize = 1_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRecord {
    pub peptide_id: String,
    #[serde(default)]
    pub peptide_sequence: Option<String>,
    #[serde(default)]
    pub pool_id: Option<u32>,
    #[serde(default)]
    pub coverage_id: Option<u32>,
    #[serde(default)]
    pub plate_id: Option<u32>,
    #[serde(default)]
    pub well_id: Option<String>,
}

pub fn read_assignments(path: &Path) -> Result<Vec<Assignment>, InputError> {
    let records: Vec<AssignmentRecord> = read_records(path, &[&["peptide_id"]])?;
    let assignments = records_to_assignments(records)
        .map_err(|message| InputError::invalid(path, message))?;
    info!(path = %path.display(), rows = assignments.len(), "assignments loaded");
    Ok(assignments)
}

/// Fills in pool ids (numbered by first appearance of each plate/well) and
/// coverage ids (inferred from pool overlap) when the table lacks them.
pub fn records_to_assignments(records: Vec<AssignmentRecord>) -> Result<Vec<Assignment>, String> {
    let mut well_pools: HashMap<(u32, String), u32> = HashMap::new();
    let mut pool_ids = Vec::with_capacity(records.len());
    let mut inferred_pools = false;
    for (line, record) in records.iter().enumerate() {
        let pool_id = match (record.pool_id, record.plate_id, record.well_id.as_ref()) {
            (Some(pool_id), _, _) => pool_id,
            (None, Some(plate_id), Some(well_id)) => {
                inferred_pools = true;
                let next = well_pools.len() as u32 + 1;
                *well_pools
                    .entry((plate_id, well_id.trim().to_ascii_uppercase()))
                    .or_insert(next)
            }
            _ => {
                return Err(format!(
                    "row {} (peptide {}) has neither pool_id nor plate_id/well_id",
                    line + 1,
                    record.peptide_id
                ));
            }
        };
        pool_ids.push(pool_id);
    }
    if inferred_pools {
        warn!("pool_id column missing; pools numbered by plate/well order");
    }

    let coverage_ids = if records.iter().all(|r| r.coverage_id.is_some()) {
        None
    } else {
        warn!("coverage_id column missing; inferring coverage rounds from pool overlap");
        let mut by_peptide: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        for (record, &pool_id) in records.iter().zip(pool_ids.iter()) {
            by_peptide
                .entry(record.peptide_id.as_str())
                .or_default()
                .push(pool_id);
        }
        let pools = by_peptide.into_values().collect::<Vec<_>>();
        Some(infer_coverage_ids(&pools).ok_or_else(|| {
            "could not assign coverage ids: pools cannot be split into rounds".to_string()
        })?)
    };

    Ok(records
        .into_iter()
        .zip(pool_ids)
        .map(|(record, pool_id)| Assignment {
            coverage_id: record
                .coverage_id
                .or_else(|| coverage_ids.as_ref().and_then(|m| m.get(&pool_id).copied()))
                .unwrap_or(1),
            peptide_id: record.peptide_id,
            peptide_sequence: record.peptide_sequence.unwrap_or_default(),
            pool_id,
            plate_id: record.plate_id,
            well_id: record.well_id,
        })
        .collect())
}

/// Assigns each pool a 1-based coverage id so that the pools of any one
/// peptide all get different ids, using as many ids as the largest number of
/// pools a peptide is in. Returns `None` when no such assignment exists.
pub fn infer_coverage_ids(peptide_pools: &[Vec<u32>]) -> Option<BTreeMap<u32, u32>> {
    let colors = peptide_pools.iter().map(Vec::len).max()? as u32;
    let mut neighbours: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
    for pools in peptide_pools {
        for &a in pools {
            let entry = neighbours.entry(a).or_default();
            for &b in pools {
                if a != b {
                    entry.insert(b);
                }
            }
        }
    }
    let order = neighbours.keys().copied().collect::<Vec<_>>();
    let mut assigned: BTreeMap<u32, u32> = BTreeMap::new();
    let mut steps = 0usize;
    if color_from(0, &order, &neighbours, colors, &mut assigned, &mut steps) {
        Some(assigned)
    } else {
        None
    }
}

fn color_from(
    index: usize,
    order: &[u32],
    neighbours: &BTreeMap<u32, BTreeSet<u32>>,
    colors: u32,
    assigned: &mut BTreeMap<u32, u32>,
    steps: &mut usize,
) -> bool {
    let Some(&pool) = order.get(index) else {
        return true;
    };
    for color in 1..=colors {
        *steps += 1;
        if *steps > MAX_COLORING_STEPS {
            return false;
        }
        let clash = neighbours
            .get(&pool)
            .is_some_and(|ns| ns.iter().any(|n| assigned.get(n) == Some(&color)));
        if clash {
            continue;
        }
        assigned.insert(pool, color);
        if color_from(index + 1, order, neighbours, colors, assigned, steps) {
            return true;
        }
        assigned.remove(&pool);
    }
    false
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/assignment.rs"]
mod tests;
