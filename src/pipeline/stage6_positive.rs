use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::info;

use crate::error::ElispotError;
use crate::model::assignment::{Assignment, plate_well_key};
use crate::model::readout::SpotCount;

#[derive(Debug, Clone, PartialEq)]
pub struct WellObservation {
    pub pool_id: u32,
    pub plate_id: Option<u32>,
    pub well_id: Option<String>,
    pub spot_count: f64,
    pub positive: bool,
}

impl WellObservation {
    /// `plate-well`, or `pool-N` for pools never placed on a plate.
    pub fn key(&self) -> String {
        match (self.plate_id, self.well_id.as_deref()) {
            (Some(plate_id), Some(well_id)) => plate_well_key(plate_id, well_id),
            _ => format!("pool-{}", self.pool_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeptideEntry {
    pub id: String,
    pub sequence: String,
}

/// Pools ordered by id, joined to the peptides they contain and their spot
/// counts. Plate and well are carried along when the design placed them.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolTable {
    pub peptides: Vec<PeptideEntry>,
    pub wells: Vec<WellObservation>,
    pub peptide_wells: Vec<Vec<usize>>,
    pub well_peptides: Vec<Vec<usize>>,
}

impl PoolTable {
    pub fn positive_wells(&self, peptide: usize) -> impl Iterator<Item = usize> + '_ {
        self.peptide_wells[peptide]
            .iter()
            .copied()
            .filter(|&w| self.wells[w].positive)
    }

    pub fn positive_count(&self, peptide: usize) -> usize {
        self.positive_wells(peptide).count()
    }

    pub fn num_positive_wells(&self) -> usize {
        self.wells.iter().filter(|w| w.positive).count()
    }
}

pub fn normalize_well_id(well_id: &str) -> String {
    well_id.trim().to_ascii_uppercase()
}

type Position = Option<(u32, String)>;

struct PoolInfo {
    position: Position,
    peptides: Vec<usize>,
}

fn describe_position(position: &Position) -> String {
    match position {
        Some((plate_id, well_id)) => plate_well_key(*plate_id, well_id),
        None => "no plate/well".to_string(),
    }
}

/// Pool a spot count belongs to. Counts are matched by pool id when they carry
/// one and by plate/well otherwise.
fn resolve_pool(
    spot: &SpotCount,
    pools: &BTreeMap<u32, PoolInfo>,
    pool_by_well: &HashMap<String, u32>,
) -> Result<u32, ElispotError> {
    let well = match (spot.plate_id, spot.well_id.as_deref()) {
        (Some(plate_id), Some(well_id)) => Some(plate_well_key(plate_id, &normalize_well_id(well_id))),
        _ => None,
    };
    match (spot.pool_id, well) {
        (Some(pool_id), well) => {
            let Some(info) = pools.get(&pool_id) else {
                return Err(ElispotError::DeconvolutionInputMismatch(format!(
                    "spot count for pool {pool_id} has no assigned peptides"
                )));
            };
            if let (Some(well), Some(_)) = (well, &info.position) {
                let placed = describe_position(&info.position);
                if well != placed {
                    return Err(ElispotError::DeconvolutionInputMismatch(format!(
                        "spot count for pool {pool_id} names well {well}, but the pool is in {placed}"
                    )));
                }
            }
            Ok(pool_id)
        }
        (None, Some(well)) => pool_by_well.get(&well).copied().ok_or_else(|| {
            ElispotError::DeconvolutionInputMismatch(format!(
                "spot count for well {well} has no assigned pool"
            ))
        }),
        (None, None) => Err(ElispotError::DeconvolutionInputMismatch(
            "spot count row has neither pool_id nor plate_id/well_id".to_string(),
        )),
    }
}

pub fn run_stage6(
    assignments: &[Assignment],
    spot_counts: &[SpotCount],
    min_positive_spot_count: f64,
) -> Result<PoolTable, ElispotError> {
    if !min_positive_spot_count.is_finite() || min_positive_spot_count < 0.0 {
        return Err(ElispotError::invalid_parameter(
            "min_positive_spot_count",
            min_positive_spot_count,
            "must be a finite, non-negative spot count",
        ));
    }

    let mut peptides: Vec<PeptideEntry> = Vec::new();
    let mut peptide_index: HashMap<&str, usize> = HashMap::new();
    let mut pools: BTreeMap<u32, PoolInfo> = BTreeMap::new();
    let mut seen_rows: HashSet<(usize, u32)> = HashSet::new();

    for row in assignments {
        let position = match (row.plate_id, row.well_id.as_deref()) {
            (Some(plate_id), Some(well_id)) => Some((plate_id, normalize_well_id(well_id))),
            (None, None) => None,
            _ => {
                return Err(ElispotError::DeconvolutionInputMismatch(format!(
                    "peptide {} in pool {} has a plate or a well but not both",
                    row.peptide_id, row.pool_id
                )));
            }
        };
        let peptide = *peptide_index
            .entry(row.peptide_id.as_str())
            .or_insert_with(|| {
                peptides.push(PeptideEntry {
                    id: row.peptide_id.clone(),
                    sequence: row.peptide_sequence.clone(),
                });
                peptides.len() - 1
            });
        if !seen_rows.insert((peptide, row.pool_id)) {
            return Err(ElispotError::DeconvolutionInputMismatch(format!(
                "peptide {} is listed twice in pool {}",
                row.peptide_id, row.pool_id
            )));
        }
        let pool = pools.entry(row.pool_id).or_insert_with(|| PoolInfo {
            position: position.clone(),
            peptides: Vec::new(),
        });
        if pool.position != position {
            return Err(ElispotError::DeconvolutionInputMismatch(format!(
                "pool {} is placed in both {} and {}",
                row.pool_id,
                describe_position(&pool.position),
                describe_position(&position)
            )));
        }
        pool.peptides.push(peptide);
    }

    let mut pool_by_well: HashMap<String, u32> = HashMap::new();
    for (&pool_id, info) in &pools {
        let Some((plate_id, well_id)) = &info.position else {
            continue;
        };
        let key = plate_well_key(*plate_id, well_id);
        if let Some(previous) = pool_by_well.insert(key.clone(), pool_id) {
            return Err(ElispotError::DeconvolutionInputMismatch(format!(
                "well {key} holds both pool {previous} and pool {pool_id}"
            )));
        }
    }

    let mut counts: HashMap<u32, f64> = HashMap::with_capacity(spot_counts.len());
    for spot in spot_counts {
        if !spot.spot_count.is_finite() || spot.spot_count < 0.0 {
            return Err(ElispotError::invalid_parameter(
                "spot_count",
                spot.spot_count,
                format!("{} must have a finite, non-negative spot count", spot.describe()),
            ));
        }
        let pool_id = resolve_pool(spot, &pools, &pool_by_well)?;
        if counts.insert(pool_id, spot.spot_count).is_some() {
            return Err(ElispotError::DeconvolutionInputMismatch(format!(
                "pool {pool_id} ({}) has more than one spot count",
                describe_position(&pools[&pool_id].position)
            )));
        }
    }

    let mut wells = Vec::with_capacity(pools.len());
    let mut well_peptides = Vec::with_capacity(pools.len());
    let mut peptide_wells = vec![Vec::new(); peptides.len()];
    for (pool_id, info) in pools {
        let Some(&spot_count) = counts.get(&pool_id) else {
            return Err(ElispotError::DeconvolutionInputMismatch(format!(
                "no spot count for pool {pool_id} ({})",
                describe_position(&info.position)
            )));
        };
        let index = wells.len();
        for &peptide in &info.peptides {
            peptide_wells[peptide].push(index);
        }
        let (plate_id, well_id) = match info.position {
            Some((plate_id, well_id)) => (Some(plate_id), Some(well_id)),
            None => (None, None),
        };
        wells.push(WellObservation {
            pool_id,
            plate_id,
            well_id,
            spot_count,
            positive: spot_count >= min_positive_spot_count,
        });
        well_peptides.push(info.peptides);
    }

    let table = PoolTable {
        peptides,
        wells,
        peptide_wells,
        well_peptides,
    };
    info!(
        peptides = table.peptides.len(),
        wells = table.wells.len(),
        positive_wells = table.num_positive_wells(),
        min_positive_spot_count,
        "wells matched to pools"
    );
    Ok(table)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage6_positive.rs"]
mod tests;
