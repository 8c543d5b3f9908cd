use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ElispotError;
use crate::model::assignment::{Assignment, plate_well_key};
use crate::model::readout::SpotCount;
use crate::pipeline::stage6_positive::normalize_well_id;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitPeptideSummary {
    pub hit_peptide_id: String,
    pub hit_peptide_sequence: String,
    pub num_coverage: usize,
    pub pool_ids: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateReadout {
    pub pool_id: u32,
    pub plate_id: Option<u32>,
    pub well_id: Option<String>,
    pub spot_count: f64,
    pub positive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub hit_peptide_summary: Vec<HitPeptideSummary>,
    pub elispot_configuration: Vec<Assignment>,
    pub plate_readout: Vec<PlateReadout>,
}

type Position = (Option<u32>, Option<String>);

fn pool_positions(configuration: &[Assignment]) -> BTreeMap<u32, Position> {
    let mut out = BTreeMap::new();
    for row in configuration {
        out.entry(row.pool_id).or_insert_with(|| {
            (
                row.plate_id,
                row.well_id.as_deref().map(normalize_well_id),
            )
        });
    }
    out
}

fn pool_for_row(
    row: &SpotCount,
    positions: &BTreeMap<u32, Position>,
    by_well: &HashMap<String, u32>,
) -> Option<u32> {
    if let Some(pool_id) = row.pool_id {
        return positions.contains_key(&pool_id).then_some(pool_id);
    }
    let (Some(plate_id), Some(well_id)) = (row.plate_id, row.well_id.as_deref()) else {
        return None;
    };
    by_well
        .get(&plate_well_key(plate_id, &normalize_well_id(well_id)))
        .copied()
}

fn check_spot_count(row: &SpotCount) -> Result<(), ElispotError> {
    if row.spot_count.is_finite() && row.spot_count >= 0.0 {
        Ok(())
    } else {
        Err(ElispotError::invalid_parameter(
            "spot_count",
            row.spot_count,
            format!("{} must have a finite, non-negative spot count", row.describe()),
        ))
    }
}

/// Flags every peptide that sits in at least one pool at or above
/// `min_positive_spot_count`. Readout rows matching no configured pool are
/// skipped.
pub fn identify(
    configuration: &[Assignment],
    readout: &[SpotCount],
    min_positive_spot_count: f64,
) -> Result<Identification, ElispotError> {
    if !min_positive_spot_count.is_finite() || min_positive_spot_count < 0.0 {
        return Err(ElispotError::invalid_parameter(
            "min_positive_spot_count",
            min_positive_spot_count,
            "must be a finite, non-negative spot count",
        ));
    }
    let positions = pool_positions(configuration);
    let by_well = positions
        .iter()
        .filter_map(|(&pool_id, (plate, well))| match (plate, well) {
            (Some(plate), Some(well)) => Some((plate_well_key(*plate, well), pool_id)),
            _ => None,
        })
        .collect::<HashMap<_, _>>();

    let mut counts: BTreeMap<u32, f64> = BTreeMap::new();
    for row in readout {
        check_spot_count(row)?;
        let Some(pool_id) = pool_for_row(row, &positions, &by_well) else {
            warn!("readout {} matches no configured pool; skipped", row.describe());
            continue;
        };
        if counts.contains_key(&pool_id) {
            warn!("pool {pool_id} read more than once; keeping the first value");
            continue;
        }
        counts.insert(pool_id, row.spot_count);
    }

    let plate_readout = counts
        .iter()
        .map(|(&pool_id, &spot_count)| {
            let (plate_id, well_id) = positions.get(&pool_id).cloned().unwrap_or((None, None));
            PlateReadout {
                pool_id,
                plate_id,
                well_id,
                spot_count,
                positive: spot_count >= min_positive_spot_count,
            }
        })
        .collect::<Vec<_>>();

    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut hit_pools: HashMap<&str, Vec<u32>> = HashMap::new();
    for row in configuration {
        let pools = hit_pools.entry(row.peptide_id.as_str()).or_insert_with(|| {
            order.push((row.peptide_id.as_str(), row.peptide_sequence.as_str()));
            Vec::new()
        });
        let positive = counts
            .get(&row.pool_id)
            .is_some_and(|&c| c >= min_positive_spot_count);
        if positive && !pools.contains(&row.pool_id) {
            pools.push(row.pool_id);
        }
    }

    let mut hit_peptide_summary = order
        .iter()
        .filter_map(|&(id, sequence)| {
            let mut pools = hit_pools.get(id)?.clone();
            if pools.is_empty() {
                return None;
            }
            pools.sort_unstable();
            Some(HitPeptideSummary {
                hit_peptide_id: id.to_string(),
                hit_peptide_sequence: sequence.to_string(),
                num_coverage: pools.len(),
                pool_ids: pools
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            })
        })
        .collect::<Vec<_>>();
    hit_peptide_summary.sort_by(|a, b| b.num_coverage.cmp(&a.num_coverage));

    info!(
        pools_read = plate_readout.len(),
        hit_pools = plate_readout.iter().filter(|r| r.positive).count(),
        hit_peptides = hit_peptide_summary.len(),
        "hit peptides identified"
    );
    Ok(Identification {
        hit_peptide_summary,
        elispot_configuration: configuration.to_vec(),
        plate_readout,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/identify.rs"]
mod tests;
