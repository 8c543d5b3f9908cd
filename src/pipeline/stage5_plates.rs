use tracing::info;

use crate::model::assignment::{Assignment, AssignmentBenchReady, PlateSize, well_label};
use crate::model::design::PoolGrid;
use crate::model::peptide::Peptide;

#[derive(Debug, Clone)]
pub struct Stage5Inputs<'a> {
    pub peptides: &'a [Peptide],
    pub grid: &'a PoolGrid,
    pub plate_size: PlateSize,
}

#[derive(Debug, Clone)]
pub struct Stage5Output {
    pub assignments: Vec<Assignment>,
    pub bench_ready: Vec<AssignmentBenchReady>,
    pub num_plates: Option<usize>,
}

/// Plate and well of the pool with 0-based global index `pool_index`.
pub fn plate_position(pool_index: usize, plate_size: PlateSize) -> Option<(u32, String)> {
    let (rows, cols) = plate_size.dims()?;
    let wells = rows * cols;
    let plate = (pool_index / wells + 1) as u32;
    Some((plate, well_label(pool_index % wells, cols)))
}

pub fn run_stage5(inputs: &Stage5Inputs<'_>) -> Stage5Output {
    let grid = inputs.grid;
    let total = grid.total_pools();
    let positions = (0..total)
        .map(|index| plate_position(index, inputs.plate_size))
        .collect::<Vec<_>>();
    let num_plates = inputs.plate_size.wells().map(|w| total.div_ceil(w));

    let mut assignments = Vec::with_capacity(grid.num_peptides() * grid.num_rounds());
    for (peptide, signature) in inputs.peptides.iter().zip(grid.membership.iter()) {
        for (round, &pool) in signature.iter().enumerate() {
            let pool_id = grid.pool_id(round, pool);
            let position = &positions[pool_id as usize - 1];
            assignments.push(Assignment {
                peptide_id: peptide.id.clone(),
                peptide_sequence: peptide.sequence.clone(),
                pool_id,
                coverage_id: (round + 1) as u32,
                plate_id: position.as_ref().map(|(plate, _)| *plate),
                well_id: position.as_ref().map(|(_, well)| well.clone()),
            });
        }
    }

    let mut bench_ready = Vec::with_capacity(total);
    for round in 0..grid.num_rounds() {
        for (pool, members) in grid.members(round).into_iter().enumerate() {
            let pool_id = grid.pool_id(round, pool);
            let position = positions[pool_id as usize - 1].clone();
            let ids = members
                .iter()
                .map(|&i| inputs.peptides[i].id.as_str())
                .collect::<Vec<_>>();
            let sequences = members
                .iter()
                .map(|&i| inputs.peptides[i].sequence.as_str())
                .collect::<Vec<_>>();
            bench_ready.push(AssignmentBenchReady {
                plate_id: position.as_ref().map(|(plate, _)| *plate),
                well_id: position.map(|(_, well)| well),
                pool_id,
                peptide_ids: ids.join(";"),
                peptide_sequences: sequences.join(";"),
            });
        }
    }

    info!(
        pools = total,
        plate_size = inputs.plate_size.label(),
        plates = num_plates.map_or(-1, |n| n as i64),
        "pools laid out on plates"
    );
    Stage5Output {
        assignments,
        bench_ready,
        num_plates,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage5_plates.rs"]
mod tests;
