use std::path::Path;

use tracing::info;

use crate::input::{InputError, read_records};
use crate::model::readout::SpotCount;

/// Reads spot counts keyed by `pool_id`, or by `plate_id` and `well_id`.
pub fn read_readout(path: &Path) -> Result<Vec<SpotCount>, InputError> {
    let rows: Vec<SpotCount> = read_records(path, &[&["spot_count"]])?;
    for (line, row) in rows.iter().enumerate() {
        if !row.has_key() {
            return Err(InputError::invalid(
                path,
                format!("row {} has neither pool_id nor plate_id/well_id", line + 1),
            ));
        }
    }
    info!(path = %path.display(), rows = rows.len(), "spot counts loaded");
    Ok(rows)
}
