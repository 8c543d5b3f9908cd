use serde::{Deserialize, Serialize};

use crate::model::assignment::plate_well_key;

/// One spot count as it comes off the plate reader: keyed by pool, or by
/// plate and well. A row carrying both must agree with the assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotCount {
    #[serde(default)]
    pub pool_id: Option<u32>,
    #[serde(default)]
    pub plate_id: Option<u32>,
    #[serde(default)]
    pub well_id: Option<String>,
    pub spot_count: f64,
}

impl SpotCount {
    pub fn has_key(&self) -> bool {
        self.pool_id.is_some() || (self.plate_id.is_some() && self.well_id.is_some())
    }

    pub fn describe(&self) -> String {
        match (self.pool_id, self.plate_id, self.well_id.as_deref()) {
            (Some(pool_id), _, _) => format!("pool {pool_id}"),
            (None, Some(plate_id), Some(well_id)) => format!("well {}", plate_well_key(plate_id, well_id)),
            _ => "row without pool or well".to_string(),
        }
    }
}
