use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ElispotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlateSize {
    Wells24,
    Wells48,
    Wells96,
    Wells384,
    DoNotAssign,
}

impl PlateSize {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "24" => Some(PlateSize::Wells24),
            "48" => Some(PlateSize::Wells48),
            "96" => Some(PlateSize::Wells96),
            "384" => Some(PlateSize::Wells384),
            "do_not_assign" | "none" => Some(PlateSize::DoNotAssign),
            _ => None,
        }
    }

    /// (rows, columns) of the physical plate.
    pub fn dims(self) -> Option<(usize, usize)> {
        match self {
            PlateSize::Wells24 => Some((4, 6)),
            PlateSize::Wells48 => Some((6, 8)),
            PlateSize::Wells96 => Some((8, 12)),
            PlateSize::Wells384 => Some((16, 24)),
            PlateSize::DoNotAssign => None,
        }
    }

    pub fn wells(self) -> Option<usize> {
        self.dims().map(|(rows, cols)| rows * cols)
    }

    pub fn label(self) -> String {
        match self.wells() {
            Some(n) => n.to_string(),
            None => "do_not_assign".to_string(),
        }
    }
}

impl FromStr for PlateSize {
    type Err = ElispotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlateSize::parse(s).ok_or_else(|| {
            ElispotError::invalid_parameter(
                "plate_size",
                s,
                "expected 24, 48, 96, 384 or do_not_assign",
            )
        })
    }
}

/// Row-major well label for a 0-based position on a plate with `cols` columns.
pub fn well_label(position: usize, cols: usize) -> String {
    let row = position / cols;
    let col = position % cols;
    let letter = (b'A' + row as u8) as char;
    format!("{letter}{}", col + 1)
}

pub fn plate_well_key(plate_id: u32, well_id: &str) -> String {
    format!("{plate_id}-{well_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub peptide_id: String,
    #[serde(default)]
    pub peptide_sequence: String,
    pub pool_id: u32,
    pub coverage_id: u32,
    #[serde(default)]
    pub plate_id: Option<u32>,
    #[serde(default)]
    pub well_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentBenchReady {
    pub plate_id: Option<u32>,
    pub well_id: Option<String>,
    pub pool_id: u32,
    pub peptide_ids: String,
    pub peptide_sequences: String,
}
