use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::input::{InputError, read_records};
use crate::model::peptide::Peptide;

#[derive(Debug, Deserialize)]
struct PeptideRecord {
    #[serde(alias = "id")]
    peptide_id: String,
    #[serde(alias = "sequence")]
    peptide_sequence: String,
}

pub fn read_peptides(path: &Path) -> Result<Vec<Peptide>, InputError> {
    let records: Vec<PeptideRecord> = read_records(
        path,
        &[&["peptide_id", "id"], &["peptide_sequence", "sequence"]],
    )?;
    if records.is_empty() {
        return Err(InputError::invalid(path, "no peptides listed"));
    }
    info!(path = %path.display(), peptides = records.len(), "peptides loaded");
    Ok(records
        .into_iter()
        .map(|r| Peptide::new(r.peptide_id, r.peptide_sequence))
        .collect())
}
