use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::model::deconvolution::{DeconvolutionResult, HitLabel};
use crate::report::join_semicolon;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeconvolutionRow {
    pub peptide_id: String,
    pub peptide_sequence: String,
    pub hit_well_ids: String,
    pub hit_well_ids_count: usize,
    pub hit_pool_ids: String,
    pub hit_pool_spot_counts: String,
    pub estimated_peptide_spot_count: f64,
    pub result: HitLabel,
}

impl From<&DeconvolutionResult> for DeconvolutionRow {
    fn from(r: &DeconvolutionResult) -> Self {
        Self {
            peptide_id: r.peptide_id.clone(),
            peptide_sequence: r.peptide_sequence.clone(),
            hit_well_ids: join_semicolon(&r.hit_well_ids),
            hit_well_ids_count: r.hit_well_ids_count,
            hit_pool_ids: join_semicolon(
                &r.hit_pool_ids.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            ),
            hit_pool_spot_counts: join_semicolon(
                &r.hit_pool_spot_counts
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>(),
            ),
            estimated_peptide_spot_count: r.estimated_peptide_spot_count,
            result: r.result,
        }
    }
}

pub fn write_tsv_to<W: Write, T: Serialize>(writer: W, rows: &[T]) -> std::io::Result<()> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    for row in rows {
        out.serialize(row).map_err(std::io::Error::from)?;
    }
    out.flush()
}

pub fn write_tsv<T: Serialize>(path: &Path, rows: &[T]) -> std::io::Result<()> {
    let file = File::create(path)?;
    write_tsv_to(BufWriter::new(file), rows)
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/tsv.rs"]
mod tests;
