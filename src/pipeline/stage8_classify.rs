use crate::model::deconvolution::{DeconvolutionResult, HitLabel};
use crate::model::params::CONFIDENT_SPOT_MULTIPLE;
use crate::pipeline::stage6_positive::PoolTable;
use crate::pipeline::stage7_estimate::Estimates;

#[derive(Debug, Clone)]
pub struct Stage8Inputs<'a> {
    pub table: &'a PoolTable,
    pub estimates: &'a Estimates,
    pub min_coverage: usize,
    pub min_positive_spot_count: f64,
}

pub fn run_stage8(inputs: &Stage8Inputs<'_>) -> Vec<DeconvolutionResult> {
    let table = inputs.table;
    let required = inputs.min_coverage.max(1);
    let eligible = (0..table.peptides.len())
        .map(|i| table.positive_count(i) >= required)
        .collect::<Vec<_>>();

    table
        .peptides
        .iter()
        .enumerate()
        .map(|(i, peptide)| {
            let positive = table.positive_wells(i).collect::<Vec<_>>();
            let estimate = inputs.estimates.values[i];
            let result = classify(inputs, &eligible, i, &positive, estimate);
            DeconvolutionResult {
                peptide_id: peptide.id.clone(),
                peptide_sequence: peptide.sequence.clone(),
                hit_well_ids: positive.iter().map(|&j| table.wells[j].key()).collect(),
                hit_well_ids_count: positive.len(),
                hit_pool_ids: positive.iter().map(|&j| table.wells[j].pool_id).collect(),
                hit_pool_spot_counts: positive
                    .iter()
                    .map(|&j| table.wells[j].spot_count)
                    .collect(),
                estimated_peptide_spot_count: estimate,
                result,
            }
        })
        .collect()
}

fn classify(
    inputs: &Stage8Inputs<'_>,
    eligible: &[bool],
    peptide: usize,
    positive: &[usize],
    estimate: f64,
) -> HitLabel {
    if !eligible[peptide] {
        return HitLabel::Negative;
    }
    // A positive well no other eligible peptide could explain.
    let has_unique_well = positive.iter().any(|&j| {
        inputs.table.well_peptides[j]
            .iter()
            .all(|&other| other == peptide || !eligible[other])
    });
    if has_unique_well
        && estimate > inputs.estimates.background
        && estimate >= CONFIDENT_SPOT_MULTIPLE * inputs.min_positive_spot_count
    {
        HitLabel::ConfidentHit
    } else {
        HitLabel::CandidateHit
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage8_classify.rs"]
mod tests;
