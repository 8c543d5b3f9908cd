use serde::Serialize;
use serde_json::{Value, json};

use crate::error::ElispotError;
use crate::model::deconvolution::Deconvolution;
use crate::model::design::Design;
use crate::pipeline::identify::Identification;
use crate::report::columnar::to_columnar;

pub const TOOL_NAME: &str = "kira-elispot";

#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    tool: &'static str,
    version: &'static str,
    command: &'static str,
    summary: &'a T,
}

pub fn render_summary_json<T: Serialize>(
    command: &'static str,
    summary: &T,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Envelope {
        tool: TOOL_NAME,
        version: env!("CARGO_PKG_VERSION"),
        command,
        summary,
    })
}

pub fn design_response(design: &Design) -> Result<Value, serde_json::Error> {
    Ok(json!({
        "assignments": to_columnar(&design.assignments)?,
        "assignments_bench_ready": to_columnar(&design.bench_ready)?,
        "metadata": serde_json::to_value(&design.metadata)?,
        "preferred_peptide_pairs": to_columnar(&design.preferred_pairs)?,
    }))
}

pub fn deconvolution_response(deconvolution: &Deconvolution) -> Result<Value, serde_json::Error> {
    Ok(json!({
        "results": to_columnar(&deconvolution.results)?,
        "summary": serde_json::to_value(&deconvolution.summary)?,
    }))
}

pub fn identification_response(identification: &Identification) -> Result<Value, serde_json::Error> {
    Ok(json!({
        "hit_peptide_summary": to_columnar(&identification.hit_peptide_summary)?,
        "elispot_configuration": to_columnar(&identification.elispot_configuration)?,
        "plate_readout": to_columnar(&identification.plate_readout)?,
    }))
}

pub fn error_response(err: &ElispotError) -> Value {
    json!({
        "error": {
            "kind": err.kind(),
            "message": err.to_string(),
        }
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/json.rs"]
mod tests;
