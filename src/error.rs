use thiserror::Error;

use crate::input::InputError;

#[derive(Debug, Error)]
pub enum ElispotError {
    #[error("invalid sequence {sequence:?} for peptide {peptide_id}: {reason}")]
    InvalidSequence {
        peptide_id: String,
        sequence: String,
        reason: String,
    },
    #[error("invalid similarity threshold {threshold} for {function}: expected a value in [0, 1]")]
    InvalidThreshold { threshold: f64, function: String },
    #[error(
        "infeasible design: {num_peptides} peptides need unique pool sets, but {pools_per_coverage} pools per coverage round over {coverage} rounds allow only {num_signatures} combinations"
    )]
    InfeasibleDesign {
        num_peptides: usize,
        pools_per_coverage: usize,
        coverage: usize,
        num_signatures: u128,
    },
    #[error("deconvolution input mismatch: {0}")]
    DeconvolutionInputMismatch(String),
    #[error("invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("duplicate peptide id {0}")]
    DuplicatePeptideId(String),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ElispotError {
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ElispotError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ElispotError::InvalidSequence { .. } => "invalid_sequence",
            ElispotError::InvalidThreshold { .. } => "invalid_threshold",
            ElispotError::InfeasibleDesign { .. } => "infeasible_design",
            ElispotError::DeconvolutionInputMismatch(_) => "deconvolution_input_mismatch",
            ElispotError::InvalidParameter { .. } => "invalid_parameter",
            ElispotError::DuplicatePeptideId(_) => "duplicate_peptide_id",
            ElispotError::Input(_) => "input",
            ElispotError::Json(_) => "json",
            ElispotError::Io(_) => "io",
        }
    }
}
