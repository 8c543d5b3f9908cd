use serde::{Deserialize, Serialize};

pub const AMINO_ACIDS: &str = "ACDEFGHIKLMNPQRSTVWY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peptide {
    #[serde(alias = "peptide_id")]
    pub id: String,
    #[serde(alias = "peptide_sequence", default)]
    pub sequence: String,
}

impl Peptide {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
        }
    }
}

/// Peptides handed to the generator: real sequences, or only a count when
/// sequences are not available.
#[derive(Debug, Clone)]
pub enum PeptideSource {
    Sequences(Vec<Peptide>),
    Count(usize),
}

impl PeptideSource {
    pub fn has_sequences(&self) -> bool {
        matches!(self, PeptideSource::Sequences(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferredPeptidePair {
    pub peptide_1_id: String,
    pub peptide_1_sequence: String,
    pub peptide_2_id: String,
    pub peptide_2_sequence: String,
    pub similarity_score: f64,
}

pub fn synthetic_peptides(count: usize) -> Vec<Peptide> {
    (1..=count)
        .map(|i| Peptide::new(format!("peptide_{i}"), ""))
        .collect()
}

/// Returns a description of the first problem with `sequence`, or `None` when
/// every residue is one of the 20 standard amino acids.
pub fn sequence_problem(sequence: &str) -> Option<String> {
    if sequence.is_empty() {
        return Some("sequence is empty".to_string());
    }
    sequence
        .chars()
        .find(|c| !AMINO_ACIDS.contains(*c))
        .map(|c| format!("unsupported residue {c:?}"))
}
