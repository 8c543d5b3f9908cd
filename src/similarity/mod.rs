pub mod encoding;

use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ElispotError;
use crate::model::peptide::{Peptide, PreferredPeptidePair, sequence_problem};
use encoding::{encode, normalized_properties, residue_distance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityFunction {
    Euclidean,
    Cosine,
    Levenshtein,
}

impl SimilarityFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            SimilarityFunction::Euclidean => "euclidean",
            SimilarityFunction::Cosine => "cosine",
            SimilarityFunction::Levenshtein => "levenshtein",
        }
    }
}

impl FromStr for SimilarityFunction {
    type Err = ElispotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" => Ok(SimilarityFunction::Euclidean),
            "cosine" => Ok(SimilarityFunction::Cosine),
            "levenshtein" => Ok(SimilarityFunction::Levenshtein),
            other => Err(ElispotError::invalid_parameter(
                "similarity_function",
                other,
                "expected one of euclidean, cosine, levenshtein",
            )),
        }
    }
}

pub fn validate_peptide(peptide: &Peptide) -> Result<(), ElispotError> {
    match sequence_problem(&peptide.sequence) {
        Some(reason) => Err(ElispotError::InvalidSequence {
            peptide_id: peptide.id.clone(),
            sequence: peptide.sequence.clone(),
            reason,
        }),
        None => Ok(()),
    }
}

pub fn validate_threshold(threshold: f64, function: SimilarityFunction) -> Result<(), ElispotError> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ElispotError::InvalidThreshold {
            threshold,
            function: function.as_str().to_string(),
        })
    }
}

/// Similarity of two sequences in [0, 1]; identical sequences score 1.
pub fn score(seq_a: &str, seq_b: &str, function: SimilarityFunction) -> Result<f64, ElispotError> {
    validate_peptide(&Peptide::new("sequence_a", seq_a))?;
    validate_peptide(&Peptide::new("sequence_b", seq_b))?;
    Ok(score_encoded(&encode(seq_a), &encode(seq_b), function))
}

/// Every pair scoring strictly above `threshold`, most similar first. Within a
/// pair, `peptide_1` is the one listed earlier in `peptides`.
pub fn find_pairs_above_threshold(
    peptides: &[Peptide],
    threshold: f64,
    function: SimilarityFunction,
) -> Result<Vec<PreferredPeptidePair>, ElispotError> {
    let pairs = similar_index_pairs(peptides, threshold, function)?;
    Ok(preferred_pairs(peptides, &pairs))
}

pub fn preferred_pairs(
    peptides: &[Peptide],
    pairs: &[(usize, usize, f64)],
) -> Vec<PreferredPeptidePair> {
    let mut out = pairs
        .iter()
        .map(|&(i, j, similarity_score)| PreferredPeptidePair {
            peptide_1_id: peptides[i].id.clone(),
            peptide_1_sequence: peptides[i].sequence.clone(),
            peptide_2_id: peptides[j].id.clone(),
            peptide_2_sequence: peptides[j].sequence.clone(),
            similarity_score,
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| {
        b.similarity_score
            .total_cmp(&a.similarity_score)
            .then_with(|| a.peptide_1_id.cmp(&b.peptide_1_id))
            .then_with(|| a.peptide_2_id.cmp(&b.peptide_2_id))
    });
    out
}

/// Index pairs `(i, j)` with `i < j` scoring strictly above `threshold`, in
/// index order.
pub fn similar_index_pairs(
    peptides: &[Peptide],
    threshold: f64,
    function: SimilarityFunction,
) -> Result<Vec<(usize, usize, f64)>, ElispotError> {
    validate_threshold(threshold, function)?;
    for peptide in peptides {
        validate_peptide(peptide)?;
    }
    let encoded = peptides
        .iter()
        .map(|p| encode(&p.sequence))
        .collect::<Vec<_>>();
    let n = encoded.len();

    let pairs = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let encoded = &encoded;
            (i + 1..n).filter_map(move |j| {
                let s = score_encoded(&encoded[i], &encoded[j], function);
                (s > threshold).then_some((i, j, s))
            })
        })
        .collect::<Vec<_>>();
    Ok(pairs)
}

pub fn score_encoded(a: &[usize], b: &[usize], function: SimilarityFunction) -> f64 {
    let s = match function {
        SimilarityFunction::Euclidean => euclidean_similarity(a, b),
        SimilarityFunction::Cosine => cosine_similarity(a, b),
        SimilarityFunction::Levenshtein => levenshtein_similarity(a, b),
    };
    s.clamp(0.0, 1.0)
}

fn euclidean_similarity(a: &[usize], b: &[usize]) -> f64 {
    let len = a.len().max(b.len());
    if len == 0 {
        return 1.0;
    }
    let shared = a.len().min(b.len());
    let mut total = (len - shared) as f64;
    for i in 0..shared {
        total += residue_distance(a[i], b[i]);
    }
    1.0 - total / len as f64
}

fn cosine_similarity(a: &[usize], b: &[usize]) -> f64 {
    let table = normalized_properties();
    let norm = |seq: &[usize]| -> f64 {
        seq.iter()
            .map(|&r| table[r].iter().map(|v| v * v).sum::<f64>())
            .sum::<f64>()
            .sqrt()
    };
    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return if a == b { 1.0 } else { 0.0 };
    }
    let mut dot = 0.0;
    for (&ra, &rb) in a.iter().zip(b.iter()) {
        for k in 0..encoding::NUM_PROPERTIES {
            dot += table[ra][k] * table[rb][k];
        }
    }
    dot / (norm_a * norm_b)
}

fn levenshtein_similarity(a: &[usize], b: &[usize]) -> f64 {
    let len = a.len().max(b.len());
    if len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / len as f64
}

fn levenshtein(a: &[usize], b: &[usize]) -> usize {
    let mut prev = (0..=b.len()).collect::<Vec<_>>();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, &ra) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &rb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ra != rb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
#[path = "../../tests/src_inline/similarity/tests.rs"]
mod tests;
