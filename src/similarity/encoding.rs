use std::sync::OnceLock;

use crate::model::peptide::AMINO_ACIDS;

pub const NUM_PROPERTIES: usize = 11;

// Columns: alpha-helix propensity, beta-sheet propensity, charge, core
// frequency, hydropathy, pH class, polarity, rim frequency, surface frequency,
// turn propensity, side-chain volume. Rows follow AMINO_ACIDS.
const RAW_PROPERTIES: [[f64; NUM_PROPERTIES]; 20] = [
    [1.29, 0.90, 0.0, 0.049, 1.8, 0.0, 0.0, 0.047, 0.065, 0.78, 67.0],
    [1.11, 0.74, 0.0, 0.020, 2.5, -2.0, 0.0, 0.015, 0.015, 0.80, 86.0],
    [1.04, 0.72, -1.0, 0.051, -3.5, -2.0, 1.0, 0.071, 0.074, 1.41, 91.0],
    [1.44, 0.75, -1.0, 0.051, -3.5, -2.0, 1.0, 0.094, 0.089, 1.00, 109.0],
    [1.07, 1.32, 0.0, 0.051, 2.8, 0.0, 0.0, 0.021, 0.029, 0.58, 135.0],
    [0.56, 0.92, 0.0, 0.060, -0.4, 0.0, 0.0, 0.071, 0.070, 1.64, 48.0],
    [1.22, 1.08, 0.0, 0.034, -3.2, 1.0, 1.0, 0.022, 0.025, 0.69, 118.0],
    [0.97, 1.45, 0.0, 0.047, 4.5, 0.0, 0.0, 0.032, 0.035, 0.51, 124.0],
    [1.23, 0.77, 1.0, 0.050, -3.9, 2.0, 1.0, 0.105, 0.080, 0.96, 135.0],
    [1.30, 1.02, 0.0, 0.078, 3.8, 0.0, 0.0, 0.052, 0.063, 0.59, 124.0],
    [1.47, 0.97, 0.0, 0.027, 1.9, 0.0, 0.0, 0.017, 0.016, 0.39, 124.0],
    [0.90, 0.76, 0.0, 0.058, -3.5, 0.0, 1.0, 0.062, 0.053, 1.28, 96.0],
    [0.52, 0.64, 0.0, 0.051, -1.6, 0.0, 0.0, 0.052, 0.054, 1.91, 90.0],
    [1.27, 0.80, 0.0, 0.051, -3.5, 1.0, 1.0, 0.053, 0.051, 0.97, 114.0],
    [0.96, 0.99, 1.0, 0.066, -4.5, 2.0, 1.0, 0.068, 0.059, 0.88, 148.0],
    [0.82, 0.95, 0.0, 0.057, -0.8, -1.0, 1.0, 0.072, 0.071, 1.33, 73.0],
    [0.82, 1.21, 0.0, 0.064, -0.7, -1.0, 0.0, 0.064, 0.065, 1.03, 93.0],
    [0.91, 1.49, 0.0, 0.049, 4.2, 0.0, 0.0, 0.048, 0.048, 0.47, 105.0],
    [0.99, 1.14, 0.0, 0.022, -0.9, 1.0, 1.0, 0.007, 0.012, 0.75, 163.0],
    [0.72, 1.25, 0.0, 0.070, -1.3, -1.0, 1.0, 0.032, 0.033, 1.05, 141.0],
];

pub fn residue_index(residue: char) -> Option<usize> {
    AMINO_ACIDS.find(residue)
}

/// Property table with every column min-max scaled to [0, 1].
pub fn normalized_properties() -> &'static [[f64; NUM_PROPERTIES]; 20] {
    static TABLE: OnceLock<[[f64; NUM_PROPERTIES]; 20]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut out = RAW_PROPERTIES;
        for col in 0..NUM_PROPERTIES {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for row in RAW_PROPERTIES.iter() {
                lo = lo.min(row[col]);
                hi = hi.max(row[col]);
            }
            let span = hi - lo;
            for row in out.iter_mut() {
                row[col] = if span > 0.0 { (row[col] - lo) / span } else { 0.0 };
            }
        }
        out
    })
}

/// Residue indices of a validated sequence. Unknown residues are dropped, so
/// callers validate first.
pub fn encode(sequence: &str) -> Vec<usize> {
    sequence.chars().filter_map(residue_index).collect()
}

/// Euclidean distance between two residues, scaled to [0, 1].
pub fn residue_distance(a: usize, b: usize) -> f64 {
    if a == b {
        return 0.0;
    }
    let table = normalized_properties();
    let mut sum = 0.0;
    for k in 0..NUM_PROPERTIES {
        let d = table[a][k] - table[b][k];
        sum += d * d;
    }
    (sum / NUM_PROPERTIES as f64).sqrt()
}

#[cfg(test)]
#[path = "../../tests/src_inline/similarity/encoding.rs"]
mod tests;
