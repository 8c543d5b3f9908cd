use super::*;

#[test]
fn test_properties_are_min_max_scaled() {
    let table = normalized_properties();
    for col in 0..NUM_PROPERTIES {
        let values = table.iter().map(|row| row[col]).collect::<Vec<_>>();
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(lo, 0.0, "column {col}");
        assert_eq!(hi, 1.0, "column {col}");
    }
}

#[test]
fn test_residue_distance_bounds() {
    for a in 0..20 {
        assert_eq!(residue_distance(a, a), 0.0);
        for b in 0..20 {
            let d = residue_distance(a, b);
            assert!((0.0..=1.0).contains(&d));
            assert_eq!(d, residue_distance(b, a));
        }
    }
}

#[test]
fn test_encode_uses_alphabet_order() {
    assert_eq!(encode("ACY"), vec![0, 1, 19]);
    assert_eq!(residue_index('B'), None);
}
