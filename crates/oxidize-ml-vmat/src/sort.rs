use std::cmp::Ordering;

use oxidize_ml_core::is_missing;

/// Total order on reals where missing values come after every number.
pub fn compare_reals(a: f64, b: f64) -> Ordering {
    match (is_missing(a), is_missing(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.total_cmp(&b),
    }
}

/// Lexicographic comparison of two equally long key rows.
pub fn compare_keys(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| compare_reals(*x, *y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Permutation putting `keys` in lexicographic order. `keys[r]` holds the
/// sort keys of row `r`, highest precedence first. Rows with equal keys keep
/// their relative order in both directions.
pub fn lexicographic_order(keys: &[Vec<f64>], increasing: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| {
        let o = compare_keys(&keys[a], &keys[b]);
        if increasing {
            o
        } else {
            o.reverse()
        }
    });
    order
}

/// Whether `indices` is a bijection onto `[0, indices.len())`.
pub fn is_permutation(indices: &[usize]) -> bool {
    let mut seen = vec![false; indices.len()];
    for &i in indices {
        if i >= seen.len() || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}
