/// Sentinel stored in a matrix cell whose value is unknown.
pub const MISSING: f64 = f64::NAN;

/// Whether a stored value is the missing sentinel.
#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}

/// Render a real the way text dumps and string fallbacks expect it.
pub fn format_real(v: f64) -> String {
    if is_missing(v) {
        "nan".to_string()
    } else {
        format!("{}", v)
    }
}

/// Parse a real, accepting the usual spellings of missing.
pub fn parse_real(s: &str) -> Option<f64> {
    let t = s.trim();
    match t {
        "" | "nan" | "NaN" | "NAN" | "?" => Some(MISSING),
        _ => t.parse::<f64>().ok(),
    }
}

/// Hash key of a real: its bit pattern, with `-0.0` folded onto `0.0`.
pub fn real_key(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

/// Rows covered by `fraction` of `n` rows, floored. Products within 1e-9
/// of an integer are rounded so `0.29 * 100` gives 29, not 28.
pub fn fraction_rows(fraction: f64, n: usize) -> usize {
    let exact = fraction * n as f64;
    let rows = if (exact - exact.round()).abs() < 1e-9 {
        exact.round()
    } else {
        exact.floor()
    };
    rows as usize
}

/// Inner product of two equally long slices.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Squared L2 distance between two equally long slices.
#[inline]
pub fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing() {
        assert!(is_missing(MISSING));
        assert!(!is_missing(0.0));
        assert_eq!(format_real(MISSING), "nan");
        assert_eq!(format_real(1.5), "1.5");
    }

    #[test]
    fn test_fraction_rows() {
        assert_eq!(fraction_rows(0.29, 100), 29);
        assert_eq!(fraction_rows(0.57, 100), 57);
        assert_eq!(fraction_rows(0.5, 7), 3);
        assert_eq!(fraction_rows(1.0, 7), 7);
        assert_eq!(fraction_rows(0.0, 7), 0);
    }

    #[test]
    fn test_parse_real() {
        assert_eq!(parse_real(" 2.5 "), Some(2.5));
        assert!(is_missing(parse_real("nan").unwrap()));
        assert!(is_missing(parse_real("").unwrap()));
        assert_eq!(parse_real("red"), None);
    }

    #[test]
    fn test_dot_and_dist() {
        assert_eq!(dot(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
        assert_eq!(sq_dist(&[1.0, 2.0], &[3.0, 4.0]), 8.0);
    }
}
