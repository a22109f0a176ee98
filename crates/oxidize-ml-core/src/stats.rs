use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::{is_missing, real_key};

/// Distinct values tracked per field before the histogram is dropped.
pub const DEFAULT_MAX_NVALUES: usize = 400;

// JSON has no infinities: an untouched min/max is written as null.
fn ser_real<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    if v.is_finite() {
        s.serialize_some(v)
    } else {
        s.serialize_none()
    }
}

fn de_min<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
}

fn de_max<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NEG_INFINITY))
}

/// Running statistics of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub nmissing: usize,
    pub nnonmissing: usize,
    pub npositive: usize,
    pub nnegative: usize,
    pub sum: f64,
    pub sumsquare: f64,
    #[serde(serialize_with = "ser_real", deserialize_with = "de_min")]
    pub min: f64,
    #[serde(serialize_with = "ser_real", deserialize_with = "de_max")]
    pub max: f64,
    max_nvalues: usize,
    /// Value counts keyed by [`real_key`]. `None` once more
    /// than `max_nvalues` distinct values were seen.
    counts: Option<HashMap<u64, usize>>,
}

impl FieldStats {
    pub fn new(max_nvalues: usize) -> Self {
        FieldStats {
            nmissing: 0,
            nnonmissing: 0,
            npositive: 0,
            nnegative: 0,
            sum: 0.0,
            sumsquare: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            max_nvalues,
            counts: if max_nvalues > 0 { Some(HashMap::new()) } else { None },
        }
    }

    pub fn update(&mut self, v: f64) {
        if is_missing(v) {
            self.nmissing += 1;
            return;
        }
        self.nnonmissing += 1;
        if v > 0.0 {
            self.npositive += 1;
        } else if v < 0.0 {
            self.nnegative += 1;
        }
        self.sum += v;
        self.sumsquare += v * v;
        if v < self.min {
            self.min = v;
        }
        if v > self.max {
            self.max = v;
        }
        if let Some(counts) = self.counts.as_mut() {
            *counts.entry(real_key(v)).or_insert(0) += 1;
            if counts.len() > self.max_nvalues {
                self.counts = None;
            }
        }
    }

    /// Total number of observations, missing included.
    pub fn n(&self) -> usize {
        self.nmissing + self.nnonmissing
    }

    pub fn mean(&self) -> f64 {
        if self.nnonmissing == 0 {
            return f64::NAN;
        }
        self.sum / self.nnonmissing as f64
    }

    /// Unbiased variance of the non-missing values.
    pub fn variance(&self) -> f64 {
        let n = self.nnonmissing as f64;
        if self.nnonmissing < 2 {
            return f64::NAN;
        }
        let mean = self.sum / n;
        ((self.sumsquare - n * mean * mean) / (n - 1.0)).max(0.0)
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Number of distinct values, when still tracked.
    pub fn nvalues(&self) -> Option<usize> {
        self.counts.as_ref().map(|c| c.len())
    }

    /// `(value, count)` pairs sorted by value, when still tracked.
    pub fn histogram(&self) -> Option<Vec<(f64, usize)>> {
        self.counts.as_ref().map(|c| {
            let mut h: Vec<(f64, usize)> = c.iter().map(|(k, n)| (f64::from_bits(*k), *n)).collect();
            h.sort_by(|a, b| a.0.total_cmp(&b.0));
            h
        })
    }
}

impl Default for FieldStats {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NVALUES)
    }
}

/// Statistics of every column of a matrix, with the dimensions they were
/// computed for so that a persisted copy can be checked for freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixStats {
    pub length: usize,
    pub width: usize,
    pub fields: Vec<FieldStats>,
}

impl MatrixStats {
    pub fn new(length: usize, width: usize, max_nvalues: usize) -> Self {
        MatrixStats {
            length,
            width,
            fields: (0..width).map(|_| FieldStats::new(max_nvalues)).collect(),
        }
    }

    pub fn update_row(&mut self, row: &[f64]) {
        for (s, &v) in self.fields.iter_mut().zip(row) {
            s.update(v);
        }
    }

    pub fn matches(&self, length: usize, width: usize) -> bool {
        self.length == length && self.width == width && self.fields.len() == width
    }
}
