use std::sync::Arc;

use oxidize_ml_core::{VMatError, VMatResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::vmatrix::VMatrix;

/// Scalar function of two rows.
pub trait Kernel: Send + Sync {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64;
}

/// L_n distance, optionally left raised to the n-th power.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceKernel {
    pub n: f64,
    pub pow_distance: bool,
}

impl Default for DistanceKernel {
    /// Squared Euclidean distance.
    fn default() -> Self {
        DistanceKernel {
            n: 2.0,
            pow_distance: true,
        }
    }
}

impl Kernel for DistanceKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let sum: f64 = if self.n == 2.0 {
            oxidize_ml_core::value::sq_dist(x1, x2)
        } else if self.n == 1.0 {
            x1.iter().zip(x2).map(|(a, b)| (a - b).abs()).sum()
        } else {
            x1.iter().zip(x2).map(|(a, b)| (a - b).abs().powf(self.n)).sum()
        };
        if self.pow_distance {
            sum
        } else {
            sum.powf(1.0 / self.n)
        }
    }
}

/// `exp(-|x1 - x2|^2 / (2 sigma^2))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianKernel {
    pub sigma: f64,
}

impl Kernel for GaussianKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let d = oxidize_ml_core::value::sq_dist(x1, x2);
        (-d / (2.0 * self.sigma * self.sigma)).exp()
    }
}

/// Serializable description of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelSpec {
    Distance { n: f64, pow_distance: bool },
    Gaussian { sigma: f64 },
}

impl Default for KernelSpec {
    fn default() -> Self {
        KernelSpec::Distance {
            n: 2.0,
            pow_distance: true,
        }
    }
}

impl KernelSpec {
    pub fn build(&self) -> VMatResult<Arc<dyn Kernel>> {
        Ok(match *self {
            KernelSpec::Distance { n, pow_distance } => {
                if n <= 0.0 {
                    return Err(VMatError::config(format!("distance order must be positive, got {}", n)));
                }
                Arc::new(DistanceKernel { n, pow_distance })
            }
            KernelSpec::Gaussian { sigma } => {
                if sigma <= 0.0 {
                    return Err(VMatError::config(format!("sigma must be positive, got {}", sigma)));
                }
                Arc::new(GaussianKernel { sigma })
            }
        })
    }
}

/// First `inputsize` columns of every row.
pub fn input_rows(vm: &dyn VMatrix, inputsize: usize) -> VMatResult<Vec<Vec<f64>>> {
    (0..vm.length())
        .map(|i| {
            let mut row = vec![0.0; inputsize];
            vm.get_sub_row(i, 0, &mut row)?;
            Ok(row)
        })
        .collect()
}

/// Full pairwise kernel matrix between rows, computed one row per task.
pub fn compute_gram_matrix(rows: &[Vec<f64>], kernel: &dyn Kernel) -> Vec<Vec<f64>> {
    rows.par_iter()
        .map(|x| rows.iter().map(|y| kernel.evaluate(x, y)).collect())
        .collect()
}

/// `self_index` followed by the `k - 1` other indices with the smallest
/// values in `distances`, nearest first. Ties go to the lower index.
pub fn nearest_neighbors(distances: &[f64], k: usize, self_index: usize) -> Vec<usize> {
    let mut others: Vec<usize> = (0..distances.len()).filter(|&j| j != self_index).collect();
    others.sort_by(|&a, &b| crate::sort::compare_reals(distances[a], distances[b]).then(a.cmp(&b)));
    let mut out = Vec::with_capacity(k);
    out.push(self_index);
    out.extend(others.into_iter().take(k.saturating_sub(1)));
    out
}
