use std::sync::Arc;

use oxidize_ml_core::{FieldInfo, RoleSizes, StringMap, VMatError, VMatResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::kernel::{compute_gram_matrix, input_rows, nearest_neighbors, Kernel, KernelSpec};
use crate::meta::VMatMeta;
use crate::vmatrix::{VMat, VMatrix};

/// Bag tag of a row that opens its neighbour group.
pub const BAG_FIRST: f64 = 1.0;
/// Bag tag of a row that closes its neighbour group.
pub const BAG_LAST: f64 = 2.0;
/// Bag tag of a group made of a single row.
pub const BAG_BOTH: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KNNConfig {
    /// Neighbours per source row, the row itself included.
    pub knn: usize,
    /// Kernel ranking neighbours; smaller is nearer.
    pub distance: KernelSpec,
    /// When set, an extra input column holds the normalised affinity p_ij.
    pub kernel_pij: Option<KernelSpec>,
}

impl Default for KNNConfig {
    fn default() -> Self {
        KNNConfig {
            knn: 6,
            distance: KernelSpec::default(),
            kernel_pij: None,
        }
    }
}

/// Where an output row comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborRef {
    /// Source row whose neighbourhood this row belongs to.
    pub i_ref: usize,
    /// Rank of the neighbour, 0 being the reference row itself.
    pub i_n: usize,
    /// Source row actually shown.
    pub source_row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Source(usize),
    Pij,
    BagTag,
}

#[derive(Debug, Default)]
struct Neighborhoods {
    nn: Vec<Vec<usize>>,
    pij: Vec<Vec<f64>>,
    columns: Vec<Column>,
}

/// Every source row followed by its nearest neighbours.
///
/// Row `i * knn + p` shows the `p`-th nearest neighbour of source row `i`
/// (`p == 0` is row `i` itself). The output layout is
/// `[input.., p_ij?, target.., bag_tag, weight.., extra..]`.
pub struct KNNVMatrix {
    source: VMat,
    knn: usize,
    distance: Arc<dyn Kernel>,
    kernel_pij: Option<Arc<dyn Kernel>>,
    state: RwLock<Neighborhoods>,
    meta: VMatMeta,
}

impl KNNVMatrix {
    pub fn new(source: VMat, config: KNNConfig) -> VMatResult<Self> {
        let distance = config.distance.build()?;
        let kernel_pij = config.kernel_pij.map(|k| k.build()).transpose()?;
        KNNVMatrix::with_kernels(source, config.knn, distance, kernel_pij)
    }

    pub fn with_kernels(
        source: VMat,
        knn: usize,
        distance: Arc<dyn Kernel>,
        kernel_pij: Option<Arc<dyn Kernel>>,
    ) -> VMatResult<Self> {
        let m = KNNVMatrix {
            source,
            knn,
            distance,
            kernel_pij,
            state: RwLock::new(Neighborhoods::default()),
            meta: VMatMeta::new(0, 0),
        };
        m.build()?;
        Ok(m)
    }

    pub fn knn(&self) -> usize {
        self.knn
    }

    pub fn source(&self) -> &VMat {
        &self.source
    }

    /// Neighbours of every source row, self first.
    pub fn neighbors(&self) -> Vec<Vec<usize>> {
        self.state.read().nn.clone()
    }

    /// Decompose an output row index.
    pub fn source_index_of(&self, i: usize) -> VMatResult<NeighborRef> {
        self.meta.check_row(i)?;
        let (i_ref, i_n) = (i / self.knn, i % self.knn);
        Ok(NeighborRef {
            i_ref,
            i_n,
            source_row: self.state.read().nn[i_ref][i_n],
        })
    }

    /// Tag of the `p`-th row of a neighbour group.
    pub fn bag_tag(&self, p: usize) -> f64 {
        match (p == 0, p + 1 == self.knn) {
            (true, true) => BAG_BOTH,
            (true, false) => BAG_FIRST,
            (false, true) => BAG_LAST,
            (false, false) => 0.0,
        }
    }

    /// Compute neighbourhoods, affinities and output metadata.
    pub fn build(&self) -> VMatResult<()> {
        let (sl, sw) = (self.source.length(), self.source.width());
        if self.knn == 0 || self.knn > sl {
            return Err(VMatError::config(format!(
                "knn must lie in [1, {}], got {}",
                sl, self.knn
            )));
        }
        let (is, ts, ws) = self.source.sizes().resolve(sw).required()?;
        let es = sw - is - ts - ws;

        let inputs = input_rows(self.source.as_ref(), is)?;
        let gram = compute_gram_matrix(&inputs, self.distance.as_ref());
        let nn: Vec<Vec<usize>> = gram
            .iter()
            .enumerate()
            .map(|(i, row)| nearest_neighbors(row, self.knn, i))
            .collect();

        let pij = match &self.kernel_pij {
            Some(k) => nn
                .iter()
                .enumerate()
                .map(|(i, group)| affinities(k.as_ref(), &inputs, i, group))
                .collect(),
            None => Vec::new(),
        };

        let has_pij = self.kernel_pij.is_some();
        let mut columns: Vec<Column> = (0..is).map(Column::Source).collect();
        if has_pij {
            columns.push(Column::Pij);
        }
        columns.extend((is..is + ts).map(Column::Source));
        columns.push(Column::BagTag);
        columns.extend((is + ts..sw).map(Column::Source));

        let width = columns.len();
        self.meta.set_dims(sl * self.knn, width);
        let src_fields = self.source.field_infos();
        let fields = columns
            .iter()
            .map(|c| match c {
                Column::Source(j) => src_fields[*j].clone(),
                Column::Pij => FieldInfo::named("p_ij"),
                Column::BagTag => FieldInfo::named("bag_tag"),
            })
            .collect();
        self.meta.set_field_infos(fields)?;
        let maps = columns
            .iter()
            .map(|c| match c {
                Column::Source(j) => self.source.string_map(*j),
                _ => Ok(StringMap::new()),
            })
            .collect::<VMatResult<Vec<_>>>()?;
        self.meta.set_string_maps(maps)?;
        self.meta.set_sizes(RoleSizes::new(
            is + usize::from(has_pij),
            ts + 1,
            ws,
            es,
        ))?;

        *self.state.write() = Neighborhoods { nn, pij, columns };
        debug!(source_length = sl, knn = self.knn, width, "built KNNVMatrix");
        Ok(())
    }
}

/// `-1` for the reference row, then `K(x_i, x_j) / sum_k K(x_i, x_k)` over
/// the non-self neighbours.
fn affinities(kernel: &dyn Kernel, inputs: &[Vec<f64>], i: usize, group: &[usize]) -> Vec<f64> {
    let k: Vec<f64> = group[1..]
        .iter()
        .map(|&j| kernel.evaluate(&inputs[i], &inputs[j]))
        .collect();
    let total: f64 = k.iter().sum();
    let mut out = Vec::with_capacity(group.len());
    out.push(-1.0);
    if total > 0.0 {
        out.extend(k.iter().map(|v| v / total));
    } else {
        let n = k.len() as f64;
        out.extend(k.iter().map(|_| 1.0 / n));
    }
    out
}

impl VMatrix for KNNVMatrix {
    fn meta(&self) -> &VMatMeta {
        &self.meta
    }

    fn class_name(&self) -> &'static str {
        "KNNVMatrix"
    }

    fn get(&self, i: usize, j: usize) -> VMatResult<f64> {
        self.meta.check(i, j)?;
        let (i_ref, i_n) = (i / self.knn, i % self.knn);
        let state = self.state.read();
        match state.columns[j] {
            Column::Source(sj) => self.source.get(state.nn[i_ref][i_n], sj),
            Column::Pij => Ok(state.pij[i_ref][i_n]),
            Column::BagTag => Ok(self.bag_tag(i_n)),
        }
    }

    fn get_sub_row(&self, i: usize, j: usize, buf: &mut [f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, buf.len())?;
        let (i_ref, i_n) = (i / self.knn, i % self.knn);
        let state = self.state.read();
        let src = state.nn[i_ref][i_n];
        let row = self.source.row(src)?;
        let n = buf.len();
        for (slot, c) in buf.iter_mut().zip(&state.columns[j..j + n]) {
            *slot = match *c {
                Column::Source(sj) => row[sj],
                Column::Pij => state.pij[i_ref][i_n],
                Column::BagTag => self.bag_tag(i_n),
            };
        }
        Ok(())
    }

    fn reset_dimensions(&self) -> VMatResult<()> {
        self.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::GaussianKernel;
    use crate::memory::MemoryVMatrix;
    use approx::assert_relative_eq;

    /// Five points on a line, one input and one target column.
    fn line() -> VMat {
        let m = MemoryVMatrix::from_rows(&[
            vec![0.0, 10.0],
            vec![1.0, 11.0],
            vec![3.0, 13.0],
            vec![6.0, 16.0],
            vec![10.0, 20.0],
        ])
        .unwrap();
        m.declare_field_names(&["x", "y"]).unwrap();
        m.set_sizes(RoleSizes::new(1, 1, 0, 0)).unwrap();
        Arc::new(m)
    }

    fn knn3(src: VMat) -> KNNVMatrix {
        KNNVMatrix::new(
            src,
            KNNConfig {
                knn: 3,
                ..KNNConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions_and_decomposition() {
        let k = knn3(line());
        assert_eq!(k.length(), 15);
        assert_eq!(k.width(), 3);
        assert_eq!(k.sizes(), RoleSizes::new(1, 2, 0, 0));
        let r = k.source_index_of(7).unwrap();
        assert_eq!((r.i_ref, r.i_n), (2, 1));
        // x=3: nearest others are x=1 (d=4) then x=0 and x=6 (d=9), lower index wins
        assert_eq!(r.source_row, 1);
        assert_eq!(k.neighbors()[2], vec![2, 1, 0]);
        assert!(k.source_index_of(15).is_err());
    }

    #[test]
    fn test_rows_and_bag_tags() {
        let k = knn3(line());
        assert_eq!(k.field_names(), vec!["x", "y", "bag_tag"]);
        assert_eq!(k.row(6).unwrap(), vec![3.0, 13.0, BAG_FIRST]);
        assert_eq!(k.row(7).unwrap(), vec![1.0, 11.0, 0.0]);
        assert_eq!(k.row(8).unwrap(), vec![0.0, 10.0, BAG_LAST]);
        let mut buf = [0.0; 2];
        k.get_sub_row(8, 1, &mut buf).unwrap();
        assert_eq!(buf, [10.0, BAG_LAST]);
    }

    #[test]
    fn test_single_neighbour_is_both() {
        let k = KNNVMatrix::new(
            line(),
            KNNConfig {
                knn: 1,
                ..KNNConfig::default()
            },
        )
        .unwrap();
        assert_eq!(k.length(), 5);
        assert_eq!(k.get(3, 2).unwrap(), BAG_BOTH);
    }

    #[test]
    fn test_pij_column() {
        let sigma = 1.0;
        let k = KNNVMatrix::with_kernels(
            line(),
            3,
            Arc::new(crate::kernel::DistanceKernel::default()),
            Some(Arc::new(GaussianKernel { sigma })),
        )
        .unwrap();
        assert_eq!(k.width(), 4);
        assert_eq!(k.sizes(), RoleSizes::new(2, 2, 0, 0));
        assert_eq!(k.field_names(), vec!["x", "p_ij", "y", "bag_tag"]);
        // group of row 0: self, x=1 (d=1), x=3 (d=9)
        assert_eq!(k.get(0, 1).unwrap(), -1.0);
        let k1 = (-0.5f64).exp();
        let k2 = (-4.5f64).exp();
        assert_relative_eq!(k.get(1, 1).unwrap(), k1 / (k1 + k2), epsilon = 1e-12);
        assert_relative_eq!(k.get(2, 1).unwrap(), k2 / (k1 + k2), epsilon = 1e-12);
        assert_relative_eq!(k.get(1, 1).unwrap() + k.get(2, 1).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_knn() {
        assert!(KNNVMatrix::new(line(), KNNConfig { knn: 0, ..KNNConfig::default() }).is_err());
        assert!(KNNVMatrix::new(line(), KNNConfig { knn: 6, ..KNNConfig::default() }).is_err());
    }

    #[test]
    fn test_unknown_sizes_use_all_columns() {
        let src: VMat = Arc::new(MemoryVMatrix::from_rows(&[vec![0.0, 0.0], vec![0.0, 5.0], vec![0.0, 1.0]]).unwrap());
        let k = KNNVMatrix::new(src, KNNConfig { knn: 2, ..KNNConfig::default() }).unwrap();
        assert_eq!(k.sizes(), RoleSizes::new(2, 1, 0, 0));
        assert_eq!(k.neighbors()[0], vec![0, 2]);
    }
}
