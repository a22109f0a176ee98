use std::collections::HashSet;

use oxidize_ml_core::{VMatError, VMatResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::meta::VMatMeta;
use crate::sort::lexicographic_order;
use crate::vmatrix::{VMat, VMatrix};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortRowsConfig {
    /// Sort keys, highest precedence first: field names or column numbers.
    pub sort_columns: Vec<String>,
    pub increasing_order: bool,
}

impl Default for SortRowsConfig {
    fn default() -> Self {
        SortRowsConfig {
            sort_columns: Vec::new(),
            increasing_order: true,
        }
    }
}

/// Rows of a source reordered by one or more key columns.
///
/// The permutation is computed when built and never follows later changes of
/// the source; call [`SortRowsVMatrix::rebuild`] after mutating it.
pub struct SortRowsVMatrix {
    source: VMat,
    config: SortRowsConfig,
    sort_columns: RwLock<Vec<usize>>,
    indices: RwLock<Vec<usize>>,
    meta: VMatMeta,
}

impl SortRowsVMatrix {
    pub fn new(source: VMat, config: SortRowsConfig) -> VMatResult<Self> {
        let m = SortRowsVMatrix {
            source,
            config,
            sort_columns: RwLock::new(Vec::new()),
            indices: RwLock::new(Vec::new()),
            meta: VMatMeta::new(0, 0),
        };
        m.build()?;
        Ok(m)
    }

    /// Sort by column numbers.
    pub fn by_columns(source: VMat, columns: &[usize], increasing_order: bool) -> VMatResult<Self> {
        SortRowsVMatrix::new(
            source,
            SortRowsConfig {
                sort_columns: columns.iter().map(|c| c.to_string()).collect(),
                increasing_order,
            },
        )
    }

    /// `indices()[k]` is the source row shown at position `k`.
    pub fn indices(&self) -> Vec<usize> {
        self.indices.read().clone()
    }

    pub fn sort_columns(&self) -> Vec<usize> {
        self.sort_columns.read().clone()
    }

    pub fn build(&self) -> VMatResult<()> {
        let columns = self
            .config
            .sort_columns
            .iter()
            .map(|spec| {
                self.source
                    .get_field_index(spec)
                    .map_err(|e| VMatError::config(format!("sort column '{}': {}", spec, e)))
            })
            .collect::<VMatResult<Vec<usize>>>()?;
        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(**c)) {
            return Err(VMatError::config(format!("column {} is listed twice as a sort key", dup)));
        }

        self.meta.set_dims(self.source.length(), self.source.width());
        self.set_meta_info_from(self.source.as_ref());
        *self.sort_columns.write() = columns;
        self.rebuild()
    }

    /// Recompute the permutation from the source's current content.
    pub fn rebuild(&self) -> VMatResult<()> {
        let columns = self.sort_columns();
        let length = self.source.length();
        let indices = if columns.is_empty() {
            (0..length).collect()
        } else {
            let mut keys = Vec::with_capacity(length);
            for i in 0..length {
                keys.push(
                    columns
                        .iter()
                        .map(|&c| self.source.get(i, c))
                        .collect::<VMatResult<Vec<f64>>>()?,
                );
            }
            lexicographic_order(&keys, self.config.increasing_order)
        };
        self.meta.set_length(length);
        *self.indices.write() = indices;
        debug!(length, keys = ?columns, increasing = self.config.increasing_order, "built SortRowsVMatrix");
        Ok(())
    }

    fn source_row(&self, i: usize) -> usize {
        self.indices.read()[i]
    }
}

impl VMatrix for SortRowsVMatrix {
    fn meta(&self) -> &VMatMeta {
        &self.meta
    }

    fn class_name(&self) -> &'static str {
        "SortRowsVMatrix"
    }

    fn get(&self, i: usize, j: usize) -> VMatResult<f64> {
        self.meta.check(i, j)?;
        self.source.get(self.source_row(i), j)
    }

    fn get_sub_row(&self, i: usize, j: usize, buf: &mut [f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, buf.len())?;
        self.source.get_sub_row(self.source_row(i), j, buf)
    }

    fn dot(&self, i1: usize, i2: usize, inputsize: usize) -> VMatResult<f64> {
        self.meta.check_span(i1, 0, inputsize)?;
        self.meta.check_span(i2, 0, inputsize)?;
        self.source.dot(self.source_row(i1), self.source_row(i2), inputsize)
    }

    fn reset_dimensions(&self) -> VMatResult<()> {
        self.build()
    }
}
