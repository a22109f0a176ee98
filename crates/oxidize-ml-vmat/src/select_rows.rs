use oxidize_ml_core::{VMatError, VMatResult};
use tracing::debug;

use crate::meta::VMatMeta;
use crate::vmatrix::{VMat, VMatrix};

/// Rows of a source gathered through an index list. Indices may repeat.
pub struct SelectRowsVMatrix {
    source: VMat,
    indices: Vec<usize>,
    meta: VMatMeta,
}

impl SelectRowsVMatrix {
    pub fn new(source: VMat, indices: Vec<usize>) -> VMatResult<Self> {
        let m = SelectRowsVMatrix {
            meta: VMatMeta::new(0, 0),
            source,
            indices,
        };
        m.build()?;
        Ok(m)
    }

    pub fn build(&self) -> VMatResult<()> {
        let sl = self.source.length();
        if let Some(&bad) = self.indices.iter().find(|&&r| r >= sl) {
            return Err(VMatError::row(bad, sl));
        }
        self.meta.set_dims(self.indices.len(), self.source.width());
        self.set_meta_info_from(self.source.as_ref());
        debug!(length = self.indices.len(), source_length = sl, "built SelectRowsVMatrix");
        Ok(())
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn source(&self) -> &VMat {
        &self.source
    }
}

impl VMatrix for SelectRowsVMatrix {
    fn meta(&self) -> &VMatMeta {
        &self.meta
    }

    fn class_name(&self) -> &'static str {
        "SelectRowsVMatrix"
    }

    fn get(&self, i: usize, j: usize) -> VMatResult<f64> {
        self.meta.check(i, j)?;
        self.source.get(self.indices[i], j)
    }

    fn get_sub_row(&self, i: usize, j: usize, buf: &mut [f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, buf.len())?;
        self.source.get_sub_row(self.indices[i], j, buf)
    }

    fn put(&self, i: usize, j: usize, v: f64) -> VMatResult<()> {
        self.meta.check(i, j)?;
        self.source.put(self.indices[i], j, v)
    }

    fn put_sub_row(&self, i: usize, j: usize, values: &[f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, values.len())?;
        self.source.put_sub_row(self.indices[i], j, values)
    }

    fn dot(&self, i1: usize, i2: usize, inputsize: usize) -> VMatResult<f64> {
        self.meta.check_span(i1, 0, inputsize)?;
        self.meta.check_span(i2, 0, inputsize)?;
        self.source.dot(self.indices[i1], self.indices[i2], inputsize)
    }

    fn dot_vec(&self, i: usize, v: &[f64]) -> VMatResult<f64> {
        self.meta.check_span(i, 0, v.len())?;
        self.source.dot_vec(self.indices[i], v)
    }

    fn reset_dimensions(&self) -> VMatResult<()> {
        self.build()
    }
}
