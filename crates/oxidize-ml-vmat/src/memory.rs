use oxidize_ml_core::value;
use oxidize_ml_core::{VMatError, VMatResult};
use parking_lot::RwLock;

use crate::meta::VMatMeta;
use crate::vmatrix::VMatrix;

/// In-memory matrix, stored in a flat contiguous `Vec<f64>` with row-major
/// layout. Writable and growable.
#[derive(Debug)]
pub struct MemoryVMatrix {
    data: RwLock<Vec<f64>>,
    meta: VMatMeta,
}

impl MemoryVMatrix {
    /// Create a matrix filled with zeros.
    pub fn new(length: usize, width: usize) -> Self {
        MemoryVMatrix {
            data: RwLock::new(vec![0.0; length * width]),
            meta: VMatMeta::new(length, width),
        }
    }

    /// Create a matrix from raw row-major data.
    pub fn from_data(data: Vec<f64>, length: usize, width: usize) -> VMatResult<Self> {
        if data.len() != length * width {
            return Err(VMatError::config(format!(
                "{} values cannot fill a {}x{} matrix",
                data.len(),
                length,
                width
            )));
        }
        Ok(MemoryVMatrix {
            data: RwLock::new(data),
            meta: VMatMeta::new(length, width),
        })
    }

    /// Create a matrix from a nested slice. All rows must have equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> VMatResult<Self> {
        if rows.is_empty() {
            return Ok(MemoryVMatrix::new(0, 0));
        }
        let width = rows[0].len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(VMatError::config("All rows must have the same number of columns"));
        }
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        MemoryVMatrix::from_data(flat, rows.len(), width)
    }

    /// Empty matrix of the given width, to be filled with `append_row`.
    pub fn with_width(width: usize) -> Self {
        MemoryVMatrix::new(0, width)
    }

    /// Copy every row and the metadata of any matrix.
    pub fn materialize(source: &dyn VMatrix) -> VMatResult<Self> {
        let (length, width) = (source.length(), source.width());
        let mut data = vec![0.0; length * width];
        for (i, row) in data.chunks_mut(width.max(1)).enumerate().take(length) {
            source.get_row(i, &mut row[..width])?;
        }
        let m = MemoryVMatrix::from_data(data, length, width)?;
        m.set_meta_info_from(source);
        Ok(m)
    }

    /// Snapshot of the underlying data.
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.read().clone()
    }
}

impl VMatrix for MemoryVMatrix {
    fn meta(&self) -> &VMatMeta {
        &self.meta
    }

    fn class_name(&self) -> &'static str {
        "MemoryVMatrix"
    }

    fn get(&self, i: usize, j: usize) -> VMatResult<f64> {
        self.meta.check(i, j)?;
        Ok(self.data.read()[i * self.meta.width() + j])
    }

    fn get_sub_row(&self, i: usize, j: usize, buf: &mut [f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, buf.len())?;
        let start = i * self.meta.width() + j;
        buf.copy_from_slice(&self.data.read()[start..start + buf.len()]);
        Ok(())
    }

    fn put(&self, i: usize, j: usize, v: f64) -> VMatResult<()> {
        self.meta.check(i, j)?;
        let w = self.meta.width();
        self.data.write()[i * w + j] = v;
        Ok(())
    }

    fn put_sub_row(&self, i: usize, j: usize, values: &[f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, values.len())?;
        let start = i * self.meta.width() + j;
        self.data.write()[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    fn append_row(&self, values: &[f64]) -> VMatResult<()> {
        let width = self.meta.width();
        if values.len() != width {
            return Err(VMatError::config(format!(
                "appending a row of length {} to a matrix of width {}",
                values.len(),
                width
            )));
        }
        let mut data = self.data.write();
        data.extend_from_slice(values);
        self.meta.set_length(data.len() / width.max(1));
        Ok(())
    }

    fn dot(&self, i1: usize, i2: usize, inputsize: usize) -> VMatResult<f64> {
        self.meta.check_span(i1, 0, inputsize)?;
        self.meta.check_span(i2, 0, inputsize)?;
        let w = self.meta.width();
        let data = self.data.read();
        let a = &data[i1 * w..i1 * w + inputsize];
        let b = &data[i2 * w..i2 * w + inputsize];
        Ok(value::dot(a, b))
    }

    fn dot_vec(&self, i: usize, v: &[f64]) -> VMatResult<f64> {
        self.meta.check_span(i, 0, v.len())?;
        let w = self.meta.width();
        let data = self.data.read();
        Ok(value::dot(&data[i * w..i * w + v.len()], v))
    }
}
