use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use oxidize_ml_core::{FieldInfo, RoleSizes, VMatError, VMatResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::meta::VMatMeta;
use crate::vmatrix::VMatrix;

const REAL_BYTES: usize = std::mem::size_of::<f64>();

/// Sidecar written next to the binary data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHeader {
    pub length: usize,
    pub width: usize,
    #[serde(default)]
    pub sizes: RoleSizes,
    #[serde(default)]
    pub fields: Option<Vec<FieldInfo>>,
}

/// Path of the sidecar belonging to a data file.
pub fn header_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".meta.json");
    PathBuf::from(p)
}

/// Disk-resident matrix: a flat row-major array of little-endian `f64`
/// values plus a JSON sidecar with dimensions, sizes and field names.
///
/// Every access seeks in the file, so reads and writes go straight to disk.
#[derive(Debug)]
pub struct FileVMatrix {
    path: PathBuf,
    file: Mutex<File>,
    meta: VMatMeta,
}

impl FileVMatrix {
    /// Create (or truncate) a file holding zero rows of `width` columns.
    pub fn create(path: impl AsRef<Path>, width: usize) -> VMatResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let m = FileVMatrix {
            path,
            file: Mutex::new(file),
            meta: VMatMeta::new(0, width),
        };
        m.flush()?;
        Ok(m)
    }

    /// Open an existing file and its sidecar.
    pub fn open(path: impl AsRef<Path>) -> VMatResult<Self> {
        let path = path.as_ref().to_path_buf();
        let header: FileHeader = serde_json::from_str(&fs::read_to_string(header_path(&path))?)?;
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let expected = (header.length * header.width * REAL_BYTES) as u64;
        let actual = file.metadata()?.len();
        if actual < expected {
            return Err(VMatError::Parse(format!(
                "{} holds {} bytes, header announces {}",
                path.display(),
                actual,
                expected
            )));
        }
        let meta = VMatMeta::new(header.length, header.width);
        meta.set_sizes(header.sizes)?;
        if let Some(fields) = header.fields {
            meta.set_field_infos(fields)?;
        }
        debug!(path = %path.display(), length = header.length, width = header.width, "opened file matrix");
        Ok(FileVMatrix {
            path,
            file: Mutex::new(file),
            meta,
        })
    }

    /// Write every row of `source` to a new file.
    pub fn save(source: &dyn VMatrix, path: impl AsRef<Path>) -> VMatResult<Self> {
        let m = FileVMatrix::create(path, source.width())?;
        let mut row = vec![0.0; source.width()];
        for i in 0..source.length() {
            source.get_row(i, &mut row)?;
            m.append_row(&row)?;
        }
        m.set_meta_info_from(source);
        m.flush()?;
        Ok(m)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the sidecar from the current metadata.
    pub fn flush(&self) -> VMatResult<()> {
        let header = FileHeader {
            length: self.meta.length(),
            width: self.meta.width(),
            sizes: self.meta.sizes(),
            fields: if self.meta.has_field_infos() {
                Some(self.meta.field_infos())
            } else {
                None
            },
        };
        fs::write(header_path(&self.path), serde_json::to_string_pretty(&header)?)?;
        self.file.lock().flush()?;
        Ok(())
    }

    fn offset(&self, i: usize, j: usize) -> u64 {
        ((i * self.meta.width() + j) * REAL_BYTES) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [f64]) -> VMatResult<()> {
        let mut bytes = vec![0u8; buf.len() * REAL_BYTES];
        {
            let mut f = self.file.lock();
            f.seek(SeekFrom::Start(offset))?;
            f.read_exact(&mut bytes)?;
        }
        for (slot, chunk) in buf.iter_mut().zip(bytes.chunks_exact(REAL_BYTES)) {
            let mut raw = [0u8; REAL_BYTES];
            raw.copy_from_slice(chunk);
            *slot = f64::from_le_bytes(raw);
        }
        Ok(())
    }

    fn write_at(&self, offset: u64, values: &[f64]) -> VMatResult<()> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(&bytes)?;
        Ok(())
    }
}

impl VMatrix for FileVMatrix {
    fn meta(&self) -> &VMatMeta {
        &self.meta
    }

    fn class_name(&self) -> &'static str {
        "FileVMatrix"
    }

    fn get(&self, i: usize, j: usize) -> VMatResult<f64> {
        self.meta.check(i, j)?;
        let mut v = [0.0];
        self.read_at(self.offset(i, j), &mut v)?;
        Ok(v[0])
    }

    fn get_sub_row(&self, i: usize, j: usize, buf: &mut [f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, buf.len())?;
        self.read_at(self.offset(i, j), buf)
    }

    fn put(&self, i: usize, j: usize, v: f64) -> VMatResult<()> {
        self.meta.check(i, j)?;
        self.write_at(self.offset(i, j), &[v])
    }

    fn put_sub_row(&self, i: usize, j: usize, values: &[f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, values.len())?;
        self.write_at(self.offset(i, j), values)
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
        let length = self.meta.length();
        self.write_at(self.offset(length, 0), values)?;
        self.meta.set_length(length + 1);
        Ok(())
    }
}

impl Drop for FileVMatrix {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "could not flush file matrix header");
        }
    }
}
