use std::path::{Path, PathBuf};
use std::sync::Arc;

use oxidize_ml_core::field::{default_field_infos, make_unique_names};
use oxidize_ml_core::{FieldInfo, MatrixStats, RoleSizes, StringMap, VMatError, VMatResult};
use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
struct MetaState {
    length: usize,
    width: usize,
    sizes: RoleSizes,
    /// `None` until names are declared; readers then see index names.
    fields: Option<Vec<FieldInfo>>,
    string_maps: Vec<StringMap>,
    metadata_dir: Option<PathBuf>,
}

/// Dimensions and metadata shared by every matrix implementation.
///
/// Everything sits behind locks so a matrix can be reached through any
/// number of `Arc` handles and still have its metadata updated.
#[derive(Debug, Default)]
pub struct VMatMeta {
    state: RwLock<MetaState>,
    stats: RwLock<Option<Arc<MatrixStats>>>,
}

impl VMatMeta {
    pub fn new(length: usize, width: usize) -> Self {
        VMatMeta {
            state: RwLock::new(MetaState {
                length,
                width,
                string_maps: vec![StringMap::new(); width],
                ..MetaState::default()
            }),
            stats: RwLock::new(None),
        }
    }

    pub fn length(&self) -> usize {
        self.state.read().length
    }

    pub fn width(&self) -> usize {
        self.state.read().width
    }

    pub fn set_length(&self, length: usize) {
        self.state.write().length = length;
    }

    /// Change both dimensions. Field infos and string maps are kept when the
    /// width is unchanged and dropped otherwise.
    pub fn set_dims(&self, length: usize, width: usize) {
        let mut st = self.state.write();
        st.length = length;
        if st.width != width {
            st.width = width;
            st.fields = None;
            st.string_maps = vec![StringMap::new(); width];
            if st.sizes.is_complete() && st.sizes.validate(width).is_err() {
                st.sizes = RoleSizes::unknown();
            }
        }
    }

    pub fn sizes(&self) -> RoleSizes {
        self.state.read().sizes
    }

    pub fn set_sizes(&self, sizes: RoleSizes) -> VMatResult<()> {
        let mut st = self.state.write();
        sizes.validate(st.width)?;
        st.sizes = sizes;
        Ok(())
    }

    pub fn has_field_infos(&self) -> bool {
        self.state.read().fields.is_some()
    }

    pub fn field_infos(&self) -> Vec<FieldInfo> {
        let st = self.state.read();
        match &st.fields {
            Some(f) => f.clone(),
            None => default_field_infos(st.width),
        }
    }

    pub fn field_info(&self, j: usize) -> VMatResult<FieldInfo> {
        let st = self.state.read();
        if j >= st.width {
            return Err(VMatError::col(j, st.width));
        }
        Ok(match &st.fields {
            Some(f) => f[j].clone(),
            None => FieldInfo::named(j.to_string()),
        })
    }

    pub fn set_field_infos(&self, mut fields: Vec<FieldInfo>) -> VMatResult<()> {
        let mut st = self.state.write();
        if fields.len() != st.width {
            return Err(VMatError::config(format!(
                "{} field infos given for a matrix of width {}",
                fields.len(),
                st.width
            )));
        }
        make_unique_names(&mut fields);
        st.fields = Some(fields);
        Ok(())
    }

    pub fn clear_field_infos(&self) {
        self.state.write().fields = None;
    }

    pub fn string_map(&self, col: usize) -> VMatResult<StringMap> {
        let st = self.state.read();
        st.string_maps
            .get(col)
            .cloned()
            .ok_or_else(|| VMatError::col(col, st.width))
    }

    /// Run `f` on the string map of `col` with write access.
    pub fn with_string_map<R>(&self, col: usize, f: impl FnOnce(&mut StringMap) -> R) -> VMatResult<R> {
        let mut st = self.state.write();
        let width = st.width;
        let map = st.string_maps.get_mut(col).ok_or_else(|| VMatError::col(col, width))?;
        Ok(f(map))
    }

    pub fn set_string_maps(&self, maps: Vec<StringMap>) -> VMatResult<()> {
        let mut st = self.state.write();
        if maps.len() != st.width {
            return Err(VMatError::config(format!(
                "{} string maps given for a matrix of width {}",
                maps.len(),
                st.width
            )));
        }
        st.string_maps = maps;
        Ok(())
    }

    pub fn string_maps(&self) -> Vec<StringMap> {
        self.state.read().string_maps.clone()
    }

    pub fn metadata_dir(&self) -> Option<PathBuf> {
        self.state.read().metadata_dir.clone()
    }

    pub fn set_metadata_dir(&self, dir: impl AsRef<Path>) {
        self.state.write().metadata_dir = Some(dir.as_ref().to_path_buf());
    }

    pub fn cached_stats(&self) -> Option<Arc<MatrixStats>> {
        self.stats.read().clone()
    }

    pub fn cache_stats(&self, stats: Arc<MatrixStats>) {
        *self.stats.write() = Some(stats);
    }

    pub fn clear_stats(&self) {
        *self.stats.write() = None;
    }

    pub fn check_row(&self, i: usize) -> VMatResult<()> {
        let length = self.length();
        if i >= length {
            return Err(VMatError::row(i, length));
        }
        Ok(())
    }

    pub fn check(&self, i: usize, j: usize) -> VMatResult<()> {
        let st = self.state.read();
        if i >= st.length {
            return Err(VMatError::row(i, st.length));
        }
        if j >= st.width {
            return Err(VMatError::col(j, st.width));
        }
        Ok(())
    }

    /// Check that `n` columns starting at `j` of row `i` exist.
    pub fn check_span(&self, i: usize, j: usize, n: usize) -> VMatResult<()> {
        let st = self.state.read();
        if i >= st.length {
            return Err(VMatError::row(i, st.length));
        }
        if j + n > st.width {
            return Err(VMatError::col(j + n - 1, st.width));
        }
        Ok(())
    }
}
