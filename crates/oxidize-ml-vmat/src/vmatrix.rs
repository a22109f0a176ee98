use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use oxidize_ml_core::stats::DEFAULT_MAX_NVALUES;
use oxidize_ml_core::value::{self, format_real, is_missing};
use oxidize_ml_core::{FieldInfo, FieldType, MatrixStats, RoleSizes, StringMap, VMatError, VMatResult};
use tracing::{info, warn};

use crate::meta::VMatMeta;

/// Shared handle to any virtual matrix. Views and splits hold these; a
/// source is never copied, and writes through one handle are visible
/// through every other.
pub type VMat = Arc<dyn VMatrix>;

/// File name of the persisted statistics inside a metadata directory.
pub const STATS_FILE: &str = "stats.json";

/// One row split along the column role partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
    pub weight: f64,
}

/// A 2-D table of reals with random access, column roles, field metadata,
/// per-column string dictionaries and cached statistics.
///
/// Implementors provide [`VMatrix::meta`] and [`VMatrix::get`]; everything
/// else has a generic default built on those two, which backings with
/// contiguous storage override.
///
/// Views compute derived state (windows, permutations, neighbour tables)
/// when built. Mutating a source afterwards is not tracked: rebuild the view
/// or call [`VMatrix::reset_dimensions`] / [`VMatrix::invalidate_stats`].
pub trait VMatrix: Send + Sync {
    /// Shared dimensions and metadata.
    fn meta(&self) -> &VMatMeta;

    /// Value at row `i`, column `j`.
    fn get(&self, i: usize, j: usize) -> VMatResult<f64>;

    /// Short type name, used in log messages.
    fn class_name(&self) -> &'static str {
        "VMatrix"
    }

    fn length(&self) -> usize {
        self.meta().length()
    }

    fn width(&self) -> usize {
        self.meta().width()
    }

    fn sizes(&self) -> RoleSizes {
        self.meta().sizes()
    }

    fn inputsize(&self) -> Option<usize> {
        self.sizes().inputsize
    }

    fn targetsize(&self) -> Option<usize> {
        self.sizes().targetsize
    }

    fn weightsize(&self) -> Option<usize> {
        self.sizes().weightsize
    }

    fn extrasize(&self) -> Option<usize> {
        self.sizes().extrasize
    }

    fn set_sizes(&self, sizes: RoleSizes) -> VMatResult<()> {
        self.meta().set_sizes(sizes)
    }

    // ─── Reading ────────────────────────────────────────────────────────────

    /// Fill `buf` with row `i` starting at column `j`.
    fn get_sub_row(&self, i: usize, j: usize, buf: &mut [f64]) -> VMatResult<()> {
        self.meta().check_span(i, j, buf.len())?;
        for (k, slot) in buf.iter_mut().enumerate() {
            *slot = self.get(i, j + k)?;
        }
        Ok(())
    }

    /// Fill `buf`, which must be exactly `width` long, with row `i`.
    fn get_row(&self, i: usize, buf: &mut [f64]) -> VMatResult<()> {
        let width = self.width();
        if buf.len() != width {
            return Err(VMatError::config(format!(
                "row buffer of length {} for a matrix of width {}",
                buf.len(),
                width
            )));
        }
        self.get_sub_row(i, 0, buf)
    }

    /// Row `i` as a freshly allocated vector.
    fn row(&self, i: usize) -> VMatResult<Vec<f64>> {
        let mut buf = vec![0.0; self.width()];
        self.get_row(i, &mut buf)?;
        Ok(buf)
    }

    /// Column `j` as a freshly allocated vector.
    fn column(&self, j: usize) -> VMatResult<Vec<f64>> {
        (0..self.length()).map(|i| self.get(i, j)).collect()
    }

    // ─── Writing ────────────────────────────────────────────────────────────

    fn put(&self, _i: usize, _j: usize, _value: f64) -> VMatResult<()> {
        Err(VMatError::unsupported(format!("{} is read-only", self.class_name())))
    }

    fn put_sub_row(&self, i: usize, j: usize, values: &[f64]) -> VMatResult<()> {
        self.meta().check_span(i, j, values.len())?;
        for (k, &v) in values.iter().enumerate() {
            self.put(i, j + k, v)?;
        }
        Ok(())
    }

    fn put_row(&self, i: usize, values: &[f64]) -> VMatResult<()> {
        let width = self.width();
        if values.len() != width {
            return Err(VMatError::config(format!(
                "row of length {} for a matrix of width {}",
                values.len(),
                width
            )));
        }
        self.put_sub_row(i, 0, values)
    }

    /// Write a block of rows with its top-left corner at `(i, j)`.
    fn put_mat(&self, i: usize, j: usize, rows: &[Vec<f64>]) -> VMatResult<()> {
        for (k, r) in rows.iter().enumerate() {
            self.put_sub_row(i + k, j, r)?;
        }
        Ok(())
    }

    fn append_row(&self, _values: &[f64]) -> VMatResult<()> {
        Err(VMatError::unsupported(format!("{} cannot grow", self.class_name())))
    }

    // ─── Products and search ────────────────────────────────────────────────

    /// Inner product of the first `inputsize` values of rows `i1` and `i2`.
    fn dot(&self, i1: usize, i2: usize, inputsize: usize) -> VMatResult<f64> {
        generic_dot(self, i1, i2, inputsize)
    }

    /// Inner product of the first `v.len()` values of row `i` with `v`.
    fn dot_vec(&self, i: usize, v: &[f64]) -> VMatResult<f64> {
        generic_dot_vec(self, i, v)
    }

    /// Row `i` split into input, target and weight.
    fn get_example(&self, i: usize) -> VMatResult<Example> {
        let (is, ts, ws) = self.sizes().required()?;
        let row = self.row(i)?;
        if is + ts + ws > row.len() {
            return Err(VMatError::config(format!(
                "sizes {}+{}+{} exceed width {}",
                is,
                ts,
                ws,
                row.len()
            )));
        }
        Ok(Example {
            input: row[..is].to_vec(),
            target: row[is..is + ts].to_vec(),
            weight: if ws > 0 { row[is + ts] } else { 1.0 },
        })
    }

    /// First row, scanning from `i_start` and wrapping around, whose input
    /// part is within squared distance `tolerance` of `input`.
    fn find(&self, input: &[f64], tolerance: f64, i_start: usize) -> VMatResult<Option<usize>> {
        let is = self
            .inputsize()
            .ok_or_else(|| VMatError::config("find needs a defined inputsize"))?;
        if input.len() != is {
            return Err(VMatError::config(format!(
                "find: input of length {} but inputsize is {}",
                input.len(),
                is
            )));
        }
        let length = self.length();
        if length == 0 {
            return Ok(None);
        }
        let mut buf = vec![0.0; is];
        for k in 0..length {
            let i = (i_start + k) % length;
            self.get_sub_row(i, 0, &mut buf)?;
            if value::sq_dist(&buf, input) <= tolerance {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    // ─── Field metadata ─────────────────────────────────────────────────────

    fn field_infos(&self) -> Vec<FieldInfo> {
        self.meta().field_infos()
    }

    fn has_field_infos(&self) -> bool {
        self.meta().has_field_infos()
    }

    fn set_field_infos(&self, fields: Vec<FieldInfo>) -> VMatResult<()> {
        self.meta().set_field_infos(fields)
    }

    /// Give every column a name, keeping types unknown.
    fn declare_field_names(&self, names: &[&str]) -> VMatResult<()> {
        self.set_field_infos(names.iter().map(|n| FieldInfo::named(*n)).collect())
    }

    fn field_name(&self, j: usize) -> VMatResult<String> {
        Ok(self.meta().field_info(j)?.name)
    }

    fn field_names(&self) -> Vec<String> {
        self.field_infos().into_iter().map(|f| f.name).collect()
    }

    /// Column whose name is exactly `name`.
    fn field_index(&self, name: &str) -> Option<usize> {
        self.field_infos().iter().position(|f| f.name == name)
    }

    /// Resolve a field name, or failing that a column number.
    fn get_field_index(&self, spec: &str) -> VMatResult<usize> {
        if let Some(j) = self.field_index(spec) {
            return Ok(j);
        }
        match spec.trim().parse::<usize>() {
            Ok(j) if j < self.width() => Ok(j),
            Ok(j) => Err(VMatError::col(j, self.width())),
            Err(_) => Err(VMatError::config(format!(
                "'{}' is neither a field name nor a column number",
                spec
            ))),
        }
    }

    // ─── String dictionaries ────────────────────────────────────────────────

    fn string_map(&self, col: usize) -> VMatResult<StringMap> {
        self.meta().string_map(col)
    }

    fn string_to_real_mapping(&self, col: usize) -> VMatResult<HashMap<String, f64>> {
        Ok(self.string_map(col)?.string_to_real().clone())
    }

    /// Value to string pairs of `col`, sorted by value.
    fn real_to_string_mapping(&self, col: usize) -> VMatResult<Vec<(f64, String)>> {
        let map = self.string_map(col)?;
        let mut pairs: Vec<(f64, String)> = map
            .string_to_real()
            .iter()
            .map(|(s, v)| (*v, s.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(pairs)
    }

    /// Value bound to `s` in `col`, allocating one when `s` is new.
    fn add_string_mapping(&self, col: usize, s: &str) -> VMatResult<f64> {
        if matches!(self.meta().field_info(col)?.field_type, FieldType::Continuous) {
            warn!(
                matrix = self.class_name(),
                col, "string mapping added to a continuous column"
            );
        }
        self.meta().with_string_map(col, |m| m.get_or_insert(s))
    }

    fn add_string_mapping_with_value(&self, col: usize, s: &str, v: f64) -> VMatResult<()> {
        self.meta().with_string_map(col, |m| m.insert(s, v))
    }

    fn remove_string_mapping(&self, col: usize, s: &str) -> VMatResult<Option<f64>> {
        self.meta().with_string_map(col, |m| m.remove(s))
    }

    /// String of `(i, col)`, or its number when the value is unmapped.
    fn get_string(&self, i: usize, col: usize) -> VMatResult<String> {
        let v = self.get(i, col)?;
        let s = self.get_val_string(col, v)?;
        Ok(if s.is_empty() { format_real(v) } else { s })
    }

    /// String bound to `v` in `col`; empty when unmapped or missing.
    fn get_val_string(&self, col: usize, v: f64) -> VMatResult<String> {
        if is_missing(v) {
            return Ok(String::new());
        }
        Ok(self.string_map(col)?.string(v).unwrap_or_default().to_string())
    }

    fn get_string_val(&self, col: usize, s: &str) -> VMatResult<Option<f64>> {
        Ok(self.string_map(col)?.real(s))
    }

    // ─── Statistics ─────────────────────────────────────────────────────────

    /// Scan the whole matrix once.
    fn compute_stats(&self, max_nvalues: usize) -> VMatResult<MatrixStats> {
        let (length, width) = (self.length(), self.width());
        let mut stats = MatrixStats::new(length, width, max_nvalues);
        let mut buf = vec![0.0; width];
        for i in 0..length {
            self.get_row(i, &mut buf)?;
            stats.update_row(&buf);
        }
        info!(matrix = self.class_name(), length, width, "computed field statistics");
        Ok(stats)
    }

    /// Cached statistics, loaded from the metadata directory or computed and
    /// persisted there when no fresh copy exists.
    fn get_stats(&self) -> VMatResult<Arc<MatrixStats>> {
        if let Some(stats) = self.meta().cached_stats() {
            return Ok(stats);
        }
        let (length, width) = (self.length(), self.width());
        let dir = self.meta().metadata_dir();
        if let Some(dir) = &dir {
            let path = dir.join(STATS_FILE);
            if path.exists() {
                match fs::read_to_string(&path)
                    .map_err(VMatError::from)
                    .and_then(|s| serde_json::from_str::<MatrixStats>(&s).map_err(VMatError::from))
                {
                    Ok(stats) if stats.matches(length, width) => {
                        info!(path = %path.display(), "loaded field statistics");
                        let stats = Arc::new(stats);
                        self.meta().cache_stats(stats.clone());
                        return Ok(stats);
                    }
                    Ok(_) => warn!(path = %path.display(), "stale statistics file, recomputing"),
                    Err(e) => warn!(path = %path.display(), error = %e, "unreadable statistics file"),
                }
            }
        }
        let stats = Arc::new(self.compute_stats(DEFAULT_MAX_NVALUES)?);
        if let Some(dir) = &dir {
            let saved = fs::create_dir_all(dir)
                .map_err(VMatError::from)
                .and_then(|_| serde_json::to_string(stats.as_ref()).map_err(VMatError::from))
                .and_then(|json| fs::write(dir.join(STATS_FILE), json).map_err(VMatError::from));
            if let Err(e) = saved {
                warn!(dir = %dir.display(), error = %e, "could not persist statistics");
            }
        }
        self.meta().cache_stats(stats.clone());
        Ok(stats)
    }

    /// Drop memoised and persisted statistics.
    fn invalidate_stats(&self) {
        self.meta().clear_stats();
        if let Some(dir) = self.meta().metadata_dir() {
            let path = dir.join(STATS_FILE);
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "could not remove statistics file");
                }
            }
        }
    }

    // ─── Metadata propagation ───────────────────────────────────────────────

    /// Copy sizes, field infos and string maps from `other` wherever this
    /// matrix has none yet. Never overwrites.
    fn set_meta_info_from(&self, other: &dyn VMatrix) {
        let own = self.sizes();
        if !own.is_complete() {
            let theirs = other.sizes();
            let merged = RoleSizes {
                inputsize: own.inputsize.or(theirs.inputsize),
                targetsize: own.targetsize.or(theirs.targetsize),
                weightsize: own.weightsize.or(theirs.weightsize),
                extrasize: own.extrasize.or(theirs.extrasize),
            };
            if merged.validate(self.width()).is_ok() {
                let _ = self.meta().set_sizes(merged);
            }
        }
        if other.width() != self.width() {
            return;
        }
        if !self.has_field_infos() && other.has_field_infos() {
            let _ = self.meta().set_field_infos(other.field_infos());
        }
        for col in 0..self.width() {
            let empty = self.string_map(col).map(|m| m.is_empty()).unwrap_or(false);
            if !empty {
                continue;
            }
            if let Ok(theirs) = other.string_map(col) {
                if !theirs.is_empty() {
                    let _ = self.meta().with_string_map(col, |m| *m = theirs);
                }
            }
        }
    }

    /// Re-derive dimensions from sources. Backings have nothing to do.
    fn reset_dimensions(&self) -> VMatResult<()> {
        Ok(())
    }
}

/// Row-copy dot product, for implementations that only sometimes have a
/// faster path.
pub fn generic_dot<M: VMatrix + ?Sized>(m: &M, i1: usize, i2: usize, inputsize: usize) -> VMatResult<f64> {
    let mut a = vec![0.0; inputsize];
    let mut b = vec![0.0; inputsize];
    m.get_sub_row(i1, 0, &mut a)?;
    m.get_sub_row(i2, 0, &mut b)?;
    Ok(value::dot(&a, &b))
}

pub fn generic_dot_vec<M: VMatrix + ?Sized>(m: &M, i: usize, v: &[f64]) -> VMatResult<f64> {
    let mut a = vec![0.0; v.len()];
    m.get_sub_row(i, 0, &mut a)?;
    Ok(value::dot(&a, v))
}

/// Gather the field infos and string maps of `source` at `columns` into
/// `meta`. Names are only copied when the source declared some.
pub fn gather_metadata(meta: &VMatMeta, source: &dyn VMatrix, columns: &[usize]) -> VMatResult<()> {
    if source.has_field_infos() {
        let fields = source.field_infos();
        meta.set_field_infos(columns.iter().map(|&j| fields[j].clone()).collect())?;
    } else {
        meta.clear_field_infos();
    }
    let maps = columns
        .iter()
        .map(|&j| source.string_map(j))
        .collect::<VMatResult<Vec<_>>>()?;
    meta.set_string_maps(maps)
}

/// Operations that need the shared handle itself.
pub trait VMatExt {
    /// Window of `l` rows and `w` columns starting at `(i, j)`.
    fn sub_mat(&self, i: usize, j: usize, l: usize, w: usize) -> VMatResult<VMat>;

    /// Full-width window of `l` rows starting at row `i`.
    fn sub_mat_rows(&self, i: usize, l: usize) -> VMatResult<VMat>;
}

impl VMatExt for VMat {
    fn sub_mat(&self, i: usize, j: usize, l: usize, w: usize) -> VMatResult<VMat> {
        Ok(Arc::new(crate::sub::SubVMatrix::window(self.clone(), i, j, l, w)?))
    }

    fn sub_mat_rows(&self, i: usize, l: usize) -> VMatResult<VMat> {
        let w = self.width();
        self.sub_mat(i, 0, l, w)
    }
}
