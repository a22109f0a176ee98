use std::collections::HashSet;
use std::sync::Arc;

use oxidize_ml_core::{RoleSizes, StringMap, VMatError, VMatResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::meta::VMatMeta;
use crate::select_columns::SelectColumnsVMatrix;
use crate::vmatrix::{generic_dot, VMat, VMatrix};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcatRowsConfig {
    /// Keep only the fields every source has, in the first source's order.
    pub only_common_fields: bool,
    /// Fail when a string is bound to different values in two sources.
    pub fully_check_mappings: bool,
}

/// Vertical stack of several sources of equal width.
///
/// Row `i` lives in the first source whose cumulated length exceeds `i`;
/// the lookup is linear in the number of sources.
pub struct ConcatRowsVMatrix {
    sources: Vec<VMat>,
    config: ConcatRowsConfig,
    parts: RwLock<Vec<VMat>>,
    meta: VMatMeta,
}

impl ConcatRowsVMatrix {
    pub fn new(sources: Vec<VMat>, config: ConcatRowsConfig) -> VMatResult<Self> {
        let m = ConcatRowsVMatrix {
            sources,
            config,
            parts: RwLock::new(Vec::new()),
            meta: VMatMeta::new(0, 0),
        };
        m.build()?;
        Ok(m)
    }

    /// Plain concatenation of equally wide sources.
    pub fn of(sources: Vec<VMat>) -> VMatResult<Self> {
        ConcatRowsVMatrix::new(sources, ConcatRowsConfig::default())
    }

    pub fn sources(&self) -> &[VMat] {
        &self.sources
    }

    pub fn build(&self) -> VMatResult<()> {
        if self.sources.is_empty() {
            return Err(VMatError::config("ConcatRowsVMatrix needs at least one source"));
        }
        let parts: Vec<VMat> = if self.config.only_common_fields {
            let common = common_fields(&self.sources);
            self.sources
                .iter()
                .map(|s| -> VMatResult<VMat> {
                    Ok(Arc::new(SelectColumnsVMatrix::by_names(s.clone(), &common)?))
                })
                .collect::<VMatResult<_>>()?
        } else {
            self.sources.clone()
        };

        let width = parts[0].width();
        if let Some((k, p)) = parts.iter().enumerate().find(|(_, p)| p.width() != width) {
            return Err(VMatError::config(format!(
                "source {} has width {} but source 0 has width {}",
                k,
                p.width(),
                width
            )));
        }
        let length = parts.iter().map(|p| p.length()).sum();
        self.meta.set_dims(length, width);

        let first = &parts[0];
        if first.has_field_infos() {
            self.meta.set_field_infos(first.field_infos())?;
        } else {
            self.meta.clear_field_infos();
        }
        let mut maps = Vec::with_capacity(width);
        for col in 0..width {
            maps.push(self.merge_maps(&parts, col)?);
        }
        self.meta.set_string_maps(maps)?;
        let sizes = first.sizes();
        self.meta.set_sizes(if sizes.validate(width).is_ok() {
            sizes
        } else {
            RoleSizes::all_input(width)
        })?;

        debug!(sources = parts.len(), length, width, "built ConcatRowsVMatrix");
        *self.parts.write() = parts;
        Ok(())
    }

    fn merge_maps(&self, parts: &[VMat], col: usize) -> VMatResult<StringMap> {
        let mut merged = parts[0].string_map(col)?;
        for (k, p) in parts.iter().enumerate().skip(1) {
            let theirs = p.string_map(col)?;
            for (s, v) in theirs.entries() {
                match (merged.real(s), merged.string(v)) {
                    (Some(mine), _) if mine == v => {}
                    (None, None) => merged.insert(s, v),
                    _ if self.config.fully_check_mappings => {
                        return Err(VMatError::config(format!(
                            "column {}: mapping '{}' -> {} of source {} conflicts with an earlier source",
                            col, s, v, k
                        )))
                    }
                    _ => warn!(col, string = s, value = v, source = k, "conflicting string mapping ignored"),
                }
            }
        }
        Ok(merged)
    }

    /// Source and row within it holding row `i`.
    pub fn locate(&self, i: usize) -> VMatResult<(usize, usize)> {
        let parts = self.parts.read();
        let mut rest = i;
        for (k, p) in parts.iter().enumerate() {
            let l = p.length();
            if rest < l {
                return Ok((k, rest));
            }
            rest -= l;
        }
        Err(VMatError::row(i, self.meta.length()))
    }

    fn part(&self, k: usize) -> VMat {
        self.parts.read()[k].clone()
    }
}

/// Field names present in every source, in the first source's order.
fn common_fields(sources: &[VMat]) -> Vec<String> {
    let others: Vec<HashSet<String>> = sources[1..]
        .iter()
        .map(|s| s.field_names().into_iter().collect())
        .collect();
    sources[0]
        .field_names()
        .into_iter()
        .filter(|n| others.iter().all(|o| o.contains(n)))
        .collect()
}

impl VMatrix for ConcatRowsVMatrix {
    fn meta(&self) -> &VMatMeta {
        &self.meta
    }

    fn class_name(&self) -> &'static str {
        "ConcatRowsVMatrix"
    }

    fn get(&self, i: usize, j: usize) -> VMatResult<f64> {
        self.meta.check(i, j)?;
        let (k, r) = self.locate(i)?;
        self.part(k).get(r, j)
    }

    fn get_sub_row(&self, i: usize, j: usize, buf: &mut [f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, buf.len())?;
        let (k, r) = self.locate(i)?;
        self.part(k).get_sub_row(r, j, buf)
    }

    fn put(&self, i: usize, j: usize, v: f64) -> VMatResult<()> {
        self.meta.check(i, j)?;
        let (k, r) = self.locate(i)?;
        self.part(k).put(r, j, v)
    }

    fn put_sub_row(&self, i: usize, j: usize, values: &[f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, values.len())?;
        let (k, r) = self.locate(i)?;
        self.part(k).put_sub_row(r, j, values)
    }

    fn dot(&self, i1: usize, i2: usize, inputsize: usize) -> VMatResult<f64> {
        let (k1, r1) = self.locate(i1)?;
        let (k2, r2) = self.locate(i2)?;
        if k1 == k2 {
            self.meta.check_span(i1, 0, inputsize)?;
            return self.part(k1).dot(r1, r2, inputsize);
        }
        generic_dot(self, i1, i2, inputsize)
    }

    fn dot_vec(&self, i: usize, v: &[f64]) -> VMatResult<f64> {
        self.meta.check_span(i, 0, v.len())?;
        let (k, r) = self.locate(i)?;
        self.part(k).dot_vec(r, v)
    }

    fn reset_dimensions(&self) -> VMatResult<()> {
        self.build()
    }
}
