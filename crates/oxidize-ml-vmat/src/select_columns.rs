use oxidize_ml_core::{FieldInfo, RoleSizes, StringMap, VMatError, VMatResult, MISSING};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::meta::VMatMeta;
use crate::vmatrix::{VMat, VMatrix};

/// Which columns to keep, in output order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectColumnsConfig {
    /// Column indices, used when `fields` is empty.
    pub indices: Vec<usize>,
    /// Field names or column-number strings.
    pub fields: Vec<String>,
    /// Turn an unknown field name into an all-missing column instead of an
    /// error.
    pub extend_with_missing: bool,
    /// Role sizes of the result. By default the source's sizes are kept for
    /// an identity selection and everything is input otherwise.
    pub sizes: Option<RoleSizes>,
}

/// Column projection and reordering of a source matrix.
pub struct SelectColumnsVMatrix {
    source: VMat,
    config: SelectColumnsConfig,
    /// Source column of each output column; `None` is an added missing one.
    selected: RwLock<Vec<Option<usize>>>,
    meta: VMatMeta,
}

impl SelectColumnsVMatrix {
    pub fn new(source: VMat, config: SelectColumnsConfig) -> VMatResult<Self> {
        let m = SelectColumnsVMatrix {
            source,
            config,
            selected: RwLock::new(Vec::new()),
            meta: VMatMeta::new(0, 0),
        };
        m.build()?;
        Ok(m)
    }

    pub fn by_indices(source: VMat, indices: Vec<usize>) -> VMatResult<Self> {
        SelectColumnsVMatrix::new(
            source,
            SelectColumnsConfig {
                indices,
                ..SelectColumnsConfig::default()
            },
        )
    }

    pub fn by_names<S: AsRef<str>>(source: VMat, fields: &[S]) -> VMatResult<Self> {
        SelectColumnsVMatrix::new(
            source,
            SelectColumnsConfig {
                fields: fields.iter().map(|f| f.as_ref().to_string()).collect(),
                ..SelectColumnsConfig::default()
            },
        )
    }

    pub fn source(&self) -> &VMat {
        &self.source
    }

    /// Source column behind each output column.
    pub fn indices(&self) -> Vec<Option<usize>> {
        self.selected.read().clone()
    }

    pub fn build(&self) -> VMatResult<()> {
        let sw = self.source.width();
        let mut selected = Vec::new();
        let mut names = Vec::new();
        if self.config.fields.is_empty() {
            for &j in &self.config.indices {
                if j >= sw {
                    return Err(VMatError::col(j, sw));
                }
                selected.push(Some(j));
                names.push(None);
            }
        } else {
            for spec in &self.config.fields {
                match self.source.get_field_index(spec) {
                    Ok(j) => {
                        selected.push(Some(j));
                        names.push(None);
                    }
                    Err(_) if self.config.extend_with_missing => {
                        warn!(field = %spec, "unknown field, adding a missing column");
                        selected.push(None);
                        names.push(Some(spec.clone()));
                    }
                    Err(e) => {
                        return Err(VMatError::config(format!(
                            "cannot select field '{}': {}",
                            spec, e
                        )))
                    }
                }
            }
        }

        let width = selected.len();
        self.meta.set_dims(self.source.length(), width);

        let src_fields = self.source.field_infos();
        let fields: Vec<FieldInfo> = selected
            .iter()
            .zip(&names)
            .map(|(sel, name)| match (sel, name) {
                (Some(j), _) => src_fields[*j].clone(),
                (None, Some(n)) => FieldInfo::named(n.clone()),
                (None, None) => FieldInfo::named(""),
            })
            .collect();
        self.meta.set_field_infos(fields)?;
        let maps = selected
            .iter()
            .map(|sel| match sel {
                Some(j) => self.source.string_map(*j),
                None => Ok(StringMap::new()),
            })
            .collect::<VMatResult<Vec<_>>>()?;
        self.meta.set_string_maps(maps)?;

        let identity = width == sw && selected.iter().enumerate().all(|(k, s)| *s == Some(k));
        let sizes = match self.config.sizes {
            Some(s) => s,
            None if identity && self.source.sizes().validate(sw).is_ok() => self.source.sizes(),
            None => RoleSizes::all_input(width),
        };
        self.meta.set_sizes(sizes)?;
        *self.selected.write() = selected;
        debug!(width, source_width = sw, "built SelectColumnsVMatrix");
        Ok(())
    }

    fn source_col(&self, j: usize) -> Option<usize> {
        self.selected.read()[j]
    }
}

impl VMatrix for SelectColumnsVMatrix {
    fn meta(&self) -> &VMatMeta {
        &self.meta
    }

    fn class_name(&self) -> &'static str {
        "SelectColumnsVMatrix"
    }

    fn get(&self, i: usize, j: usize) -> VMatResult<f64> {
        self.meta.check(i, j)?;
        match self.source_col(j) {
            Some(sj) => self.source.get(i, sj),
            None => Ok(MISSING),
        }
    }

    fn get_sub_row(&self, i: usize, j: usize, buf: &mut [f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, buf.len())?;
        let mut row = vec![0.0; self.source.width()];
        self.source.get_row(i, &mut row)?;
        let selected = self.selected.read();
        let n = buf.len();
        for (slot, sel) in buf.iter_mut().zip(&selected[j..j + n]) {
            *slot = sel.map(|sj| row[sj]).unwrap_or(MISSING);
        }
        Ok(())
    }

    fn put(&self, i: usize, j: usize, v: f64) -> VMatResult<()> {
        self.meta.check(i, j)?;
        match self.source_col(j) {
            Some(sj) => self.source.put(i, sj, v),
            None => Err(VMatError::unsupported(format!(
                "column {} was added as missing and has no storage",
                j
            ))),
        }
    }

    fn reset_dimensions(&self) -> VMatResult<()> {
        self.build()
    }
}
