use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{VMatError, VMatResult};

/// Kind of values a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FieldType {
    #[default]
    Unknown,
    Continuous,
    DiscreteGeneral,
    DiscreteMonotonic,
    DiscreteFloat,
    Date,
}

impl FieldType {
    /// Stable integer code used by the field metadata sidecar.
    pub fn code(self) -> u8 {
        match self {
            FieldType::Unknown => 0,
            FieldType::Continuous => 1,
            FieldType::DiscreteGeneral => 2,
            FieldType::DiscreteMonotonic => 3,
            FieldType::DiscreteFloat => 4,
            FieldType::Date => 5,
        }
    }

    pub fn from_code(code: u8) -> VMatResult<Self> {
        Ok(match code {
            0 => FieldType::Unknown,
            1 => FieldType::Continuous,
            2 => FieldType::DiscreteGeneral,
            3 => FieldType::DiscreteMonotonic,
            4 => FieldType::DiscreteFloat,
            5 => FieldType::Date,
            _ => return Err(VMatError::Parse(format!("unknown field type code {}", code))),
        })
    }
}

/// Name and type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(default)]
    pub field_type: FieldType,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldInfo {
            name: name.into(),
            field_type,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        FieldInfo::new(name, FieldType::Unknown)
    }
}

/// Field infos named after their column index.
pub fn default_field_infos(width: usize) -> Vec<FieldInfo> {
    (0..width).map(|j| FieldInfo::named(j.to_string())).collect()
}

/// Rename duplicated field names in place by appending `.1`, `.2`, ...
///
/// The first occurrence keeps its name. Generated names never collide with
/// names already present.
pub fn make_unique_names(fields: &mut [FieldInfo]) {
    let mut seen: HashSet<String> = HashSet::with_capacity(fields.len());
    let taken: HashSet<String> = fields.iter().map(|f| f.name.clone()).collect();
    for f in fields.iter_mut() {
        if seen.insert(f.name.clone()) {
            continue;
        }
        let mut k = 1;
        loop {
            let candidate = format!("{}.{}", f.name, k);
            if !seen.contains(&candidate) && !taken.contains(&candidate) {
                seen.insert(candidate.clone());
                f.name = candidate;
                break;
            }
            k += 1;
        }
    }
}
