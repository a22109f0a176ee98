use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use oxidize_ml_core::value::{format_real, parse_real};
use oxidize_ml_core::{is_missing, FieldInfo, FieldType, VMatError, VMatResult};
use oxidize_ml_vmat::VMatrix;
use tracing::debug;

use crate::text::{quote, tokenize};

/// One line per column: `<name>` or `<name>\t<type code>`.
pub fn save_field_infos(vm: &dyn VMatrix, path: impl AsRef<Path>) -> VMatResult<()> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    for f in vm.field_infos() {
        match f.field_type {
            FieldType::Unknown => writeln!(out, "{}", f.name)?,
            t => writeln!(out, "{}\t{}", f.name, t.code())?,
        }
    }
    out.flush()?;
    Ok(())
}

pub fn load_field_infos(path: impl AsRef<Path>) -> VMatResult<Vec<FieldInfo>> {
    let text = fs::read_to_string(path.as_ref())?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| match line.rsplit_once('\t') {
            Some((name, code)) => {
                let code: u8 = code
                    .trim()
                    .parse()
                    .map_err(|_| VMatError::Parse(format!("bad field type code in '{}'", line)))?;
                Ok(FieldInfo::new(name.trim(), FieldType::from_code(code)?))
            }
            None => Ok(FieldInfo::named(line.trim())),
        })
        .collect()
}

/// One `"<string>" <real>` line per mapping of column `col`.
pub fn save_string_mapping(vm: &dyn VMatrix, col: usize, path: impl AsRef<Path>) -> VMatResult<()> {
    let map = vm.string_map(col)?;
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    for (s, v) in map.entries() {
        writeln!(out, "{} {}", quote(s), format_real(v))?;
    }
    out.flush()?;
    Ok(())
}

/// Add the mappings of a file written by [`save_string_mapping`] to column
/// `col`. Quotes around the string are optional; an unquoted string runs up
/// to the last whitespace of the line. Returns the number of mappings read.
pub fn load_string_mapping(vm: &dyn VMatrix, col: usize, path: impl AsRef<Path>) -> VMatResult<usize> {
    let text = fs::read_to_string(path.as_ref())?;
    let mut n = 0;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (s, value) = if line.starts_with('"') {
            let tokens = tokenize(line)?;
            match tokens.as_slice() {
                [s, v] if s.quoted => (s.text.clone(), v.text.clone()),
                _ => return Err(VMatError::Parse(format!("bad mapping line '{}'", line))),
            }
        } else {
            match line.rsplit_once(char::is_whitespace) {
                Some((s, v)) => (s.trim().to_string(), v.to_string()),
                None => return Err(VMatError::Parse(format!("bad mapping line '{}'", line))),
            }
        };
        let v = parse_real(&value)
            .filter(|v| !is_missing(*v))
            .ok_or_else(|| VMatError::Parse(format!("bad mapped value '{}'", value)))?;
        vm.add_string_mapping_with_value(col, &s, v)?;
        n += 1;
    }
    debug!(col, mappings = n, "loaded string mapping");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidize_ml_vmat::MemoryVMatrix;
    use tempfile::tempdir;

    #[test]
    fn test_field_infos_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fieldnames");
        let m = MemoryVMatrix::new(1, 2);
        m.set_field_infos(vec![
            FieldInfo::named("age"),
            FieldInfo::new("color", FieldType::DiscreteGeneral),
        ])
        .unwrap();
        save_field_infos(&m, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "age\ncolor\t2\n");
        assert_eq!(load_field_infos(&path).unwrap(), m.field_infos());
    }

    #[test]
    fn test_bad_type_code() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fieldnames");
        fs::write(&path, "a\t9\n").unwrap();
        assert!(load_field_infos(&path).is_err());
    }

    #[test]
    fn test_string_mapping_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.smap");
        let m = MemoryVMatrix::new(1, 1);
        m.add_string_mapping(0, "red").unwrap();
        m.add_string_mapping(0, "dark blue").unwrap();
        save_string_mapping(&m, 0, &path).unwrap();

        let other = MemoryVMatrix::new(1, 1);
        assert_eq!(load_string_mapping(&other, 0, &path).unwrap(), 2);
        assert_eq!(other.get_string_val(0, "red").unwrap(), Some(-1000.0));
        assert_eq!(other.get_val_string(0, -1001.0).unwrap(), "dark blue");
    }

    #[test]
    fn test_unquoted_mappings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.smap");
        fs::write(&path, "low 0\nvery high 2\n\"mid\" 1\n").unwrap();
        let m = MemoryVMatrix::new(1, 1);
        assert_eq!(load_string_mapping(&m, 0, &path).unwrap(), 3);
        assert_eq!(m.get_string_val(0, "very high").unwrap(), Some(2.0));
        assert_eq!(m.get_val_string(0, 1.0).unwrap(), "mid");

        fs::write(&path, "lonely\n").unwrap();
        assert!(load_string_mapping(&m, 0, &path).is_err());
    }
}
