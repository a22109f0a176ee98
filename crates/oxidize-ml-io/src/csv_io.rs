use std::path::Path;

use oxidize_ml_core::value::{format_real, parse_real};
use oxidize_ml_core::{is_missing, VMatError, VMatResult};
use oxidize_ml_vmat::{MemoryVMatrix, VMatrix};
use tracing::debug;

/// Read a CSV file into a matrix. The header row gives the field names;
/// empty cells are missing and non-numeric cells become string-mapped
/// values of their column.
pub fn read_csv(path: impl AsRef<Path>) -> VMatResult<MemoryVMatrix> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path)?;
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let m = MemoryVMatrix::with_width(headers.len());
    let names: Vec<&str> = headers.iter().map(String::as_str).collect();
    m.declare_field_names(&names)?;

    let mut values = vec![0.0; headers.len()];
    for (n, result) in rdr.records().enumerate() {
        let record = result?;
        if record.len() != headers.len() {
            return Err(VMatError::Parse(format!(
                "record {} has {} fields, header has {}",
                n + 1,
                record.len(),
                headers.len()
            )));
        }
        for (j, field) in record.iter().enumerate() {
            values[j] = match parse_real(field) {
                Some(v) => v,
                None => m.add_string_mapping(j, field.trim())?,
            };
        }
        m.append_row(&values)?;
    }

    debug!(path = %path.display(), length = m.length(), width = m.width(), "read csv");
    Ok(m)
}

/// Write a matrix as CSV with a header of field names. Missing values are
/// written as empty cells; with `use_strings`, mapped values are written as
/// their string.
pub fn write_csv(vm: &dyn VMatrix, path: impl AsRef<Path>, use_strings: bool) -> VMatResult<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    wtr.write_record(vm.field_names())?;

    let width = vm.width();
    let maps = (0..width)
        .map(|j| vm.string_map(j))
        .collect::<VMatResult<Vec<_>>>()?;
    let mut row = vec![0.0; width];
    for i in 0..vm.length() {
        vm.get_row(i, &mut row)?;
        let cells: Vec<String> = row
            .iter()
            .zip(&maps)
            .map(|(&v, map)| match map.string(v) {
                Some(s) if use_strings => s.to_string(),
                _ if is_missing(v) => String::new(),
                _ => format_real(v),
            })
            .collect();
        wtr.write_record(&cells)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_mixed_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.csv");
        fs::write(&path, "height,color,score\n1.5,red,3\n2,,4\n0.5,blue,\n1,red,1\n").unwrap();
        let m = read_csv(&path).unwrap();
        assert_eq!((m.length(), m.width()), (4, 3));
        assert_eq!(m.field_names(), vec!["height", "color", "score"]);
        assert!(is_missing(m.get(1, 1).unwrap()));
        assert!(is_missing(m.get(2, 2).unwrap()));
        assert_eq!(m.get(0, 1).unwrap(), m.get(3, 1).unwrap());
        assert_eq!(m.get_string(2, 1).unwrap(), "blue");
        assert_eq!(m.get(1, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let m = MemoryVMatrix::from_rows(&[vec![1.0, 0.0], vec![f64::NAN, 0.0]]).unwrap();
        m.declare_field_names(&["a", "label"]).unwrap();
        let yes = m.add_string_mapping(1, "yes").unwrap();
        m.put(0, 1, yes).unwrap();

        write_csv(&m, &path, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,label\n1,yes\n,0\n");

        let back = read_csv(&path).unwrap();
        assert_eq!(back.get_string(0, 1).unwrap(), "yes");
        assert!(is_missing(back.get(1, 0).unwrap()));
    }

    #[test]
    fn test_ragged_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "a,b\n1,2\n3\n").unwrap();
        assert!(read_csv(&path).is_err());
    }
}
