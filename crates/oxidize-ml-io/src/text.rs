use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use oxidize_ml_core::value::{format_real, parse_real};
use oxidize_ml_core::{RoleSizes, VMatError, VMatResult};
use oxidize_ml_vmat::{MemoryVMatrix, VMatrix};
use tracing::debug;

/// One whitespace-separated cell; quoted cells may contain spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub text: String,
    pub quoted: bool,
}

/// Split a line into cells. `"..."` groups a cell, `\"` escapes a quote
/// inside it.
pub(crate) fn tokenize(line: &str) -> VMatResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' if chars.peek() == Some(&'"') => {
                        chars.next();
                        text.push('"');
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => text.push(c),
                }
            }
            if !closed {
                return Err(VMatError::Parse(format!("unterminated quote in '{}'", line)));
            }
            tokens.push(Token { text, quoted: true });
        } else {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                text.push(c);
                chars.next();
            }
            tokens.push(Token { text, quoted: false });
        }
    }
    Ok(tokens)
}

pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

fn parse_sizes(rest: &str) -> VMatResult<RoleSizes> {
    let parts = rest
        .split_whitespace()
        .map(|t| {
            t.parse::<i64>()
                .map(|v| usize::try_from(v).ok())
                .map_err(|_| VMatError::Parse(format!("bad size '{}'", t)))
        })
        .collect::<VMatResult<Vec<Option<usize>>>>()?;
    if parts.len() != 4 {
        return Err(VMatError::Parse(format!("#sizes: expects 4 values, got {}", parts.len())));
    }
    Ok(RoleSizes {
        inputsize: parts[0],
        targetsize: parts[1],
        weightsize: parts[2],
        extrasize: parts[3],
    })
}

/// Field name as a single `#:` header token: each whitespace character
/// becomes `_`, an empty name becomes `_`.
fn header_name(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    name.chars().map(|c| if c.is_whitespace() { '_' } else { c }).collect()
}

/// Write `vm` as text: a `#size:` line, a `#:` line of field names, a
/// `#sizes:` line, then one whitespace-separated row per line. Missing
/// values are written `nan`. With `use_strings`, mapped values are written
/// as their quoted string.
pub fn save_ascii(vm: &dyn VMatrix, path: impl AsRef<Path>, use_strings: bool) -> VMatResult<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    let (length, width) = (vm.length(), vm.width());
    writeln!(out, "#size: {} {}", length, width)?;
    let names: Vec<String> = vm.field_names().iter().map(|n| header_name(n)).collect();
    writeln!(out, "#: {}", names.join(" "))?;
    writeln!(out, "#sizes: {}", vm.sizes())?;

    let maps = (0..width)
        .map(|j| vm.string_map(j))
        .collect::<VMatResult<Vec<_>>>()?;
    let mut row = vec![0.0; width];
    for i in 0..length {
        vm.get_row(i, &mut row)?;
        let cells: Vec<String> = row
            .iter()
            .zip(&maps)
            .map(|(&v, map)| match map.string(v) {
                Some(s) if use_strings => quote(s),
                _ => format_real(v),
            })
            .collect();
        writeln!(out, "{}", cells.join(" "))?;
    }
    out.flush()?;
    debug!(path = %path.display(), length, width, "saved ascii matrix");
    Ok(())
}

/// Read a text matrix written by [`save_ascii`]. Header lines are optional;
/// without `#size:` the width comes from the first row. Quoted or
/// non-numeric cells become string-mapped values of their column.
pub fn load_ascii(path: impl AsRef<Path>) -> VMatResult<MemoryVMatrix> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let mut declared: Option<(usize, usize)> = None;
    let mut names: Option<Vec<String>> = None;
    let mut sizes: Option<RoleSizes> = None;
    let mut m: Option<MemoryVMatrix> = None;

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#size:") {
            let dims: Vec<usize> = rest
                .split_whitespace()
                .map(|t| t.parse().map_err(|_| VMatError::Parse(format!("bad dimension '{}'", t))))
                .collect::<VMatResult<_>>()?;
            if dims.len() != 2 {
                return Err(VMatError::Parse("#size: expects a length and a width".into()));
            }
            declared = Some((dims[0], dims[1]));
        } else if let Some(rest) = line.strip_prefix("#sizes:") {
            sizes = Some(parse_sizes(rest)?);
        } else if let Some(rest) = line.strip_prefix("#:") {
            names = Some(rest.split_whitespace().map(String::from).collect());
        } else if line.starts_with('#') {
            continue;
        } else {
            let tokens = tokenize(line)?;
            let width = declared.map(|d| d.1).unwrap_or(tokens.len());
            let m = m.get_or_insert_with(|| MemoryVMatrix::with_width(width));
            if tokens.len() != m.width() {
                return Err(VMatError::Parse(format!(
                    "line {}: {} values, expected {}",
                    lineno + 1,
                    tokens.len(),
                    m.width()
                )));
            }
            let mut values = Vec::with_capacity(tokens.len());
            for (j, t) in tokens.iter().enumerate() {
                let v = match (t.quoted, parse_real(&t.text)) {
                    (false, Some(v)) => v,
                    _ => m.add_string_mapping(j, &t.text)?,
                };
                values.push(v);
            }
            m.append_row(&values)?;
        }
    }

    let width = declared
        .map(|d| d.1)
        .or_else(|| names.as_ref().map(|n| n.len()))
        .unwrap_or(0);
    let m = m.unwrap_or_else(|| MemoryVMatrix::with_width(width));
    if let Some((length, _)) = declared {
        if length != m.length() {
            return Err(VMatError::Parse(format!(
                "#size: announces {} rows but {} were read",
                length,
                m.length()
            )));
        }
    }
    if let Some(names) = names {
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        m.declare_field_names(&names)?;
    }
    if let Some(sizes) = sizes {
        m.set_sizes(sizes)?;
    }
    debug!(path = %path.display(), length = m.length(), width = m.width(), "loaded ascii matrix");
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxidize_ml_core::{is_missing, MISSING};
    use tempfile::tempdir;

    #[test]
    fn test_tokenize() {
        let t = tokenize(r#"1.5  "New York" nan "say \"hi\"""#).unwrap();
        assert_eq!(t.len(), 4);
        assert_eq!(t[1], Token { text: "New York".into(), quoted: true });
        assert_eq!(t[3].text, "say \"hi\"");
        assert!(tokenize("\"open").is_err());
    }

    #[test]
    fn test_round_trip_with_strings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.amat");
        let m = MemoryVMatrix::from_rows(&[vec![1.0, 0.0, 2.5], vec![MISSING, 0.0, -1.0]]).unwrap();
        m.declare_field_names(&["x", "city", "y"]).unwrap();
        m.set_sizes(RoleSizes::new(2, 1, 0, 0)).unwrap();
        let paris = m.add_string_mapping(1, "Paris").unwrap();
        let rome = m.add_string_mapping(1, "Old Rome").unwrap();
        m.put(0, 1, paris).unwrap();
        m.put(1, 1, rome).unwrap();

        save_ascii(&m, &path, true).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("#size: 2 3\n#: x city y\n#sizes: 2 1 0 0\n"));
        assert!(text.contains("\"Old Rome\""));

        let back = load_ascii(&path).unwrap();
        assert_eq!(back.length(), 2);
        assert_eq!(back.field_names(), vec!["x", "city", "y"]);
        assert_eq!(back.sizes(), RoleSizes::new(2, 1, 0, 0));
        assert!(is_missing(back.get(1, 0).unwrap()));
        assert_eq!(back.get_string(0, 1).unwrap(), "Paris");
        assert_eq!(back.get_string(1, 1).unwrap(), "Old Rome");
        assert_eq!(back.get(1, 2).unwrap(), -1.0);
    }

    #[test]
    fn test_awkward_field_names_keep_header_aligned() {
        assert_eq!(header_name(" two  spaces "), "_two__spaces_");
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.amat");
        let m = MemoryVMatrix::from_rows(&[vec![1.0, 2.0, 3.0]]).unwrap();
        m.declare_field_names(&["a  b", "", "c"]).unwrap();
        save_ascii(&m, &path, false).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("#: a__b _ c\n"));

        let back = load_ascii(&path).unwrap();
        assert_eq!(back.field_names(), vec!["a__b", "_", "c"]);
        assert_eq!(back.row(0).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_numbers_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.amat");
        let m = MemoryVMatrix::from_rows(&[vec![1.0, 2.0]]).unwrap();
        m.add_string_mapping(0, "one").unwrap();
        save_ascii(&m, &path, false).unwrap();
        let back = load_ascii(&path).unwrap();
        assert_eq!(back.row(0).unwrap(), vec![1.0, 2.0]);
        assert_eq!(back.sizes(), RoleSizes::unknown());
    }

    #[test]
    fn test_headerless_and_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.txt");
        fs::write(&path, "# comment\n1 2 3\n4 5 6\n").unwrap();
        let m = load_ascii(&path).unwrap();
        assert_eq!((m.length(), m.width()), (2, 3));

        fs::write(&path, "1 2 3\n4 5\n").unwrap();
        assert!(matches!(load_ascii(&path), Err(VMatError::Parse(_))));

        fs::write(&path, "#size: 3 1\n1\n").unwrap();
        assert!(load_ascii(&path).is_err());
    }
}
