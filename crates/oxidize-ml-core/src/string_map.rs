use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::real_key as key;

/// First value handed out to a string added without an explicit value.
pub const FIRST_AUTO_VALUE: f64 = -1000.0;

/// Bidirectional string <-> real dictionary for one column.
///
/// Both directions are kept mutual inverses: a string maps to exactly one
/// real and that real maps back to the same string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringMap {
    to_real: HashMap<String, f64>,
    #[serde(skip)]
    to_string: HashMap<u64, String>,
}

impl StringMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.to_real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_real.is_empty()
    }

    pub fn real(&self, s: &str) -> Option<f64> {
        self.to_real.get(s).copied()
    }

    pub fn string(&self, v: f64) -> Option<&str> {
        self.to_string.get(&key(v)).map(|s| s.as_str())
    }

    /// Bind `s` to `v`, dropping any binding either side previously had.
    pub fn insert(&mut self, s: &str, v: f64) {
        if let Some(old) = self.to_real.remove(s) {
            self.to_string.remove(&key(old));
        }
        if let Some(old) = self.to_string.remove(&key(v)) {
            self.to_real.remove(&old);
        }
        self.to_real.insert(s.to_string(), v);
        self.to_string.insert(key(v), s.to_string());
    }

    /// Value bound to `s`, allocating the next free negative value if new.
    pub fn get_or_insert(&mut self, s: &str) -> f64 {
        if let Some(v) = self.real(s) {
            return v;
        }
        let mut v = FIRST_AUTO_VALUE - self.len() as f64;
        while self.to_string.contains_key(&key(v)) {
            v -= 1.0;
        }
        self.insert(s, v);
        v
    }

    pub fn remove(&mut self, s: &str) -> Option<f64> {
        let v = self.to_real.remove(s)?;
        self.to_string.remove(&key(v));
        Some(v)
    }

    /// Iterate over `(string, value)` pairs sorted by value, descending
    /// (allocation order for automatically allocated values).
    pub fn entries(&self) -> Vec<(&str, f64)> {
        let mut out: Vec<(&str, f64)> = self.to_real.iter().map(|(s, v)| (s.as_str(), *v)).collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        out
    }

    pub fn string_to_real(&self) -> &HashMap<String, f64> {
        &self.to_real
    }

    pub fn real_to_string(&self) -> HashMap<u64, String> {
        self.to_string.clone()
    }

    /// Rebuild the reverse direction after deserialization.
    pub fn reindex(&mut self) {
        self.to_string = self
            .to_real
            .iter()
            .map(|(s, v)| (key(*v), s.clone()))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_allocation() {
        let mut m = StringMap::new();
        let a = m.get_or_insert("red");
        let b = m.get_or_insert("green");
        assert_eq!(a, -1000.0);
        assert_eq!(b, -1001.0);
        assert_eq!(m.get_or_insert("red"), a);
        assert_eq!(m.string(b), Some("green"));
    }

    #[test]
    fn test_insert_keeps_inverse() {
        let mut m = StringMap::new();
        m.insert("a", 1.0);
        m.insert("b", 1.0);
        assert_eq!(m.real("a"), None);
        assert_eq!(m.string(1.0), Some("b"));
        m.insert("b", 2.0);
        assert_eq!(m.string(1.0), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_auto_skips_taken_values() {
        let mut m = StringMap::new();
        m.insert("x", -1001.0);
        let v = m.get_or_insert("y");
        assert_eq!(v, -1002.0);
        assert_eq!(m.get_or_insert("z"), -1003.0);
    }

    #[test]
    fn test_serde_reindex() {
        let mut m = StringMap::new();
        m.insert("cat", 3.0);
        let json = serde_json::to_string(&m).unwrap();
        let mut back: StringMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back.string(3.0), None);
        back.reindex();
        assert_eq!(back.string(3.0), Some("cat"));
    }
}
