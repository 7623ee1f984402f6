//! Row records and logical/physical column maps.

use crate::value::Value;
use std::collections::BTreeMap;

/// A mapping from logical column name to physical column name. Both sides
/// are lowercased at construction; the primary key is one entry whose
/// logical name equals the configured `primary_key`.
///
/// Stored as a `BTreeMap` so iteration is always in sorted logical-name
/// order, which the Row Hasher depends on (§4.2) and which keeps SQL
/// projection lists deterministic across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap(BTreeMap<String, String>);

impl ColumnMap {
    /// Build a column map from a list of logical names (identity mapping —
    /// sugar for the common case where physical names match logical names).
    pub fn from_identity<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for name in names {
            let lower = name.into().to_lowercase();
            map.insert(lower.clone(), lower);
        }
        ColumnMap(map)
    }

    /// Build a column map from explicit logical -> physical pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.into().to_lowercase(), v.into().to_lowercase());
        }
        ColumnMap(map)
    }

    pub fn physical(&self, logical: &str) -> Option<&str> {
        self.0.get(logical).map(String::as_str)
    }

    /// Logical column names in sorted order.
    pub fn logical_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn physical_names_in_logical_order(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_logical(&self, logical: &str) -> bool {
        self.0.contains_key(logical)
    }

    /// Check that `self` and `other` have identical logical key sets, as
    /// required of the source/destination column maps (§3).
    pub fn same_logical_keys(&self, other: &ColumnMap) -> bool {
        self.0.keys().eq(other.0.keys())
    }
}

/// A single row, keyed by logical column name. Immutable after
/// construction (§5 "Row records are immutable after construction").
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Row { values }
    }

    pub fn get(&self, logical_column: &str) -> Option<&Value> {
        self.values.get(logical_column)
    }

    pub fn get_or_null(&self, logical_column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(logical_column).unwrap_or(&NULL)
    }

    pub fn primary_key(&self, primary_key_column: &str) -> Option<&Value> {
        self.get(primary_key_column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_column_map_lowercases() {
        let map = ColumnMap::from_identity(["ID", "Amount"]);
        assert_eq!(map.physical("id"), Some("id"));
        assert_eq!(map.physical("amount"), Some("amount"));
    }

    #[test]
    fn test_explicit_column_map_preserves_physical_case_folding() {
        let map = ColumnMap::from_pairs([("id", "ROW_ID"), ("amount", "AMT")]);
        assert_eq!(map.physical("id"), Some("row_id"));
        assert_eq!(map.physical("amount"), Some("amt"));
    }

    #[test]
    fn test_logical_names_sorted() {
        let map = ColumnMap::from_identity(["zeta", "alpha", "mid"]);
        let names: Vec<&str> = map.logical_names().collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_same_logical_keys() {
        let a = ColumnMap::from_identity(["id", "col"]);
        let b = ColumnMap::from_pairs([("id", "row_id"), ("col", "c")]);
        assert!(a.same_logical_keys(&b));

        let c = ColumnMap::from_identity(["id"]);
        assert!(!a.same_logical_keys(&c));
    }

    #[test]
    fn test_row_get_missing_column_is_none() {
        let row = Row::new(BTreeMap::new());
        assert!(row.get("missing").is_none());
        assert!(matches!(row.get_or_null("missing"), Value::Null));
    }
}
