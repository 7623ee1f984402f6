//! Row Comparator — per-column mismatch extraction between two rows
//! already keyed on a common primary-key value. See §4.3.

use crate::hash::row_hash;
use crate::row::{ColumnMap, Row};
use crate::value::{is_null_or_empty, values_equal};

/// A single differing column between a source and destination row.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDiff {
    pub column: String,
    pub source_value: crate::value::Value,
    pub dest_value: crate::value::Value,
}

/// Policy governing `compare_row`, mirroring the `comparison` config
/// section (§6).
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Restrict comparison to these logical columns, if set.
    pub only_columns: Option<Vec<String>>,
    /// Suppress a diff when either side is null (or empty string).
    pub include_nulls: bool,
    /// Skip per-column comparison entirely when row hashes match.
    pub use_row_hash: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        CompareOptions {
            only_columns: None,
            include_nulls: false,
            use_row_hash: false,
        }
    }
}

impl CompareOptions {
    fn columns_to_check<'a>(&'a self, columns: &'a ColumnMap) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match &self.only_columns {
            Some(only) => Box::new(
                columns
                    .logical_names()
                    .filter(move |c| only.iter().any(|o| o == c)),
            ),
            None => Box::new(columns.logical_names()),
        }
    }
}

/// Compare `src` and `dest`, already matched on primary key, over the
/// logical columns named by `columns` (subject to `options.only_columns`).
///
/// If `options.use_row_hash` is set and the two rows hash equal, returns
/// `[]` without scanning columns at all (§4.3's fast path).
pub fn compare_row(
    src: &Row,
    dest: &Row,
    columns: &ColumnMap,
    options: &CompareOptions,
) -> Vec<ColumnDiff> {
    if options.use_row_hash && row_hash(src, columns) == row_hash(dest, columns) {
        return Vec::new();
    }

    let mut diffs = Vec::new();
    for logical in options.columns_to_check(columns) {
        let s = src.get_or_null(logical);
        let d = dest.get_or_null(logical);

        if !options.include_nulls && (is_null_or_empty(s) || is_null_or_empty(d)) {
            continue;
        }

        if !values_equal(s, d) {
            diffs.push(ColumnDiff {
                column: logical.to_string(),
                source_value: s.clone(),
                dest_value: d.clone(),
            });
        }
    }
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        Row::new(map)
    }

    #[test]
    fn test_identical_rows_have_no_diffs() {
        let columns = ColumnMap::from_identity(["id", "col"]);
        let r = row(&[("id", Value::Int(1)), ("col", Value::String("a".into()))]);
        let diffs = compare_row(&r, &r, &columns, &CompareOptions::default());
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_scenario_d_single_column_mismatch() {
        let columns = ColumnMap::from_identity(["id", "col"]);
        let src = row(&[("id", Value::Int(2)), ("col", Value::String("b".into()))]);
        let dest = row(&[("id", Value::Int(2)), ("col", Value::String("c".into()))]);
        let diffs = compare_row(&src, &dest, &columns, &CompareOptions::default());
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].column, "col");
        assert_eq!(diffs[0].source_value, Value::String("b".into()));
        assert_eq!(diffs[0].dest_value, Value::String("c".into()));
    }

    #[test]
    fn test_every_column_differs_emits_one_diff_each() {
        let columns = ColumnMap::from_identity(["a", "b"]);
        let src = row(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let dest = row(&[("a", Value::Int(3)), ("b", Value::Int(4))]);
        let diffs = compare_row(&src, &dest, &columns, &CompareOptions::default());
        assert_eq!(diffs.len(), 2);
    }

    #[test]
    fn test_include_nulls_default_suppresses_null_diff() {
        let columns = ColumnMap::from_identity(["id", "col"]);
        let src = row(&[("id", Value::Int(1)), ("col", Value::Null)]);
        let dest = row(&[("id", Value::Int(1)), ("col", Value::String("x".into()))]);
        let diffs = compare_row(&src, &dest, &columns, &CompareOptions::default());
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_include_nulls_true_reports_null_diff() {
        let columns = ColumnMap::from_identity(["id", "col"]);
        let src = row(&[("id", Value::Int(1)), ("col", Value::Null)]);
        let dest = row(&[("id", Value::Int(1)), ("col", Value::String("x".into()))]);
        let options = CompareOptions {
            include_nulls: true,
            ..CompareOptions::default()
        };
        let diffs = compare_row(&src, &dest, &columns, &options);
        assert_eq!(diffs.len(), 1);
    }

    #[test]
    fn test_only_columns_filters() {
        let columns = ColumnMap::from_identity(["a", "b"]);
        let src = row(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let dest = row(&[("a", Value::Int(9)), ("b", Value::Int(9))]);
        let options = CompareOptions {
            only_columns: Some(vec!["a".to_string()]),
            ..CompareOptions::default()
        };
        let diffs = compare_row(&src, &dest, &columns, &options);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].column, "a");
    }

    #[test]
    fn test_row_hash_fast_path_skips_column_scan() {
        let columns = ColumnMap::from_identity(["id", "amount"]);
        // Equal under normalization but not under raw equality.
        let src = row(&[("id", Value::Int(1)), ("amount", Value::Float(-265.23))]);
        let dest = row(&[("id", Value::Int(1)), ("amount", Value::Float(-265.230000))]);
        let options = CompareOptions {
            use_row_hash: true,
            ..CompareOptions::default()
        };
        let diffs = compare_row(&src, &dest, &columns, &options);
        assert!(diffs.is_empty());
    }
}
