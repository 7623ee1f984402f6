//! Discrepancy record type — the flat record persisted by the Sink and
//! exported by the CSV reporter. See §3 and §6 (output table schema).

use crate::compare::ColumnDiff;
use crate::partition::Partition;
use crate::row::Row;
use crate::value::Value;
use chrono::{DateTime, Utc};

/// The three discrepancy classes the Merge-Walker/Dispatcher can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscrepancyKind {
    Mismatch,
    MissingInDest,
    ExtraInDest,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::Mismatch => "mismatch",
            DiscrepancyKind::MissingInDest => "missing_in_dest",
            DiscrepancyKind::ExtraInDest => "extra_in_dest",
        }
    }
}

/// A single flat discrepancy row, matching the output table schema (§6).
#[derive(Debug, Clone)]
pub struct Discrepancy {
    pub primary_key: String,
    pub kind: DiscrepancyKind,
    /// Logical column name; `None` for row-level kinds.
    pub column: Option<String>,
    pub source_value: Option<Value>,
    pub dest_value: Option<Value>,
    pub source_hash: Option<String>,
    pub dest_hash: Option<String>,
    pub year: String,
    pub month: String,
    pub week: Option<String>,
    pub record_insert_datetime: DateTime<Utc>,
}

impl Discrepancy {
    pub fn mismatch(primary_key: String, diff: &ColumnDiff, partition: &Partition, inserted_at: DateTime<Utc>) -> Self {
        Discrepancy {
            primary_key,
            kind: DiscrepancyKind::Mismatch,
            column: Some(diff.column.clone()),
            source_value: Some(diff.source_value.clone()),
            dest_value: Some(diff.dest_value.clone()),
            source_hash: None,
            dest_hash: None,
            year: partition.year.clone(),
            month: partition.month.clone(),
            week: partition.week.clone(),
            record_insert_datetime: inserted_at,
        }
    }

    pub fn missing_in_dest(source_row: &Row, primary_key_column: &str, partition: &Partition, inserted_at: DateTime<Utc>) -> Self {
        Discrepancy {
            primary_key: source_row.get_or_null(primary_key_column).to_string(),
            kind: DiscrepancyKind::MissingInDest,
            column: None,
            source_value: None,
            dest_value: None,
            source_hash: None,
            dest_hash: None,
            year: partition.year.clone(),
            month: partition.month.clone(),
            week: partition.week.clone(),
            record_insert_datetime: inserted_at,
        }
    }

    pub fn extra_in_dest(dest_row: &Row, primary_key_column: &str, partition: &Partition, inserted_at: DateTime<Utc>) -> Self {
        Discrepancy {
            primary_key: dest_row.get_or_null(primary_key_column).to_string(),
            kind: DiscrepancyKind::ExtraInDest,
            column: None,
            source_value: None,
            dest_value: None,
            source_hash: None,
            dest_hash: None,
            year: partition.year.clone(),
            month: partition.month.clone(),
            week: partition.week.clone(),
            record_insert_datetime: inserted_at,
        }
    }

    /// Field names, in the fixed order used by both the output table
    /// (§6) and the CSV reporter (§4.12).
    pub const FIELD_NAMES: [&'static str; 11] = [
        "primary_key",
        "column",
        "type",
        "source_value",
        "dest_value",
        "source_hash",
        "dest_hash",
        "year",
        "month",
        "week",
        "record_insert_datetime",
    ];

    /// Render every field as a string, in `FIELD_NAMES` order — the form
    /// used for both CSV rows and the output table's string-coerced columns.
    pub fn as_string_fields(&self) -> Vec<String> {
        vec![
            self.primary_key.clone(),
            self.column.clone().unwrap_or_default(),
            self.kind.as_str().to_string(),
            self.source_value.as_ref().map(ToString::to_string).unwrap_or_default(),
            self.dest_value.as_ref().map(ToString::to_string).unwrap_or_default(),
            self.source_hash.clone().unwrap_or_default(),
            self.dest_hash.clone().unwrap_or_default(),
            self.year.clone(),
            self.month.clone(),
            self.week.clone().unwrap_or_default(),
            self.record_insert_datetime.to_rfc3339(),
        ]
    }
}
