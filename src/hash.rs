//! xxHash-based row fingerprinting.
//!
//! Row hashes are deterministic 64-bit fingerprints used as a fast-path
//! skip: if two rows hash equal, the Comparator can avoid scanning every
//! column. Hashing runs over the Normalizer's canonical form, so the
//! guarantee in §4.2 holds: `values_equal(a, b)` on every column implies
//! equal hashes.

use crate::row::{ColumnMap, Row};
use crate::value::normalize;
use xxhash_rust::xxh64::xxh64;

/// Fixed seed so hashes are reproducible across runs and hosts.
const SEED: u64 = 0x517cc1b727220a95;

/// Compute a 64-bit row fingerprint over `columns` in sorted logical-name
/// order (`ColumnMap` always iterates sorted), joining canonical values
/// with `|`. See §4.2.
pub fn row_hash(row: &Row, columns: &ColumnMap) -> u64 {
    let mut joined = String::new();
    for (i, logical) in columns.logical_names().enumerate() {
        if i > 0 {
            joined.push('|');
        }
        let canonical = normalize(row.get_or_null(logical));
        joined.push_str(&canonical.to_string());
    }
    xxh64(joined.as_bytes(), SEED)
}

/// Render a row hash as lowercase hex, the form stored in discrepancy
/// records' `source_hash`/`dest_hash` fields.
pub fn row_hash_hex(row: &Row, columns: &ColumnMap) -> String {
    format!("{:016x}", row_hash(row, columns))
}
