//! CSV Reporter — flat-file export of discrepancy records, independent of
//! the Discrepancy Sink's table persistence. See §4.12.

use crate::discrepancy::Discrepancy;
use crate::error::{Result, SyncError};
use std::path::Path;
use tracing::info;

/// Write `discrepancies` to `path` as CSV, creating parent directories as
/// needed. A no-op (logged, not an error) when the list is empty.
pub fn write_csv(discrepancies: &[Discrepancy], path: &Path) -> Result<()> {
    if discrepancies.is_empty() {
        info!(path = %path.display(), "no discrepancies to report, skipping CSV export");
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::Runtime(format!("creating report directory: {e}")))?;
        }
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| SyncError::Runtime(format!("opening report file: {e}")))?;
    writer
        .write_record(Discrepancy::FIELD_NAMES)
        .map_err(|e| SyncError::Runtime(format!("writing report header: {e}")))?;
    for record in discrepancies {
        writer
            .write_record(record.as_string_fields())
            .map_err(|e| SyncError::Runtime(format!("writing report row: {e}")))?;
    }
    writer.flush().map_err(|e| SyncError::Runtime(format!("flushing report file: {e}")))?;

    info!(path = %path.display(), count = discrepancies.len(), "wrote discrepancy report");
    Ok(())
}
