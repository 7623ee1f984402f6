//! Repair Executor — set-based UPDATE-FROM-JOIN repair of destination
//! rows from recorded source values, one statement per mismatched
//! column. See §4.9.

use crate::connection::{Connection, Param};
use crate::error::Result;
use crate::partition::Partition;
use crate::row::ColumnMap;
use crate::sink::OutputLocation;
use crate::value::is_null_or_empty;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Print SQL and bound parameters without executing.
    pub dry_run: bool,
    /// Exclude records whose `source_value` is null or empty string.
    pub skip_nulls: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        RepairOptions {
            dry_run: true,
            skip_nulls: false,
        }
    }
}

/// One column's repair outcome, for the run summary.
#[derive(Debug, Clone)]
pub struct RepairResult {
    pub column: String,
    pub rows_affected: usize,
    pub dry_run: bool,
}

/// A staged mismatch read back from the output table for one column.
#[derive(Debug, Clone)]
pub struct MismatchRecord {
    pub primary_key: String,
    pub source_value: crate::value::Value,
}

/// Distinct mismatched logical columns recorded for `partition`.
pub async fn distinct_mismatch_columns(
    conn: &dyn Connection,
    output: &OutputLocation,
    partition: &Partition,
) -> Result<Vec<String>> {
    let mut sql = format!(
        "SELECT column FROM {} WHERE type = ? AND year = ? AND month = ?",
        output.qualified()
    );
    let mut params = vec![
        Param::Text("mismatch".to_string()),
        Param::Text(partition.year.clone()),
        Param::Text(partition.month.clone()),
    ];
    if let Some(week) = &partition.week {
        sql.push_str(" AND week = ?");
        params.push(Param::Text(week.clone()));
    }
    let mut cursor = conn.execute(&sql, &params).await?;
    let rows = cursor.fetchmany(usize::MAX).await?;
    let mut columns: Vec<String> = rows
        .into_iter()
        .filter_map(|r| r.get("column").map(|v| v.to_string()))
        .collect();
    columns.sort();
    columns.dedup();
    Ok(columns)
}

/// Run the set-based repair for one mismatched column: build and execute
/// the UPDATE-FROM-JOIN, then delete the repaired rows from the output
/// table so the partition does not re-repair on the next run.
pub async fn repair_column(
    dest_conn: &dyn Connection,
    dest_table: &str,
    dest_columns: &ColumnMap,
    output: &OutputLocation,
    partition: &Partition,
    primary_key: &str,
    year_col: &str,
    month_col: &str,
    week_col: Option<&str>,
    column: &str,
    options: &RepairOptions,
) -> Result<RepairResult> {
    let phys_pk = dest_columns.physical(primary_key).unwrap_or(primary_key);
    let phys_col = dest_columns.physical(column).unwrap_or(column);

    let mut join_predicate = format!(
        "dest.{phys_pk} = out.primary_key AND dest.{year_col} = out.year AND dest.{month_col} = out.month"
    );
    if let Some(week_col) = week_col {
        join_predicate.push_str(&format!(" AND dest.{week_col} = out.week"));
    }

    let mut where_clause = "out.type = ? AND out.column = ? AND out.year = ? AND out.month = ?".to_string();
    let mut delete_where_clause = "type = ? AND column = ? AND year = ? AND month = ?".to_string();
    if partition.week.is_some() {
        where_clause.push_str(" AND out.week = ?");
        delete_where_clause.push_str(" AND week = ?");
    }
    if options.skip_nulls {
        where_clause.push_str(" AND out.source_value IS NOT NULL AND out.source_value <> ''");
        delete_where_clause.push_str(" AND source_value IS NOT NULL AND source_value <> ''");
    }

    let update_sql = format!(
        "UPDATE {dest_table} SET dest.{phys_col} = out.source_value \
         FROM {dest_table} dest JOIN {output} out ON {join} \
         WHERE {where_clause}",
        dest_table = dest_table,
        phys_col = phys_col,
        output = output.qualified(),
        join = join_predicate,
        where_clause = where_clause,
    );

    let mut params = vec![
        Param::Text("mismatch".to_string()),
        Param::Text(column.to_string()),
        Param::Text(partition.year.clone()),
        Param::Text(partition.month.clone()),
    ];
    if let Some(week) = &partition.week {
        params.push(Param::Text(week.clone()));
    }

    if options.dry_run {
        info!(column, sql = %update_sql, ?params, "dry-run: repair not executed");
        return Ok(RepairResult {
            column: column.to_string(),
            rows_affected: 0,
            dry_run: true,
        });
    }

    dest_conn.execute(&update_sql, &params).await?;
    dest_conn.commit().await?;

    let delete_sql = format!(
        "DELETE FROM {output} WHERE {delete_where_clause}",
        output = output.qualified(),
        delete_where_clause = delete_where_clause,
    );
    dest_conn.execute(&delete_sql, &params).await?;
    dest_conn.commit().await?;

    debug!(column, partition = %partition.label(), "repair applied and output rows cleared");

    Ok(RepairResult {
        column: column.to_string(),
        rows_affected: 0,
        dry_run: false,
    })
}
