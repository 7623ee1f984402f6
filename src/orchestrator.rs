//! Partition Orchestrator — drives one reconciliation run end to end:
//! enumerate partitions, read both sides, merge, dispatch, sink, repair.
//! See §4.10.

use crate::compare::CompareOptions;
use crate::config::Config;
use crate::connection::Connection;
use crate::discrepancy::Discrepancy;
use crate::dispatcher::{dispatch, DispatchMode};
use crate::error::{Result, SyncError, SyncErrorKind};
use crate::merge::{merge, MergeEvent};
use crate::partition::{enumerate_partitions, Partition};
use crate::progress::ProgressReporter;
use crate::reader::{read_partition, ReadSpec};
use crate::repair::{distinct_mismatch_columns, repair_column, RepairOptions};
use crate::row::ColumnMap;
use crate::sink::{DiscrepancySink, OutputLocation};
use chrono::Utc;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of running one partition through the pipeline.
#[derive(Debug)]
struct PartitionOutcome {
    partition: Partition,
    missing_in_dest: usize,
    extra_in_dest: usize,
    mismatches: usize,
    discrepancies: Vec<Discrepancy>,
}

/// Aggregate result across every partition in a run, used for the
/// run-level summary log and the process exit code (§4.10, §7).
#[derive(Debug, Default)]
pub struct RunSummary {
    pub partitions_processed: usize,
    pub missing_in_dest: usize,
    pub extra_in_dest: usize,
    pub mismatches: usize,
    pub errors: Vec<SyncError>,
    pub sample_mismatches: Vec<String>,
    /// Every discrepancy written this run, collected only when the caller
    /// asked for it (`--output-mismatches`) — see [`run`]'s `collect_discrepancies`.
    pub discrepancies: Vec<Discrepancy>,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        crate::error::most_severe_exit_code(&self.errors)
    }
}

/// Run the reconcile pipeline for every partition in `config`'s scope.
///
/// Readers, comparator, sink, and repair are all wired per-partition;
/// partitions run sequentially in enumeration order (§4.10 — concurrent
/// month/week scheduling is a configuration opt-in not exercised here).
///
/// `collect_discrepancies` gathers every discrepancy written this run into
/// [`RunSummary::discrepancies`] for a caller that wants to export them
/// (e.g. `--output-mismatches`); pass `false` to skip the extra buffering
/// when only the summary counts are needed.
pub async fn run(
    config: &Config,
    source_conn: &dyn Connection,
    dest_conn: &dyn Connection,
    progress: &dyn ProgressReporter,
    record_pk: Option<&str>,
    collect_discrepancies: bool,
) -> Result<RunSummary> {
    let started = Instant::now();
    let partitions = enumerate_partitions(&config.partitioning.scope);
    progress.set_total(partitions.len() as u64);

    let source_columns = config.source.column_map();
    let dest_columns = config.destination.column_map();
    if !source_columns.same_logical_keys(&dest_columns) {
        return Err(SyncError::Config(
            "source and destination column maps must declare the same logical keys".to_string(),
        ));
    }

    let output = OutputLocation {
        schema: config.output.schema.clone(),
        table: config.output.table.clone(),
    };

    let mut summary = RunSummary::default();

    for partition in partitions {
        progress.set_message(&format!("partition {}", partition.label()));
        let outcome = run_partition(
            config,
            source_conn,
            dest_conn,
            &source_columns,
            &dest_columns,
            &output,
            &partition,
            record_pk,
            collect_discrepancies,
        )
        .await;

        summary.partitions_processed += 1;
        match outcome {
            Ok(mut result) => {
                summary.missing_in_dest += result.missing_in_dest;
                summary.extra_in_dest += result.extra_in_dest;
                summary.mismatches += result.mismatches;
                if summary.sample_mismatches.len() < 2 && result.mismatches > 0 {
                    summary.sample_mismatches.push(format!(
                        "{}: {} mismatches",
                        result.partition.label(),
                        result.mismatches
                    ));
                }
                summary.discrepancies.append(&mut result.discrepancies);
            }
            Err(err) => {
                warn!(partition = %partition.label(), error = %err, "partition failed");
                let fatal_for_run = err.kind() != SyncErrorKind::Partition;
                summary.errors.push(err);
                if fatal_for_run || !config.continue_on_partition_error {
                    break;
                }
            }
        }
        progress.inc(1);
    }

    progress.finish();
    let elapsed = started.elapsed();
    info!(
        partitions = summary.partitions_processed,
        missing_in_dest = summary.missing_in_dest,
        extra_in_dest = summary.extra_in_dest,
        mismatches = summary.mismatches,
        errors = summary.errors.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        samples = ?summary.sample_mismatches,
        "reconciliation run complete"
    );

    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn run_partition(
    config: &Config,
    source_conn: &dyn Connection,
    dest_conn: &dyn Connection,
    source_columns: &ColumnMap,
    dest_columns: &ColumnMap,
    output: &OutputLocation,
    partition: &Partition,
    record_pk: Option<&str>,
    collect_discrepancies: bool,
) -> Result<PartitionOutcome> {
    let partitioning = &config.partitioning;

    let source_spec = ReadSpec {
        schema: &config.source.schema,
        table: &config.source.table,
        columns: source_columns,
        primary_key: &config.primary_key,
        year_col: &partitioning.year_column,
        month_col: &partitioning.month_column,
        week_col: partitioning.week_column.as_deref(),
        batch_size: 1000,
        limit: config.limit,
        record_pk,
    };
    let dest_spec = ReadSpec {
        columns: dest_columns,
        ..source_spec.clone_shape(&config.destination.schema, &config.destination.table)
    };

    let (source_rows, dest_rows) = tokio::try_join!(
        read_partition(source_conn, &source_spec, partition),
        read_partition(dest_conn, &dest_spec, partition),
    )?;

    let events = merge(&source_rows, &dest_rows, &config.primary_key, &partition.label())?;

    let mut sink = DiscrepancySink::new(dest_conn, output.clone(), 500);
    let mut pairs = Vec::new();
    let mut missing_in_dest = 0usize;
    let mut extra_in_dest = 0usize;
    let mut discrepancies = Vec::new();
    let now = Utc::now();

    for event in events {
        match event {
            MergeEvent::Match(src, dest) => pairs.push((src, dest)),
            MergeEvent::MissingInDest(row) => {
                missing_in_dest += 1;
                let record = Discrepancy::missing_in_dest(&row, &config.primary_key, partition, now);
                if collect_discrepancies {
                    discrepancies.push(record.clone());
                }
                sink.write(record).await?;
            }
            MergeEvent::ExtraInDest(row) => {
                extra_in_dest += 1;
                let record = Discrepancy::extra_in_dest(&row, &config.primary_key, partition, now);
                if collect_discrepancies {
                    discrepancies.push(record.clone());
                }
                sink.write(record).await?;
            }
        }
    }

    let compare_options = CompareOptions {
        only_columns: config.comparison.only_columns.clone(),
        include_nulls: config.comparison.include_nulls,
        use_row_hash: config.comparison.use_row_hash,
    };
    let dispatch_mode = if config.comparison.parallel {
        if config.comparison.two_phase || config.comparison.parallel_mode == "batch" {
            DispatchMode::Batch {
                workers: config.workers(),
            }
        } else {
            DispatchMode::Parallel {
                workers: config.workers(),
            }
        }
    } else {
        DispatchMode::Serial
    };

    let mismatches_found =
        dispatch(pairs, source_columns.clone(), compare_options, dispatch_mode).await;
    let mismatches = mismatches_found.len();
    for mismatch in &mismatches_found {
        let pk = mismatch.source_row.get_or_null(&config.primary_key).to_string();
        for diff in &mismatch.diffs {
            let record = Discrepancy::mismatch(pk.clone(), diff, partition, now);
            if collect_discrepancies {
                discrepancies.push(record.clone());
            }
            sink.write(record).await?;
        }
    }
    sink.close().await?;

    let columns_to_repair = distinct_mismatch_columns(dest_conn, output, partition).await?;
    let repair_options = RepairOptions {
        dry_run: config.updates.dry_run,
        skip_nulls: config.updates.skip_nulls,
    };
    for column in &columns_to_repair {
        repair_column(
            dest_conn,
            &format!("{}.{}", config.destination.schema, config.destination.table),
            dest_columns,
            output,
            partition,
            &config.primary_key,
            &partitioning.year_column,
            &partitioning.month_column,
            partitioning.week_column.as_deref(),
            column,
            &repair_options,
        )
        .await?;
    }

    Ok(PartitionOutcome {
        partition: partition.clone(),
        missing_in_dest,
        extra_in_dest,
        mismatches,
        discrepancies,
    })
}

impl<'a> ReadSpec<'a> {
    /// Build a copy of this spec pointed at a different `schema`/`table`,
    /// used to derive the destination read spec from the source one
    /// without repeating shared fields (batch size, limit, record_pk).
    fn clone_shape(&self, schema: &'a str, table: &'a str) -> ReadSpec<'a> {
        ReadSpec {
            schema,
            table,
            columns: self.columns,
            primary_key: self.primary_key,
            year_col: self.year_col,
            month_col: self.month_col,
            week_col: self.week_col,
            batch_size: self.batch_size,
            limit: self.limit,
            record_pk: self.record_pk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connection::Dialect;
    use crate::connectors::mock::MockConnection;
    use crate::progress::NoopProgress;
    use crate::value::Value;
    use std::collections::BTreeMap;

    const YAML: &str = r#"
source:
  type: oracle
  schema: src
  table: accounts
  columns: [id, amount, col]
destination:
  type: sqlserver
  schema: dbo
  table: accounts
  columns: [id, amount, col]
primary_key: id
partitioning:
  year_column: year_col
  month_column: month_col
  scope:
    - year: "2021"
      month: 1
output:
  schema: dbo
  table: mismatches
updates:
  dry_run: true
"#;

    fn config() -> Config {
        serde_yaml::from_str(YAML).unwrap()
    }

    fn row(id: i64, col: &str, year: &str, month: &str) -> BTreeMap<String, Value> {
        let mut m = BTreeMap::new();
        m.insert("id".to_string(), Value::Int(id));
        m.insert("amount".to_string(), Value::Int(1));
        m.insert("col".to_string(), Value::String(col.to_string()));
        m.insert("year_col".to_string(), Value::String(year.to_string()));
        m.insert("month_col".to_string(), Value::String(month.to_string()));
        m
    }

    #[tokio::test]
    async fn test_scenario_d_end_to_end_mismatch() {
        let source = MockConnection::new(Dialect::Oracle);
        let dest = MockConnection::new(Dialect::SqlServer);
        source.seed_table("src.accounts", vec![row(2, "b", "2021", "01")]);
        dest.seed_table("dbo.accounts", vec![row(2, "c", "2021", "01")]);

        let config = config();
        let progress = NoopProgress;
        let summary = run(&config, &source, &dest, &progress, None, true).await.unwrap();

        assert_eq!(summary.partitions_processed, 1);
        assert_eq!(summary.mismatches, 1);
        assert_eq!(summary.missing_in_dest, 0);
        assert_eq!(summary.extra_in_dest, 0);
        assert!(summary.errors.is_empty());

        let mismatches = dest.table_rows("dbo.mismatches");
        assert_eq!(mismatches.len(), 1);
    }

    #[tokio::test]
    async fn test_scenario_c_missing_and_extra() {
        let source = MockConnection::new(Dialect::Oracle);
        let dest = MockConnection::new(Dialect::SqlServer);
        source.seed_table(
            "src.accounts",
            vec![
                row(1, "a", "2021", "01"),
                row(2, "a", "2021", "01"),
                row(3, "a", "2021", "01"),
            ],
        );
        dest.seed_table(
            "dbo.accounts",
            vec![
                row(2, "a", "2021", "01"),
                row(3, "a", "2021", "01"),
                row(4, "a", "2021", "01"),
            ],
        );

        let config = config();
        let progress = NoopProgress;
        let summary = run(&config, &source, &dest, &progress, None, true).await.unwrap();

        assert_eq!(summary.missing_in_dest, 1);
        assert_eq!(summary.extra_in_dest, 1);
        assert_eq!(summary.mismatches, 0);
    }
}
