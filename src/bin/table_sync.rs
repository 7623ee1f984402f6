//! `table-sync` binary entrypoint: parses the CLI, loads configuration,
//! opens connections, and runs the reconcile or fix-mismatches pipeline.

use clap::Parser;
use std::path::Path;
use table_sync::cli::{Cli, Command, FixMismatchesArgs, ReconcileArgs};
use table_sync::config::{CliOverrides, Config, TableConfig};
use table_sync::connection::Connection;
use table_sync::connectors::mock::MockConnection;
use table_sync::error::{Result, SyncError};
use table_sync::orchestrator;
use table_sync::partition::Partition;
use table_sync::progress::{NoopProgress, ProgressReporter, TerminalProgress};
use table_sync::repair::{distinct_mismatch_columns, repair_column, RepairOptions};
use table_sync::report;
use table_sync::sink::OutputLocation;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Command::Reconcile(args) => run_reconcile(args).await,
        Command::FixMismatches(args) => run_fix_mismatches(args).await,
    };
    std::process::exit(exit_code);
}

async fn run_reconcile(args: ReconcileArgs) -> i32 {
    let overrides = CliOverrides {
        debug: args.debug.clone(),
        limit: args.limit,
        output_mismatches: args.output_mismatches,
        record: args.record.clone(),
    };

    let config = match Config::load(&args.config, &overrides) {
        Ok(config) => config,
        Err(err) => return report_fatal(&err),
    };

    let (source_conn, dest_conn) = match open_connections(&config).await {
        Ok(pair) => pair,
        Err(err) => return report_fatal(&err),
    };

    let progress: Box<dyn ProgressReporter> = if std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        Box::new(TerminalProgress::new())
    } else {
        Box::new(NoopProgress)
    };

    let summary = match orchestrator::run(
        &config,
        source_conn.as_ref(),
        dest_conn.as_ref(),
        progress.as_ref(),
        args.record.as_deref(),
        args.output_mismatches,
    )
    .await
    {
        Ok(summary) => summary,
        Err(err) => return report_fatal(&err),
    };

    if args.output_mismatches {
        if let Some(report_config) = &config.report {
            if let Err(err) = report::write_csv(&summary.discrepancies, Path::new(&report_config.path)) {
                return report_fatal(&err);
            }
        }
    }

    summary.exit_code()
}

async fn run_fix_mismatches(args: FixMismatchesArgs) -> i32 {
    let config = match Config::load(&args.config, &CliOverrides::default()) {
        Ok(config) => config,
        Err(err) => return report_fatal(&err),
    };

    let (_source_conn, dest_conn) = match open_connections(&config).await {
        Ok(pair) => pair,
        Err(err) => return report_fatal(&err),
    };

    let output = OutputLocation {
        schema: config.output.schema.clone(),
        table: config.output.table.clone(),
    };
    let dest_columns = config.destination.column_map();
    let dest_table = format!("{}.{}", config.destination.schema, config.destination.table);

    let partitions = match &args.partition {
        Some(label) => vec![parse_partition_arg(label)],
        None => table_sync::partition::enumerate_partitions(&config.partitioning.scope),
    };

    let options = RepairOptions {
        dry_run: !args.apply,
        skip_nulls: config.updates.skip_nulls,
    };

    let mut errors = Vec::new();
    for partition in &partitions {
        let columns = match distinct_mismatch_columns(dest_conn.as_ref(), &output, partition).await {
            Ok(columns) => columns,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };
        for column in columns {
            if let Err(err) = repair_column(
                dest_conn.as_ref(),
                &dest_table,
                &dest_columns,
                &output,
                partition,
                &config.primary_key,
                &config.partitioning.year_column,
                &config.partitioning.month_column,
                config.partitioning.week_column.as_deref(),
                &column,
                &options,
            )
            .await
            {
                errors.push(err);
            }
        }
    }

    table_sync::error::most_severe_exit_code(&errors)
}

fn parse_partition_arg(label: &str) -> Partition {
    let mut parts = label.splitn(2, '-');
    let year = parts.next().unwrap_or_default().to_string();
    let month: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1);
    Partition::new(year, month, None)
}

/// Open source/destination connections per the configured dialect.
///
/// Only the in-memory mock backs this without a driver feature enabled;
/// real deployments build with `--features mssql,oracle` and supply
/// `host`/`port`/`database` or `connect_string` plus `env`-declared
/// `user`/`password`.
async fn open_connections(config: &Config) -> Result<(Box<dyn Connection>, Box<dyn Connection>)> {
    let source = open_one(&config.source, "source").await?;
    let dest = open_one(&config.destination, "destination").await?;
    Ok((source, dest))
}

async fn open_one(table: &TableConfig, role: &'static str) -> Result<Box<dyn Connection>> {
    let dialect = table.resolved_dialect()?;
    let credentials = table.resolve_credentials()?;

    match dialect {
        #[cfg(feature = "mssql")]
        table_sync::connection::Dialect::SqlServer => {
            let host = table.host.as_deref().ok_or_else(|| SyncError::Config(format!("{role}.host is required for sqlserver")))?;
            let port = table.port.unwrap_or(1433);
            let database = table
                .database
                .as_deref()
                .ok_or_else(|| SyncError::Config(format!("{role}.database is required for sqlserver")))?;
            let user = credentials.get("user").ok_or_else(|| SyncError::MissingEnvVar("user".to_string()))?;
            let password = credentials
                .get("password")
                .ok_or_else(|| SyncError::MissingEnvVar("password".to_string()))?;
            let conn = table_sync::connectors::mssql::SqlServerConnection::connect(role, host, port, user, password, database).await?;
            Ok(Box::new(conn))
        }
        #[cfg(not(feature = "mssql"))]
        table_sync::connection::Dialect::SqlServer => Ok(Box::new(MockConnection::new(table_sync::connection::Dialect::SqlServer))),

        #[cfg(feature = "oracle")]
        table_sync::connection::Dialect::Oracle => {
            let connect_string = table
                .connect_string
                .as_deref()
                .ok_or_else(|| SyncError::Config(format!("{role}.connect_string is required for oracle")))?;
            let user = credentials.get("user").ok_or_else(|| SyncError::MissingEnvVar("user".to_string()))?;
            let password = credentials
                .get("password")
                .ok_or_else(|| SyncError::MissingEnvVar("password".to_string()))?;
            let conn = table_sync::connectors::oracle::OracleConnection::connect(role, connect_string, user, password)?;
            Ok(Box::new(conn))
        }
        #[cfg(not(feature = "oracle"))]
        table_sync::connection::Dialect::Oracle => Ok(Box::new(MockConnection::new(table_sync::connection::Dialect::Oracle))),
    }
}

fn report_fatal(err: &SyncError) -> i32 {
    tracing::error!(error = %err, "fatal error");
    err.exit_code()
}
