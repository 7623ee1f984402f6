//! Command-line surface. See §6 "CLI surface".

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "table-sync", version, about = "Partitioned table reconciliation and repair")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read both sides, merge, compare, and record discrepancies.
    Reconcile(ReconcileArgs),
    /// Apply (or dry-run) the Repair Executor against already-recorded
    /// mismatches.
    FixMismatches(FixMismatchesArgs),
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "table_sync.yaml")]
    pub config: PathBuf,

    /// Override the configured debug verbosity.
    #[arg(long, value_parser = ["low", "medium", "high"])]
    pub debug: Option<String>,

    /// Cap the number of rows read per table, for testing.
    #[arg(long)]
    pub limit: Option<u64>,

    /// Export discrepancies to a CSV report in addition to the output table.
    #[arg(long)]
    pub output_mismatches: bool,

    /// Restrict the run to a single primary-key value.
    #[arg(long)]
    pub record: Option<String>,
}

#[derive(Debug, Args)]
pub struct FixMismatchesArgs {
    #[arg(long, default_value = "table_sync.yaml")]
    pub config: PathBuf,

    /// Execute the repair; without this flag, the run is a dry-run.
    #[arg(long)]
    pub apply: bool,

    /// Restrict to partition `YYYY-MM`; all recorded partitions otherwise.
    #[arg(long)]
    pub partition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_parses_flags() {
        let cli = Cli::parse_from([
            "table-sync",
            "reconcile",
            "--config",
            "cfg.yaml",
            "--debug",
            "high",
            "--limit",
            "100",
            "--output-mismatches",
            "--record",
            "42",
        ]);
        match cli.command {
            Command::Reconcile(args) => {
                assert_eq!(args.config, PathBuf::from("cfg.yaml"));
                assert_eq!(args.debug.as_deref(), Some("high"));
                assert_eq!(args.limit, Some(100));
                assert!(args.output_mismatches);
                assert_eq!(args.record.as_deref(), Some("42"));
            }
            _ => panic!("expected Reconcile"),
        }
    }

    #[test]
    fn test_fix_mismatches_defaults_to_dry_run() {
        let cli = Cli::parse_from(["table-sync", "fix-mismatches"]);
        match cli.command {
            Command::FixMismatches(args) => {
                assert!(!args.apply);
                assert!(args.partition.is_none());
            }
            _ => panic!("expected FixMismatches"),
        }
    }

    #[test]
    fn test_invalid_debug_level_rejected() {
        let result = Cli::try_parse_from(["table-sync", "reconcile", "--debug", "extreme"]);
        assert!(result.is_err());
    }
}
