//! Configuration loading — parses the YAML config document into [`Config`],
//! resolves environment-backed credentials, and applies CLI overrides. See
//! §4.11 and §6.

use crate::connection::Dialect;
use crate::error::{Result, SyncError};
use crate::partition::ScopeEntry;
use crate::row::ColumnMap;
use crate::worker_count::optimal_worker_count;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// The polymorphic `columns` field: either a bare list of logical names
/// (sugar for an identity map) or an explicit logical->physical map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ColumnsField {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl ColumnsField {
    fn into_column_map(self) -> ColumnMap {
        match self {
            ColumnsField::List(names) => ColumnMap::from_identity(names),
            ColumnsField::Map(pairs) => ColumnMap::from_pairs(pairs),
        }
    }
}

/// One side of the reconciliation (`source` or `destination`).
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    #[serde(rename = "type")]
    pub dialect: String,
    pub schema: String,
    pub table: String,
    columns: ColumnsField,
    /// Logical connection-parameter name -> environment variable name.
    /// By convention `user` and `password` are always resolved this way;
    /// `host`/`port`/`database`/`connect_string` are plain config fields
    /// below since they are not usually secret.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    /// Oracle-style `host:port/service_name` connect string, used instead
    /// of `host`/`port`/`database` for the Oracle dialect.
    #[serde(default)]
    pub connect_string: Option<String>,
}

impl TableConfig {
    pub fn column_map(&self) -> ColumnMap {
        self.columns.clone().into_column_map()
    }

    pub fn resolved_dialect(&self) -> Result<Dialect> {
        Dialect::parse(&self.dialect)
    }

    /// Read every declared `env` credential, failing fast on the first
    /// missing variable (§4.11 — "a missing variable is a fatal
    /// ConfigError").
    pub fn resolve_credentials(&self) -> Result<BTreeMap<String, String>> {
        let mut resolved = BTreeMap::new();
        for (logical, var_name) in &self.env {
            let value = std::env::var(var_name).map_err(|_| SyncError::MissingEnvVar(var_name.clone()))?;
            resolved.insert(logical.clone(), value);
        }
        Ok(resolved)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartitioningConfig {
    pub year_column: String,
    pub month_column: String,
    #[serde(default)]
    pub week_column: Option<String>,
    pub scope: Vec<ScopeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub schema: String,
    pub table: String,
}

/// How the Comparison Dispatcher schedules its work (§4.7, §6).
#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonConfig {
    #[serde(default = "default_true")]
    pub use_row_hash: bool,
    #[serde(default)]
    pub only_columns: Option<Vec<String>>,
    #[serde(default)]
    pub include_nulls: bool,
    #[serde(default = "default_true")]
    pub normalize_types: bool,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_parallel_mode")]
    pub parallel_mode: String,
    #[serde(default = "default_workers")]
    pub workers: WorkersField,
    #[serde(default)]
    pub two_phase: bool,
    #[serde(default)]
    pub aggressive_memory_cleanup: bool,
}

fn default_true() -> bool {
    true
}

fn default_parallel_mode() -> String {
    "thread".to_string()
}

fn default_workers() -> WorkersField {
    WorkersField::Auto("auto".to_string())
}

/// `workers: int | "auto"` (§6); resolved to a concrete count at load time.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WorkersField {
    Count(usize),
    Auto(String),
}

impl WorkersField {
    fn resolve(&self) -> usize {
        match self {
            WorkersField::Count(n) => (*n).max(1),
            WorkersField::Auto(_) => optimal_worker_count(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatesConfig {
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default)]
    pub skip_nulls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub path: String,
}

/// The fully parsed, CLI-overridden configuration (§6 "Configuration
/// (enumerated options)").
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: TableConfig,
    pub destination: TableConfig,
    pub primary_key: String,
    pub partitioning: PartitioningConfig,
    pub output: OutputConfig,
    #[serde(default = "ComparisonConfig::default_via_deserialize")]
    pub comparison: ComparisonConfig,
    #[serde(default)]
    pub updates: UpdatesConfig,
    #[serde(default = "default_debug_level")]
    pub debug: DebugField,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub report: Option<ReportConfig>,
    /// Resolved worker count, filled in by [`Config::finalize`].
    #[serde(skip)]
    resolved_workers: usize,
    /// Whether a partition failure should abort the run or allow the
    /// orchestrator to continue (§5, §7). Not part of the YAML schema in
    /// the distilled spec; defaults to continuing.
    #[serde(default = "default_true")]
    pub continue_on_partition_error: bool,
    #[serde(default = "default_partition_workers")]
    pub max_partition_workers: usize,
}

fn default_debug_level() -> DebugField {
    DebugField::Level("low".to_string())
}

fn default_partition_workers() -> usize {
    1
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        UpdatesConfig {
            dry_run: true,
            skip_nulls: false,
        }
    }
}

impl ComparisonConfig {
    fn default_via_deserialize() -> Self {
        ComparisonConfig {
            use_row_hash: true,
            only_columns: None,
            include_nulls: false,
            normalize_types: true,
            parallel: false,
            parallel_mode: default_parallel_mode(),
            workers: default_workers(),
            two_phase: false,
            aggressive_memory_cleanup: false,
        }
    }
}

/// `debug: "low" | "medium" | "high" | bool` (§6). A bare boolean is
/// sugar: `true` means `"high"`, `false` means `"low"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DebugField {
    Level(String),
    Enabled(bool),
}

impl DebugField {
    pub fn level(&self) -> &str {
        match self {
            DebugField::Level(level) => level,
            DebugField::Enabled(true) => "high",
            DebugField::Enabled(false) => "low",
        }
    }
}

/// CLI-level overrides applied on top of the parsed file (§4.11, §6).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub debug: Option<String>,
    pub limit: Option<u64>,
    pub output_mismatches: bool,
    pub record: Option<String>,
}

impl Config {
    /// Parse a YAML document from `path`, apply `overrides`, and resolve
    /// `workers: "auto"` to a concrete count.
    pub fn load(path: &Path, overrides: &CliOverrides) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| SyncError::Config(format!("reading config file: {e}")))?;
        let mut config: Config =
            serde_yaml::from_str(&raw).map_err(|e| SyncError::Config(format!("parsing config file: {e}")))?;
        config.apply_overrides(overrides);
        config.resolved_workers = config.comparison.workers.resolve();
        Ok(config)
    }

    fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(debug) = &overrides.debug {
            self.debug = DebugField::Level(debug.clone());
        }
        if let Some(limit) = overrides.limit {
            self.limit = Some(limit);
        }
        if overrides.output_mismatches && self.report.is_none() {
            self.report = Some(ReportConfig {
                path: "mismatches.csv".to_string(),
            });
        }
        let _ = &overrides.record; // consumed by the reader's `record_pk`, not stored here
    }

    /// The resolved worker count (§4.11 — "downstream components always
    /// see an integer").
    pub fn workers(&self) -> usize {
        self.resolved_workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
source:
  type: oracle
  schema: src
  table: accounts
  columns: [id, amount, col]
  env:
    user: SRC_DB_USER
destination:
  type: sqlserver
  schema: dbo
  table: accounts
  columns:
    id: row_id
    amount: amt
    col: col
primary_key: id
partitioning:
  year_column: yr
  month_column: mo
  scope:
    - year: "2021"
      month: 1
output:
  schema: dbo
  table: mismatches
"#;

    #[test]
    fn test_columns_list_becomes_identity_map() {
        let config: Config = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        let map = config.source.column_map();
        assert_eq!(map.physical("amount"), Some("amount"));
    }

    #[test]
    fn test_columns_map_preserves_physical_names() {
        let config: Config = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        let map = config.destination.column_map();
        assert_eq!(map.physical("amount"), Some("amt"));
    }

    #[test]
    fn test_missing_env_var_is_fatal() {
        let config: Config = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        std::env::remove_var("SRC_DB_USER");
        let err = config.source.resolve_credentials().unwrap_err();
        assert!(matches!(err, SyncError::MissingEnvVar(var) if var == "SRC_DB_USER"));
    }

    #[test]
    fn test_defaults_applied_when_sections_absent() {
        let config: Config = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        assert!(config.comparison.use_row_hash);
        assert!(config.updates.dry_run);
        assert_eq!(config.debug.level(), "low");
    }

    #[test]
    fn test_cli_overrides_apply_on_top_of_file() {
        let mut config: Config = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        let overrides = CliOverrides {
            debug: Some("high".to_string()),
            limit: Some(500),
            output_mismatches: true,
            record: None,
        };
        config.apply_overrides(&overrides);
        assert_eq!(config.debug.level(), "high");
        assert_eq!(config.limit, Some(500));
        assert!(config.report.is_some());
    }

    #[test]
    fn test_debug_accepts_bool_form() {
        let yaml = format!("{SAMPLE_YAML}\ndebug: true\n");
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.debug.level(), "high");

        let yaml = format!("{SAMPLE_YAML}\ndebug: false\n");
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.debug.level(), "low");
    }

    #[test]
    fn test_workers_auto_resolves_to_positive_count() {
        let mut config: Config = serde_yaml::from_str(SAMPLE_YAML).unwrap();
        config.resolved_workers = config.comparison.workers.resolve();
        assert!(config.workers() >= 1);
    }
}
