//! Error types for table_sync.
//!
//! All errors that can occur in the reconciliation pipeline are represented
//! by [`SyncError`]. Errors are propagated via `Result<T, SyncError>`
//! throughout the codebase and converted to a process exit code at the
//! CLI boundary (`main`).
//!
//! # Error Classification
//!
//! Errors are classified into severities that determine whether a run can
//! continue past a failing partition and what exit code is reported:
//! - **Config** — bad configuration, unresolvable secrets. Fatal before the
//!   pipeline starts.
//! - **Connect** — a source/destination connection could not be opened.
//!   Fails the owning partition.
//! - **Query** — a read, insert, merge, or repair statement failed.
//!   Fails the owning partition.
//! - **Ordering** — the Merge-Walker observed a non-monotonic key.
//!   Fails the owning partition; indicates a broken `ORDER BY`.
//! - **Runtime** — anything else unexpected.

use std::fmt;

/// Primary error type for the reconciliation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    // ── Config errors — fatal before pipeline start ───────────────────
    /// A required configuration section is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A declared environment variable was not set.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An unsupported or unknown dialect was requested.
    #[error("unsupported dialect: {0}")]
    UnknownDialect(String),

    // ── Connection errors — fatal for the owning partition ────────────
    #[error("connection error ({role}): {message}")]
    Connect { role: &'static str, message: String },

    // ── Query errors — fatal for the owning partition ─────────────────
    #[error("query error: {0}")]
    Query(String),

    /// The Sink failed during flush; the in-flight batch is rolled back.
    #[error("sink flush failed: {0}")]
    Sink(String),

    /// The Repair Executor failed for one column; other columns still run.
    #[error("repair failed for column '{column}': {message}")]
    Repair { column: String, message: String },

    // ── Ordering / type errors — fatal for the owning partition ───────
    /// The Merge-Walker observed a non-monotonic primary key from a reader.
    #[error("ordering error in partition {partition}: key went from {previous} to {next}")]
    Ordering {
        partition: String,
        previous: String,
        next: String,
    },

    /// Source and destination keys at the same position have incompatible types.
    #[error("type mismatch on key in partition {partition}: source={source_repr}, dest={dest_repr}")]
    TypeMismatchOnKey {
        partition: String,
        source_repr: String,
        dest_repr: String,
    },

    // ── Runtime / internal ─────────────────────────────────────────────
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Classification of error severity, used to pick a process exit code and
/// to decide whether the orchestrator may continue to the next partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncErrorKind {
    /// Fails one partition; orchestrator may continue if configured to.
    Partition,
    /// Fails the whole connection/run; fatal before any partition runs.
    Connectivity,
    /// Bad configuration; fatal before any connection is attempted.
    Configuration,
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncErrorKind::Partition => write!(f, "PARTITION"),
            SyncErrorKind::Connectivity => write!(f, "CONNECTIVITY"),
            SyncErrorKind::Configuration => write!(f, "CONFIGURATION"),
        }
    }
}

impl SyncError {
    /// Classify the error for exit-code mapping and continuation policy.
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::Config(_) | SyncError::MissingEnvVar(_) | SyncError::UnknownDialect(_) => {
                SyncErrorKind::Configuration
            }
            SyncError::Connect { .. } => SyncErrorKind::Connectivity,
            SyncError::Query(_)
            | SyncError::Sink(_)
            | SyncError::Repair { .. }
            | SyncError::Ordering { .. }
            | SyncError::TypeMismatchOnKey { .. }
            | SyncError::Runtime(_) => SyncErrorKind::Partition,
        }
    }

    /// Process exit code for this error, per the CLI surface contract:
    /// 0 success, 1 configuration error, 2 connectivity error, 3 runtime error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            SyncErrorKind::Configuration => 1,
            SyncErrorKind::Connectivity => 2,
            SyncErrorKind::Partition => 3,
        }
    }

    /// Whether a partition failing with this error should allow the
    /// orchestrator to continue to the next partition when
    /// `continue_on_partition_error` is set.
    pub fn is_partition_scoped(&self) -> bool {
        self.kind() == SyncErrorKind::Partition
    }
}

/// Pick the most severe exit code across a run, mirroring the rule that
/// "process exit code reflects the most severe class encountered".
pub fn most_severe_exit_code(errors: &[SyncError]) -> i32 {
    errors.iter().map(SyncError::exit_code).max().unwrap_or(0)
}
