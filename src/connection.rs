//! The narrow async database surface the core depends on. See §6.
//!
//! The core never speaks a concrete wire protocol; it only calls through
//! [`Connection`] and [`Cursor`]. Concrete adapters (feature-gated, thin)
//! live under [`crate::connectors`].

use crate::error::{Result, SyncError};
use crate::row::Row;
use async_trait::async_trait;
use std::fmt;

/// SQL dialect, selecting bind-parameter syntax and pagination syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Oracle,
    SqlServer,
}

impl Dialect {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "oracle" => Ok(Dialect::Oracle),
            "sqlserver" | "mssql" | "sql_server" => Ok(Dialect::SqlServer),
            other => Err(SyncError::UnknownDialect(other.to_string())),
        }
    }

    /// Render a 1-indexed bind parameter for this dialect, e.g. `?` for
    /// SQL Server, `:1` for Oracle.
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::SqlServer => "?".to_string(),
            Dialect::Oracle => format!(":{position}"),
        }
    }

    /// Dialect-appropriate `LIMIT`-equivalent clause appended after
    /// `ORDER BY`.
    pub fn limit_clause(&self, n: u64) -> String {
        match self {
            Dialect::SqlServer => format!("OFFSET 0 ROWS FETCH NEXT {n} ROWS ONLY"),
            Dialect::Oracle => format!("FETCH FIRST {n} ROWS ONLY"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Oracle => write!(f, "oracle"),
            Dialect::SqlServer => write!(f, "sqlserver"),
        }
    }
}

/// A bound query parameter. The core stores values generically and lets
/// each adapter translate to its wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Text(s.to_string())
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

/// One open statement execution, yielding rows in caller-requested chunks.
#[async_trait]
pub trait Cursor: Send {
    /// Fetch up to `n` more rows, already re-keyed to physical column
    /// names. An empty vector means exhausted.
    async fn fetchmany(&mut self, n: usize) -> Result<Vec<Row>>;
}

/// A [`Cursor`] over a result set a driver adapter has already fully
/// materialized (e.g. after `into_first_result`), doled out in caller-sized
/// chunks.
pub struct VecCursor {
    rows: Vec<Row>,
    pos: usize,
}

impl VecCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        VecCursor { rows, pos: 0 }
    }
}

#[async_trait]
impl Cursor for VecCursor {
    async fn fetchmany(&mut self, n: usize) -> Result<Vec<Row>> {
        let end = self.pos.saturating_add(n).min(self.rows.len());
        let chunk = self.rows[self.pos..end].to_vec();
        self.pos = end;
        Ok(chunk)
    }
}

/// The narrow connection surface the core depends on (§6). Adapters wrap
/// a concrete driver; the in-memory fake in [`crate::connectors::mock`]
/// implements this directly over `Vec<Row>`.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a statement, returning a cursor for result rows (empty for
    /// DML that returns none).
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Box<dyn Cursor>>;

    /// Bulk insert via `executemany`-equivalent semantics. The default
    /// implementation issues one `execute` per row; adapters with a fast
    /// bulk path may override.
    async fn execute_many(&self, sql: &str, rows: &[Vec<Param>]) -> Result<()> {
        for row in rows {
            self.execute(sql, row).await?;
        }
        Ok(())
    }

    async fn commit(&self) -> Result<()>;

    fn dialect(&self) -> Dialect;
}
