//! Concrete, dialect-specific [`crate::connection::Connection`] adapters.
//!
//! These are deliberately thin: the core's engineering effort is in the
//! dialect-agnostic pipeline, not in driver internals (§1).

pub mod mock;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(feature = "oracle")]
pub mod oracle;
