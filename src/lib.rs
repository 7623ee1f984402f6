//! table_sync — partitioned reconciliation and repair between a source
//! and a destination SQL table.
//!
//! Given a primary key and a year/month(/week) partitioning scheme, this
//! crate reads matching partitions from both sides, normalizes values
//! across dialect drift (numeric precision, date-vs-datetime, string
//! padding), records discrepancies, and can repair the destination from
//! recorded source values with a set-based `UPDATE ... FROM ... JOIN`.
//!
//! The core (`compare`, `merge`, `dispatcher`, `sink`, `repair`,
//! `orchestrator`) never speaks a concrete wire protocol; it depends only
//! on the narrow [`connection::Connection`]/[`connection::Cursor`] traits.
//! Concrete, feature-gated adapters live under [`connectors`].

pub mod cli;
pub mod compare;
pub mod config;
pub mod connection;
pub mod connectors;
pub mod discrepancy;
pub mod dispatcher;
pub mod error;
pub mod hash;
pub mod merge;
pub mod orchestrator;
pub mod partition;
pub mod progress;
pub mod reader;
pub mod repair;
pub mod report;
pub mod row;
pub mod sink;
pub mod value;
pub mod worker_count;
