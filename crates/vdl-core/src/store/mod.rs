//! Persistent download record store (SQLite via sqlx).
//!
//! Holds one row per download: name, source URL, request headers, kind,
//! optional subfolder, status and an append-only log. Implements
//! [`StatusGateway`](crate::gateway::StatusGateway) for the engine.

mod db;
mod gateway;
mod records;
mod types;


pub use db::RecordStore;
pub use types::{DownloadRecord, Pagination, RecordFilter, RecordPage};
