//! Persistent job record store (SQLite via sqlx).
//!
//! One row per transfer job: owner, target, locator fields, engine identifiers,
//! lifecycle state and the latest progress snapshot. The orchestration core only
//! creates and updates rows; deletion belongs to the caller layer.

mod db;
mod jobs;
mod types;

pub use db::JobDb;
pub use types::{Job, JobId, JobState, NewJob};

pub(crate) use db::unix_timestamp;

#[cfg(test)]
pub(crate) use db::open_memory;
