//! Durable keyed storage for weekly records
//!
//! Two interchangeable backends sit behind the [`RecordStore`] contract:
//! a flat JSON file ([`FileStore`]) and a SQLite table ([`SqliteStore`]).
//! Callers pick one per deployment; the engine never knows which.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::model::WeeklyRecord;

pub mod file;
pub mod sqlite;

pub use file::FileStore;
pub use sqlite::SqliteStore;

/// Outcome of an upsert: whether the record was newly created
/// (as opposed to replacing an existing record for the same date).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub was_created: bool,
}

/// Storage contract for weekly records, keyed by date.
///
/// Implementations guarantee:
/// - at most one record per date;
/// - `get_all` returns records ordered by timestamp descending;
/// - `upsert` atomically replaces the whole record (readers never observe
///   a partially written one);
/// - an empty store is not an error, and the backing storage is created
///   transparently at construction time.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records, newest timestamp first. Empty vec when none exist.
    async fn get_all(&self) -> Result<Vec<WeeklyRecord>>;

    /// Single record for a date, or `None`.
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<WeeklyRecord>>;

    /// Insert-or-replace keyed by date. The old items sequence is fully
    /// discarded on replace; there is no field-level merge.
    async fn upsert(&self, record: WeeklyRecord) -> Result<UpsertOutcome>;

    /// Remove every record. Returns the number removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Remove the record for a date. Returns whether one existed.
    async fn delete_by_date(&self, date: NaiveDate) -> Result<bool>;

    /// Bulk replace: clear the store, then insert the given records.
    /// Entries are assumed already validated; returns the inserted count.
    async fn restore(&self, records: Vec<WeeklyRecord>) -> Result<u64>;
}
