//! SQLite-backed record store
//!
//! One row per date: `date` (unique key, ISO string), `timestamp` (ms since
//! epoch, drives canonical ordering), `items` (JSON payload column holding
//! the week's survey items). Upsert is `INSERT .. ON CONFLICT(date) DO
//! UPDATE` inside a transaction, so concurrent submissions for the same
//! date serialize on the database and readers never see a partial replace.

use std::path::Path;

use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{SurveyItem, WeeklyRecord};
use crate::store::{RecordStore, UpsertOutcome};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to (and if needed create) the database file, then ensure
    /// the schema exists.
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let newly_created = !db_path.exists();
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| {
                Error::StorageUnavailable(format!("connect {}: {}", db_path.display(), e))
            })?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        // WAL allows concurrent readers while a submission writes
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// In-memory database, for tests.
    ///
    /// Pinned to a single pooled connection: every pool connection would
    /// otherwise get its own private in-memory database.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::StorageUnavailable(format!("connect :memory:: {}", e)))?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weekly_records (
                date TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                items TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_weekly_records_timestamp \
             ON weekly_records(timestamp DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Decode one row, surfacing unreadable content as `CorruptState`.
fn decode_row(date: String, timestamp: i64, items: String) -> Result<WeeklyRecord> {
    let date: NaiveDate = date
        .parse()
        .map_err(|e| Error::CorruptState(format!("row date {:?}: {}", date, e)))?;
    let items: Vec<SurveyItem> = serde_json::from_str(&items)
        .map_err(|e| Error::CorruptState(format!("items payload for {}: {}", date, e)))?;

    Ok(WeeklyRecord {
        date,
        timestamp,
        items,
    })
}

#[async_trait::async_trait]
impl RecordStore for SqliteStore {
    async fn get_all(&self) -> Result<Vec<WeeklyRecord>> {
        let rows = sqlx::query_as::<_, (String, i64, String)>(
            "SELECT date, timestamp, items FROM weekly_records \
             ORDER BY timestamp DESC, date DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(date, timestamp, items)| decode_row(date, timestamp, items))
            .collect()
    }

    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<WeeklyRecord>> {
        let row = sqlx::query_as::<_, (String, i64, String)>(
            "SELECT date, timestamp, items FROM weekly_records WHERE date = ?",
        )
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(date, timestamp, items)| decode_row(date, timestamp, items))
            .transpose()
    }

    async fn upsert(&self, record: WeeklyRecord) -> Result<UpsertOutcome> {
        let items = serde_json::to_string(&record.items)?;
        let date = record.date.to_string();

        let mut tx = self.pool.begin().await?;

        let existed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM weekly_records WHERE date = ?)",
        )
        .bind(&date)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO weekly_records (date, timestamp, items) VALUES (?, ?, ?) \
             ON CONFLICT(date) DO UPDATE SET \
                 timestamp = excluded.timestamp, \
                 items = excluded.items",
        )
        .bind(&date)
        .bind(record.timestamp)
        .bind(&items)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(UpsertOutcome {
            was_created: !existed,
        })
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM weekly_records")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_date(&self, date: NaiveDate) -> Result<bool> {
        let result = sqlx::query("DELETE FROM weekly_records WHERE date = ?")
            .bind(date.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore(&self, records: Vec<WeeklyRecord>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM weekly_records")
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0u64;
        for record in records {
            let items = serde_json::to_string(&record.items)?;
            sqlx::query(
                "INSERT INTO weekly_records (date, timestamp, items) VALUES (?, ?, ?) \
                 ON CONFLICT(date) DO UPDATE SET \
                     timestamp = excluded.timestamp, \
                     items = excluded.items",
            )
            .bind(record.date.to_string())
            .bind(record.timestamp)
            .bind(&items)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
