//! File-backed record store
//!
//! Persists the full record set as a single ordered JSON array. Writes go
//! to a sibling temp file followed by an atomic rename, so a concurrent
//! reader sees either the old array or the new one, never a partial write.
//! Read-modify-write sequences are serialized by an in-process mutex.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::WeeklyRecord;
use crate::store::{RecordStore, UpsertOutcome};

pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open a file store, creating the data file (empty array) if absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_err(&path, "create data directory", e))?;
        }

        // Missing file means logically empty, but only here at initialization.
        // Read failures after this point are surfaced, never masked as empty.
        if tokio::fs::metadata(&path).await.is_err() {
            tokio::fs::write(&path, "[]")
                .await
                .map_err(|e| storage_err(&path, "initialize data file", e))?;
            info!("Initialized new data file: {}", path.display());
        } else {
            info!("Opened existing data file: {}", path.display());
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    async fn read_records(&self) -> Result<Vec<WeeklyRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| storage_err(&self.path, "read data file", e))?;

        serde_json::from_str(&content).map_err(|e| {
            Error::CorruptState(format!("{}: {}", self.path.display(), e))
        })
    }

    /// Serialize and atomically replace the data file, in canonical order.
    async fn write_records(&self, mut records: Vec<WeeklyRecord>) -> Result<()> {
        sort_canonical(&mut records);

        let content = serde_json::to_string_pretty(&records)?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| storage_err(&tmp_path, "write temp file", e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| storage_err(&self.path, "replace data file", e))?;

        Ok(())
    }
}

/// Canonical order: newest timestamp first, date descending on ties.
fn sort_canonical(records: &mut [WeeklyRecord]) {
    records.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.date.cmp(&a.date))
    });
}

fn storage_err(path: &Path, action: &str, err: std::io::Error) -> Error {
    Error::StorageUnavailable(format!("{} ({}): {}", action, path.display(), err))
}

#[async_trait::async_trait]
impl RecordStore for FileStore {
    async fn get_all(&self) -> Result<Vec<WeeklyRecord>> {
        let _guard = self.lock.lock().await;
        self.read_records().await
    }

    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<WeeklyRecord>> {
        let _guard = self.lock.lock().await;
        let records = self.read_records().await?;
        Ok(records.into_iter().find(|r| r.date == date))
    }

    async fn upsert(&self, record: WeeklyRecord) -> Result<UpsertOutcome> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;

        let was_created = match records.iter_mut().find(|r| r.date == record.date) {
            Some(existing) => {
                *existing = record;
                false
            }
            None => {
                records.push(record);
                true
            }
        };

        self.write_records(records).await?;
        Ok(UpsertOutcome { was_created })
    }

    async fn delete_all(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let count = self.read_records().await?.len() as u64;
        self.write_records(Vec::new()).await?;
        Ok(count)
    }

    async fn delete_by_date(&self, date: NaiveDate) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;
        let before = records.len();
        records.retain(|r| r.date != date);
        let removed = records.len() != before;

        if removed {
            self.write_records(records).await?;
        }
        Ok(removed)
    }

    async fn restore(&self, records: Vec<WeeklyRecord>) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let count = records.len() as u64;

        // Upsert semantics per entry: a duplicate date later in the payload
        // replaces the earlier one, keeping one record per date.
        let mut merged: Vec<WeeklyRecord> = Vec::with_capacity(records.len());
        for record in records {
            match merged.iter_mut().find(|r| r.date == record.date) {
                Some(existing) => *existing = record,
                None => merged.push(record),
            }
        }

        self.write_records(merged).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SurveyItem;

    fn item(name: &str) -> SurveyItem {
        SurveyItem {
            name: name.to_string(),
            total: 100,
            survey: 80,
            not_in_survey: 20,
            percent: 0.8,
            total_spo: 50,
            survey_spo: 40,
            spo_not_in_survey: 10,
            percent_spo: 0.8,
            is_ps_res: false,
        }
    }

    fn record(date: &str, timestamp: i64) -> WeeklyRecord {
        WeeklyRecord {
            date: date.parse().unwrap(),
            timestamp,
            items: vec![item("ФЭС-1")],
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> FileStore {
        FileStore::open(dir.path().join("data.json")).await.unwrap()
    }

    #[tokio::test]
    async fn open_initializes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let outcome = store.upsert(record("2024-01-01", 100)).await.unwrap();
        assert!(outcome.was_created);

        let mut replacement = record("2024-01-01", 200);
        replacement.items = vec![item("ФЭС-2")];
        let outcome = store.upsert(replacement).await.unwrap();
        assert!(!outcome.was_created);

        let records = store.get_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, 200);
        assert_eq!(records[0].items[0].name, "ФЭС-2");
    }

    #[tokio::test]
    async fn get_all_orders_by_timestamp_descending() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.upsert(record("2024-01-01", 100)).await.unwrap();
        store.upsert(record("2024-01-15", 300)).await.unwrap();
        store.upsert(record("2024-01-08", 200)).await.unwrap();

        let timestamps: Vec<i64> = store
            .get_all()
            .await
            .unwrap()
            .iter()
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(timestamps, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn delete_by_date_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.upsert(record("2024-01-01", 100)).await.unwrap();
        assert!(store.delete_by_date("2024-01-01".parse().unwrap()).await.unwrap());
        assert!(!store.delete_by_date("2024-01-01".parse().unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn restore_replaces_whole_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.upsert(record("2023-12-25", 50)).await.unwrap();
        let count = store
            .restore(vec![record("2024-01-01", 100), record("2024-01-08", 200)])
            .await
            .unwrap();
        assert_eq!(count, 2);

        let records = store.get_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.timestamp >= 100));
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_not_masked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = FileStore::open(&path).await.unwrap();

        tokio::fs::write(&path, "{not json").await.unwrap();

        match store.get_all().await {
            Err(Error::CorruptState(_)) => {}
            other => panic!("expected CorruptState, got {:?}", other.map(|v| v.len())),
        }
    }
}
