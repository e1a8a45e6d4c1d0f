//! Reconciliation and reporting engine
//!
//! Turns raw submissions and raw store snapshots into canonical, orderable,
//! exportable state: validates incoming weekly records, applies the
//! insert-or-replace rule via the store's atomic upsert, and derives
//! summary statistics and CSV/JSON export representations.

use std::sync::Arc;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{Submission, WeeklyRecord};
use crate::store::RecordStore;

/// Fixed CSV header, always emitted first.
const CSV_HEADER: &str = "Дата,ФЭС,Всего ПУ,ПУ в опросе,ПУ не в опросе,\
% опроса,СПОДЭС ПУ,СПОДЭС в опросе,СПОДЭС не в опросе,% СПОДЭС,Примечание";

/// Note annotating items excluded from the aggregate percentage.
const EXCLUDED_FROM_TOTAL_NOTE: &str = "не в общем %";

/// Outcome of a submission: create vs update, and the new store size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitResult {
    pub was_created: bool,
    pub total_records: u64,
}

/// Summary statistics over the whole store.
///
/// First/last dates come from the canonical newest-first ordering: first is
/// the tail of the listing, last is the head. An empty store yields zero
/// counts and `null` dates, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_weeks: u64,
    pub first_record_date: Option<NaiveDate>,
    pub last_record_date: Option<NaiveDate>,
    pub total_item_records: u64,
}

/// JSON export wrapper: full listing plus export metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExport {
    pub version: String,
    pub exported_at: String,
    pub total_weeks: u64,
    pub data: Vec<WeeklyRecord>,
}

pub struct Engine {
    store: Arc<dyn RecordStore>,
}

impl Engine {
    /// The store is injected at construction time; the engine works against
    /// the contract, not a concrete backend.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a weekly submission (full replace, no merge).
    ///
    /// The client timestamp is accepted when present and positive;
    /// otherwise the current instant is substituted. Stale or absent
    /// client clocks only affect display ordering, never the date key.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitResult> {
        let date: NaiveDate = submission.date.parse().map_err(|_| {
            Error::InvalidSubmission(format!("malformed date: {:?}", submission.date))
        })?;

        if submission.items.is_empty() {
            return Err(Error::InvalidSubmission(
                "data must be a non-empty sequence of survey items".to_string(),
            ));
        }

        let timestamp = match submission.timestamp {
            Some(ts) if ts > 0 => ts,
            _ => Utc::now().timestamp_millis(),
        };

        let record = WeeklyRecord {
            date,
            timestamp,
            items: submission.items,
        };

        let outcome = self.store.upsert(record).await?;
        let total_records = self.store.get_all().await?.len() as u64;

        if outcome.was_created {
            info!("Created weekly record for {}", date);
        } else {
            info!("Replaced weekly record for {}", date);
        }

        Ok(SubmitResult {
            was_created: outcome.was_created,
            total_records,
        })
    }

    /// All records in canonical order (newest timestamp first).
    pub async fn list_all(&self) -> Result<Vec<WeeklyRecord>> {
        self.store.get_all().await
    }

    /// Single record by date, or `NotFound`.
    pub async fn get_record(&self, date: NaiveDate) -> Result<WeeklyRecord> {
        self.store
            .get_by_date(date)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no record for {}", date)))
    }

    /// Wipe the store. Returns the number of records removed.
    pub async fn delete_all(&self) -> Result<u64> {
        let deleted = self.store.delete_all().await?;
        info!("Deleted all records ({} removed)", deleted);
        Ok(deleted)
    }

    /// Remove one record by date, or `NotFound` if none exists.
    pub async fn delete_by_date(&self, date: NaiveDate) -> Result<()> {
        if self.store.delete_by_date(date).await? {
            info!("Deleted weekly record for {}", date);
            Ok(())
        } else {
            Err(Error::NotFound(format!("no record for {}", date)))
        }
    }

    /// Bulk replace from a backup payload.
    ///
    /// Lenient by design: malformed entries (unparseable shape, empty
    /// items) are skipped with a warning, not fatal. Returns how many
    /// valid entries were persisted.
    pub async fn restore(&self, raw: Vec<serde_json::Value>) -> Result<u64> {
        let mut valid: Vec<WeeklyRecord> = Vec::with_capacity(raw.len());

        for entry in raw {
            match serde_json::from_value::<WeeklyRecord>(entry) {
                Ok(record) if !record.items.is_empty() => valid.push(record),
                Ok(record) => {
                    warn!("Restore: skipping entry for {} with empty items", record.date);
                }
                Err(e) => {
                    warn!("Restore: skipping malformed entry: {}", e);
                }
            }
        }

        let inserted = self.store.restore(valid).await?;
        info!("Restored {} records from backup", inserted);
        Ok(inserted)
    }

    /// Derive summary statistics from the canonical listing.
    pub async fn compute_stats(&self) -> Result<Stats> {
        let records = self.store.get_all().await?;

        Ok(Stats {
            total_weeks: records.len() as u64,
            first_record_date: records.last().map(|r| r.date),
            last_record_date: records.first().map(|r| r.date),
            total_item_records: records.iter().map(|r| r.items.len() as u64).sum(),
        })
    }

    /// Full listing wrapped with export metadata. `NoData` when empty.
    pub async fn export_json(&self) -> Result<JsonExport> {
        let records = self.store.get_all().await?;
        if records.is_empty() {
            return Err(Error::NoData);
        }

        Ok(JsonExport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            total_weeks: records.len() as u64,
            data: records,
        })
    }

    /// One CSV row per survey item across all weeks, canonical order,
    /// header first. `NoData` when empty.
    ///
    /// Only the name field is quoted; embedded quotes and commas in other
    /// fields are not escaped. Known limitation, preserved deliberately.
    pub async fn export_csv(&self) -> Result<String> {
        let records = self.store.get_all().await?;
        if records.is_empty() {
            return Err(Error::NoData);
        }

        let mut out = String::from(CSV_HEADER);
        out.push('\n');

        for week in &records {
            let formatted_date = week.date.format("%d.%m.%Y").to_string();
            for item in &week.items {
                let note = if item.is_ps_res {
                    EXCLUDED_FROM_TOTAL_NOTE
                } else {
                    ""
                };
                out.push_str(&format!(
                    "{},\"{}\",{},{},{},{:.2},{},{},{},{:.2},{}\n",
                    formatted_date,
                    item.name,
                    item.total,
                    item.survey,
                    item.not_in_survey,
                    item.percent * 100.0,
                    item.total_spo,
                    item.survey_spo,
                    item.spo_not_in_survey,
                    item.percent_spo * 100.0,
                    note,
                ));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SurveyItem;
    use crate::store::SqliteStore;
    use serde_json::json;

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

    fn submission(date: &str, timestamp: Option<i64>, items: Vec<SurveyItem>) -> Submission {
        Submission {
            date: date.to_string(),
            timestamp,
            items,
        }
    }

    async fn engine() -> Engine {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        Engine::new(Arc::new(store))
    }

    #[tokio::test]
    async fn submit_rejects_malformed_date() {
        let engine = engine().await;
        let result = engine
            .submit(submission("not-a-date", Some(100), vec![item("А")]))
            .await;
        assert!(matches!(result, Err(Error::InvalidSubmission(_))));
    }

    #[tokio::test]
    async fn submit_rejects_empty_items() {
        let engine = engine().await;
        let result = engine.submit(submission("2024-01-01", Some(100), vec![])).await;
        assert!(matches!(result, Err(Error::InvalidSubmission(_))));
    }

    #[tokio::test]
    async fn submit_substitutes_missing_timestamp() {
        let engine = engine().await;
        engine
            .submit(submission("2024-01-01", None, vec![item("А")]))
            .await
            .unwrap();

        let records = engine.list_all().await.unwrap();
        assert!(records[0].timestamp > 0);
    }

    #[tokio::test]
    async fn submit_is_idempotent_per_date() {
        let engine = engine().await;

        let first = engine
            .submit(submission("2024-01-01", Some(100), vec![item("А")]))
            .await
            .unwrap();
        assert!(first.was_created);
        assert_eq!(first.total_records, 1);

        let second = engine
            .submit(submission("2024-01-01", Some(100), vec![item("А")]))
            .await
            .unwrap();
        assert!(!second.was_created);
        assert_eq!(second.total_records, 1);
    }

    #[tokio::test]
    async fn resubmission_fully_replaces_items() {
        let engine = engine().await;

        engine
            .submit(submission("2024-01-01", Some(100), vec![item("А"), item("Б")]))
            .await
            .unwrap();
        engine
            .submit(submission("2024-01-01", Some(200), vec![item("В")]))
            .await
            .unwrap();

        let records = engine.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].items.len(), 1);
        assert_eq!(records[0].items[0].name, "В");
    }

    #[tokio::test]
    async fn stats_over_two_weeks() {
        let engine = engine().await;

        // W1 earliest (2 items), W2 latest (3 items)
        engine
            .submit(submission("2024-01-01", Some(100), vec![item("А"), item("Б")]))
            .await
            .unwrap();
        engine
            .submit(submission(
                "2024-01-08",
                Some(200),
                vec![item("В"), item("Г"), item("Д")],
            ))
            .await
            .unwrap();

        let stats = engine.compute_stats().await.unwrap();
        assert_eq!(stats.total_weeks, 2);
        assert_eq!(stats.total_item_records, 5);
        assert_eq!(stats.first_record_date.unwrap().to_string(), "2024-01-01");
        assert_eq!(stats.last_record_date.unwrap().to_string(), "2024-01-08");
    }

    #[tokio::test]
    async fn stats_on_empty_store() {
        let engine = engine().await;
        let stats = engine.compute_stats().await.unwrap();
        assert_eq!(
            stats,
            Stats {
                total_weeks: 0,
                first_record_date: None,
                last_record_date: None,
                total_item_records: 0,
            }
        );
    }

    #[tokio::test]
    async fn exports_fail_with_no_data_on_empty_store() {
        let engine = engine().await;
        assert!(matches!(engine.export_csv().await, Err(Error::NoData)));
        assert!(matches!(engine.export_json().await, Err(Error::NoData)));
    }

    #[tokio::test]
    async fn csv_row_shape_and_date_format() {
        let engine = engine().await;
        let mut test_item = item("Test");
        test_item.percent = 0.8;

        engine
            .submit(submission("2024-01-15", Some(100), vec![test_item]))
            .await
            .unwrap();

        let csv = engine.export_csv().await.unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Дата,ФЭС"));
        assert_eq!(
            lines.next().unwrap(),
            "15.01.2024,\"Test\",100,80,20,80.00,50,40,10,80.00,"
        );
    }

    #[tokio::test]
    async fn csv_annotates_excluded_items() {
        let engine = engine().await;
        let mut excluded = item("ПС Рез");
        excluded.is_ps_res = true;

        engine
            .submit(submission("2024-01-15", Some(100), vec![excluded]))
            .await
            .unwrap();

        let csv = engine.export_csv().await.unwrap();
        assert!(csv.lines().nth(1).unwrap().ends_with(",не в общем %"));
    }

    #[tokio::test]
    async fn export_json_wraps_listing_with_metadata() {
        let engine = engine().await;
        engine
            .submit(submission("2024-01-01", Some(100), vec![item("А")]))
            .await
            .unwrap();

        let export = engine.export_json().await.unwrap();
        assert_eq!(export.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(export.total_weeks, 1);
        assert_eq!(export.data.len(), 1);
        assert!(!export.exported_at.is_empty());
    }

    #[tokio::test]
    async fn restore_skips_malformed_entries() {
        let engine = engine().await;

        let payload = vec![
            json!({
                "date": "2024-01-01",
                "timestamp": 100,
                "data": [serde_json::to_value(item("А")).unwrap()]
            }),
            // missing date
            json!({ "timestamp": 200, "data": [serde_json::to_value(item("Б")).unwrap()] }),
            // empty items
            json!({ "date": "2024-01-08", "timestamp": 300, "data": [] }),
            // items not a sequence
            json!({ "date": "2024-01-15", "timestamp": 400, "data": "oops" }),
        ];

        let inserted = engine.restore(payload).await.unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(engine.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_by_date_not_found() {
        let engine = engine().await;
        let result = engine.delete_by_date("2024-01-01".parse().unwrap()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn percent_is_trusted_not_recomputed() {
        let engine = engine().await;
        // Inconsistent on purpose: percent does not match survey/total
        let mut inconsistent = item("А");
        inconsistent.percent = 0.123;

        engine
            .submit(submission("2024-01-01", Some(100), vec![inconsistent]))
            .await
            .unwrap();

        let records = engine.list_all().await.unwrap();
        assert_eq!(records[0].items[0].percent, 0.123);
    }
}
