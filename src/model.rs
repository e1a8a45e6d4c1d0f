//! Wire and storage types for weekly survey records
//!
//! Field names on the wire are camelCase to match the submitting frontend;
//! a week's items travel under the `data` key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One date's full survey submission: all monitored items for that week.
///
/// `date` is the unique key within the store. `timestamp` (ms since epoch)
/// orders listings newest-first; it is otherwise derivable from `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRecord {
    pub date: NaiveDate,
    pub timestamp: i64,
    #[serde(rename = "data")]
    pub items: Vec<SurveyItem>,
}

/// One monitored feeder network's metering counters for a given week.
///
/// `percent` / `percentSpo` are fractions in [0,1] supplied by the caller
/// and stored as-is; the service never recomputes them from the counts,
/// and `survey + notInSurvey == total` is deliberately not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyItem {
    pub name: String,
    pub total: u64,
    pub survey: u64,
    pub not_in_survey: u64,
    pub percent: f64,
    pub total_spo: u64,
    pub survey_spo: u64,
    pub spo_not_in_survey: u64,
    pub percent_spo: f64,
    /// Marks the item as excluded from aggregate percentage reporting.
    /// Annotated in exports, never filtered out.
    #[serde(default)]
    pub is_ps_res: bool,
}

/// Raw submission body as received from a client.
///
/// `date` stays a string here so the engine can reject malformed dates with
/// a descriptive message instead of a generic deserialization failure.
/// `timestamp` is optional; the engine substitutes the current instant when
/// it is absent or non-positive.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub date: String,
    pub timestamp: Option<i64>,
    #[serde(rename = "data", default)]
    pub items: Vec<SurveyItem>,
}
