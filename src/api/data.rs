//! CRUD endpoints for weekly records
//!
//! Request bodies arrive as untyped JSON and are validated here into the
//! typed shapes before they reach the engine; anything else is rejected
//! with a descriptive `InvalidSubmission`.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Submission, WeeklyRecord};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub total_records: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteAllResponse {
    pub success: bool,
    pub message: String,
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub success: bool,
    pub message: String,
    pub count: u64,
}

fn parse_date_param(raw: &str) -> Result<NaiveDate> {
    raw.parse()
        .map_err(|_| Error::InvalidSubmission(format!("malformed date: {:?}", raw)))
}

/// POST /api/data
pub async fn submit_record(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SubmitResponse>> {
    let submission: Submission = serde_json::from_value(body)
        .map_err(|e| Error::InvalidSubmission(e.to_string()))?;
    let date = submission.date.clone();

    let result = state.engine.submit(submission).await?;

    let message = if result.was_created {
        format!("Record for {} created", date)
    } else {
        format!("Record for {} replaced", date)
    };

    Ok(Json(SubmitResponse {
        success: true,
        message,
        total_records: result.total_records,
    }))
}

/// GET /api/data
pub async fn list_records(State(state): State<AppState>) -> Result<Json<Vec<WeeklyRecord>>> {
    Ok(Json(state.engine.list_all().await?))
}

/// GET /api/data/:date
pub async fn get_record(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<WeeklyRecord>> {
    let date = parse_date_param(&date)?;
    Ok(Json(state.engine.get_record(date).await?))
}

/// DELETE /api/data
pub async fn delete_all_records(State(state): State<AppState>) -> Result<Json<DeleteAllResponse>> {
    let deleted = state.engine.delete_all().await?;
    Ok(Json(DeleteAllResponse {
        success: true,
        message: "All records deleted".to_string(),
        deleted,
    }))
}

/// DELETE /api/data/:date
pub async fn delete_record(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let date = parse_date_param(&date)?;
    state.engine.delete_by_date(date).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Record for {} deleted", date),
    }))
}

/// POST /api/data/restore
///
/// Body must be a JSON array; individual malformed entries inside it are
/// skipped by the engine (partial success by design).
pub async fn restore_records(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<RestoreResponse>> {
    let entries = match body {
        serde_json::Value::Array(entries) => entries,
        _ => {
            return Err(Error::InvalidSubmission(
                "restore payload must be an array of weekly records".to_string(),
            ))
        }
    };

    let count = state.engine.restore(entries).await?;

    Ok(Json(RestoreResponse {
        success: true,
        message: format!("Restored {} records", count),
        count,
    }))
}
