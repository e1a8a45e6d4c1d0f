//! CSV / JSON export endpoints
//!
//! Both return downloadable payloads with content-type and filename hints,
//! and 404 `{ "error": .. }` when the store is empty.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::error::Result;
use crate::AppState;

/// GET /api/export/json
pub async fn export_json(State(state): State<AppState>) -> Result<Response> {
    let export = state.engine.export_json().await?;
    let filename = format!("survey_data_export_{}.json", Utc::now().format("%Y-%m-%d"));

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Json(export),
    )
        .into_response())
}

/// GET /api/export/csv
///
/// Prefixed with a UTF-8 BOM so spreadsheet tools pick up the Cyrillic
/// header and item names correctly.
pub async fn export_csv(State(state): State<AppState>) -> Result<Response> {
    let csv = state.engine.export_csv().await?;
    let filename = format!("survey_data_{}.csv", Utc::now().format("%Y-%m-%d"));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        format!("\u{feff}{}", csv),
    )
        .into_response())
}
