//! Summary statistics endpoint

use axum::{extract::State, Json};

use crate::engine::Stats;
use crate::error::Result;
use crate::AppState;

/// GET /api/stats
///
/// Zero counts and null dates on an empty store; never an error.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<Stats>> {
    Ok(Json(state.engine.compute_stats().await?))
}
