//! survey-stats library - weekly metering-survey statistics service
//!
//! Clients submit weekly survey records; the service persists them keyed by
//! date behind an interchangeable store (flat JSON file or SQLite), and can
//! list, delete, summarize, and export them as CSV/JSON. The reconciliation
//! engine owns the insert-or-replace rule, the canonical newest-first
//! ordering, and all derived representations.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;

pub mod api;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;

pub use error::{Error, Result};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Reconciliation and reporting engine (owns the injected store)
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/data",
            get(api::list_records)
                .post(api::submit_record)
                .delete(api::delete_all_records),
        )
        .route("/api/data/restore", post(api::restore_records))
        .route(
            "/api/data/:date",
            get(api::get_record).delete(api::delete_record),
        )
        .route("/api/stats", get(api::get_stats))
        .route("/api/export/json", get(api::export_json))
        .route("/api/export/csv", get(api::export_csv))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
