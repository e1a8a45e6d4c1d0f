//! HTTP API handlers for survey-stats

pub mod data;
pub mod export;
pub mod health;
pub mod stats;

pub use data::{
    delete_all_records, delete_record, get_record, list_records, restore_records, submit_record,
};
pub use export::{export_csv, export_json};
pub use health::health_routes;
pub use stats::get_stats;
