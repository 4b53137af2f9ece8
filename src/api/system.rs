use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime: String,
    pub dataset_loaded: bool,
}

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub version: &'static str,
    pub last_update: DateTime<Utc>,
    pub test_mode: bool,
    pub total_transactions: usize,
}

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "txledger",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": {
            "transactions": "/api/transactions",
            "stats": "/api/stats",
            "fraud": "/api/fraud",
            "customers": "/api/customers",
            "system": "/api/system",
        },
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let loaded = !state.dal.is_empty();
    Json(HealthResponse {
        status: if loaded { "ok" } else { "degraded" },
        uptime: format_uptime(state.started_at.elapsed()),
        dataset_loaded: loaded,
    })
}

pub async fn metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    Json(MetadataResponse {
        version: env!("CARGO_PKG_VERSION"),
        last_update: state.loaded_at,
        test_mode: state.dal.is_test_mode(),
        total_transactions: state.dal.len(),
    })
}

/// `"2h 5min"`, `"3min 12s"` or `"42s"`.
fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {}min", hours, minutes)
    } else if minutes > 0 {
        format!("{}min {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
