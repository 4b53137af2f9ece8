use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::engine::{AmountDistribution, StepStats, TypeStats};
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub total_transactions: u64,
    pub fraud_rate: f64,
    pub avg_amount: f64,
    pub most_common_type: String,
}

#[derive(Debug, Serialize)]
pub struct TypeStatsDto {
    #[serde(rename = "type")]
    pub tx_type: String,
    pub count: u64,
    pub avg_amount: f64,
    pub total_amount: f64,
}

impl From<TypeStats> for TypeStatsDto {
    fn from(s: TypeStats) -> Self {
        Self {
            tx_type: s.tx_type.to_string(),
            count: s.count,
            avg_amount: s.avg_amount,
            total_amount: s.total_amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StepStatsDto {
    pub step: u32,
    pub count: u64,
    pub avg_amount: f64,
    pub total_amount: f64,
}

impl From<StepStats> for StepStatsDto {
    fn from(s: StepStats) -> Self {
        Self {
            step: s.step.as_u32(),
            count: s.count,
            avg_amount: s.avg_amount,
            total_amount: s.total_amount,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DistributionQuery {
    /// Comma-separated bin edges, e.g. `0,1000,10000`.
    pub edges: Option<String>,
}

pub async fn get_overview(State(state): State<AppState>) -> Json<OverviewResponse> {
    let stats = state.stats.overview();
    Json(OverviewResponse {
        total_transactions: stats.total_count,
        fraud_rate: stats.fraud_rate,
        avg_amount: stats.avg_amount,
        most_common_type: stats
            .most_common_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
    })
}

pub async fn get_amount_distribution(
    Query(params): Query<DistributionQuery>,
    State(state): State<AppState>,
) -> Result<Json<AmountDistribution>, AppError> {
    let edges = match params.edges.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(parse_edges(raw)?),
    };
    let stats = state.stats.clone();
    // Custom edges need a full scan.
    let distribution =
        tokio::task::spawn_blocking(move || stats.amount_distribution(edges.as_deref()))
            .await
            .map_err(|e| AppError::Internal(format!("distribution task failed: {}", e)))??;
    Ok(Json(distribution))
}

pub async fn get_by_type(State(state): State<AppState>) -> Json<Vec<TypeStatsDto>> {
    Json(state.stats.by_type().into_iter().map(Into::into).collect())
}

pub async fn get_daily(State(state): State<AppState>) -> Json<Vec<StepStatsDto>> {
    Json(state.stats.daily().into_iter().map(Into::into).collect())
}

fn parse_edges(raw: &str) -> Result<Vec<f64>, AppError> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| AppError::BadRequest(format!("invalid bin edge '{}'", part.trim())))
        })
        .collect()
}
