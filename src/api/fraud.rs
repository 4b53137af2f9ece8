use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_type, AppState};
use crate::domain::{CustomerId, Step};
use crate::engine::{FraudCandidate, FraudSummary};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(rename = "type")]
    pub tx_type: String,
    pub amount: f64,
    #[serde(rename = "oldbalanceOrg")]
    pub old_balance_org: f64,
    #[serde(rename = "newbalanceOrig")]
    pub new_balance_orig: f64,
    #[serde(rename = "nameOrig")]
    pub name_orig: Option<String>,
    pub step: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    #[serde(rename = "isFraud")]
    pub is_fraud: bool,
    pub probability: f64,
    pub triggered_rules: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct FraudByTypeDto {
    #[serde(rename = "type")]
    pub tx_type: String,
    pub total: u64,
    pub fraud_count: u64,
    pub fraud_rate: f64,
}

pub async fn get_summary(State(state): State<AppState>) -> Json<FraudSummary> {
    Json(state.fraud.summary())
}

pub async fn get_by_type(State(state): State<AppState>) -> Json<Vec<FraudByTypeDto>> {
    let rows = state
        .fraud
        .fraud_rate_by_type()
        .into_iter()
        .map(|r| FraudByTypeDto {
            tx_type: r.tx_type.to_string(),
            total: r.total,
            fraud_count: r.fraud_count,
            fraud_rate: r.fraud_rate,
        })
        .collect();
    Json(rows)
}

pub async fn predict(
    State(state): State<AppState>,
    Json(body): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    let tx_type = parse_type(Some(body.tx_type.as_str()))?
        .ok_or_else(|| AppError::BadRequest("type is required".into()))?;

    let candidate = FraudCandidate {
        tx_type,
        amount: body.amount,
        old_balance_origin: body.old_balance_org,
        new_balance_origin: body.new_balance_orig,
        origin_customer_id: body
            .name_orig
            .filter(|s| !s.trim().is_empty())
            .map(CustomerId::new),
        step: body.step.map(Step::new),
    };

    let assessment = state.fraud.predict(&candidate)?;
    Ok(Json(PredictResponse {
        is_fraud: assessment.is_fraud,
        probability: assessment.probability,
        triggered_rules: assessment.triggered,
    }))
}
