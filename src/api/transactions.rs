use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_fraud_flag, parse_type, AppState};
use crate::data::{validate_count, validate_page, SearchCriteria, TransactionFilter};
use crate::domain::Transaction;
use crate::error::AppError;

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const DEFAULT_RECENT: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    #[serde(rename = "isFraud")]
    pub is_fraud: Option<u8>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    #[serde(rename = "isFraud")]
    pub is_fraud: Option<u8>,
    pub amount_range: Option<(f64, f64)>,
    pub limit: Option<usize>,
}

/// Full transaction in the column naming of the CSV source.
#[derive(Debug, Serialize)]
pub struct TransactionDto {
    pub id: String,
    pub step: u32,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub amount: f64,
    #[serde(rename = "nameOrig")]
    pub name_orig: String,
    #[serde(rename = "oldbalanceOrg")]
    pub old_balance_org: f64,
    #[serde(rename = "newbalanceOrig")]
    pub new_balance_orig: f64,
    #[serde(rename = "nameDest")]
    pub name_dest: String,
    #[serde(rename = "oldbalanceDest")]
    pub old_balance_dest: f64,
    #[serde(rename = "newbalanceDest")]
    pub new_balance_dest: f64,
    #[serde(rename = "isFraud")]
    pub is_fraud: u8,
    #[serde(rename = "isFlaggedFraud")]
    pub is_flagged_fraud: u8,
}

impl From<Transaction> for TransactionDto {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            step: tx.step.as_u32(),
            tx_type: tx.tx_type.to_string(),
            amount: tx.amount,
            name_orig: tx.origin_customer_id.0,
            old_balance_org: tx.old_balance_origin,
            new_balance_orig: tx.new_balance_origin,
            name_dest: tx.dest_customer_id.0,
            old_balance_dest: tx.old_balance_dest,
            new_balance_dest: tx.new_balance_dest,
            is_fraud: u8::from(tx.is_fraud),
            is_flagged_fraud: u8::from(tx.is_flagged_fraud),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionSummaryDto {
    pub id: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub tx_type: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub transactions: Vec<TransactionSummaryDto>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

fn to_dtos(rows: Vec<Transaction>) -> Vec<TransactionDto> {
    rows.into_iter().map(TransactionDto::from).collect()
}

pub async fn list_transactions(
    Query(params): Query<ListQuery>,
    State(state): State<AppState>,
) -> Result<Json<TransactionListResponse>, AppError> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    validate_page(page, limit)?;
    validate_count("limit", limit)?;

    let filter = TransactionFilter {
        tx_type: parse_type(params.tx_type.as_deref())?,
        is_fraud: parse_fraud_flag(params.is_fraud)?,
        min_amount: params.min_amount,
        max_amount: params.max_amount,
    };

    let result = state.dal.paginate(page, limit, &filter)?;
    let transactions = result
        .items
        .into_iter()
        .map(|tx| TransactionSummaryDto {
            id: tx.id,
            amount: tx.amount,
            tx_type: tx.tx_type.to_string(),
        })
        .collect();

    Ok(Json(TransactionListResponse {
        page: result.page,
        limit: result.limit,
        total: result.total,
        transactions,
    }))
}

pub async fn get_transaction(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TransactionDto>, AppError> {
    let tx = state.dal.get_by_id(&id)?;
    Ok(Json(tx.into()))
}

pub async fn search_transactions(
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<Vec<TransactionDto>>, AppError> {
    let limit = body.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    validate_count("limit", limit)?;

    let criteria = SearchCriteria {
        tx_type: parse_type(body.tx_type.as_deref())?,
        is_fraud: parse_fraud_flag(body.is_fraud)?,
        amount_range: body.amount_range,
        limit: Some(limit),
    };

    let rows = state.dal.search(&criteria)?;
    Ok(Json(to_dtos(rows)))
}

pub async fn get_types(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(
        state
            .dal
            .distinct_types()
            .iter()
            .map(|t| t.to_string())
            .collect(),
    )
}

pub async fn get_recent(
    Query(params): Query<RecentQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionDto>>, AppError> {
    let n = params.n.unwrap_or(DEFAULT_RECENT);
    validate_count("n", n)?;
    let rows = state.dal.recent(n)?;
    Ok(Json(to_dtos(rows)))
}

pub async fn get_by_customer(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
) -> Json<Vec<TransactionDto>> {
    Json(to_dtos(state.dal.by_origin(&customer_id)))
}

pub async fn get_to_customer(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
) -> Json<Vec<TransactionDto>> {
    Json(to_dtos(state.dal.by_dest(&customer_id)))
}

pub async fn delete_transaction(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DeleteResponse>, AppError> {
    let dal = state.dal.clone();
    let stats = state.stats.clone();
    let target = id.clone();
    // Copy-on-write delete and the stats recompute are both O(rows).
    let success = tokio::task::spawn_blocking(move || {
        let deleted = dal.delete(&target)?;
        stats.snapshot();
        Ok::<_, crate::data::DataError>(deleted)
    })
    .await
        .map_err(|e| AppError::Internal(format!("delete task failed: {}", e)))??;

    Ok(Json(DeleteResponse {
        success,
        message: format!("Transaction '{}' deleted", id),
    }))
}
