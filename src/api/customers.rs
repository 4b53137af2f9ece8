use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::data::validate_count;
use crate::engine::{CustomerProfile, TopCustomer};
use crate::error::AppError;

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const DEFAULT_TOP: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CustomerListResponse {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub data: Vec<String>,
}

pub async fn list_customers(
    Query(params): Query<ListQuery>,
    State(state): State<AppState>,
) -> Result<Json<CustomerListResponse>, AppError> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    validate_count("limit", limit)?;

    let result = state.customers.list(page, limit)?;
    Ok(Json(CustomerListResponse {
        page: result.page,
        limit: result.limit,
        total: result.total,
        data: result.items.into_iter().map(|id| id.0).collect(),
    }))
}

pub async fn get_top(
    Query(params): Query<TopQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TopCustomer>>, AppError> {
    let n = params.n.unwrap_or(DEFAULT_TOP);
    validate_count("n", n)?;
    let customers = state.customers.clone();
    let top = tokio::task::spawn_blocking(move || customers.top(n))
        .await
        .map_err(|e| AppError::Internal(format!("aggregation task failed: {}", e)))??;
    Ok(Json(top))
}

pub async fn get_customer(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CustomerProfile>, AppError> {
    Ok(Json(state.customers.profile(&customer_id)?))
}
