pub mod customers;
pub mod fraud;
pub mod stats;
pub mod system;
pub mod transactions;

use crate::config::Config;
use crate::data::DataAccessLayer;
use crate::domain::TransactionType;
use crate::engine::{BalanceCheck, CustomerAggregator, FraudScoringEngine, StatisticsEngine};
use crate::error::AppError;
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub dal: Arc<dyn DataAccessLayer>,
    pub stats: Arc<StatisticsEngine>,
    pub fraud: Arc<FraudScoringEngine>,
    pub customers: Arc<CustomerAggregator>,
    pub config: Config,
    pub started_at: Instant,
    pub loaded_at: DateTime<Utc>,
}

impl AppState {
    /// Wire the engines over `dal`. Statistics are precomputed here.
    pub fn new(dal: Arc<dyn DataAccessLayer>, config: Config) -> Self {
        let stats = StatisticsEngine::new(dal.clone());
        let balance_check = match config.fraud_balance_tolerance {
            Some(tol) => BalanceCheck::Tolerance(tol),
            None => BalanceCheck::Exact,
        };
        let fraud = FraudScoringEngine::new(dal.clone(), stats.clone()).with_balance_check(balance_check);
        let customers = CustomerAggregator::new(dal.clone());

        Self {
            dal,
            stats,
            fraud: Arc::new(fraud),
            customers: Arc::new(customers),
            config,
            started_at: Instant::now(),
            loaded_at: Utc::now(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(system::root))
        .route("/api/transactions", get(transactions::list_transactions))
        .route("/api/transactions/types", get(transactions::get_types))
        .route("/api/transactions/recent", get(transactions::get_recent))
        .route("/api/transactions/search", post(transactions::search_transactions))
        .route(
            "/api/transactions/by-customer/:customer_id",
            get(transactions::get_by_customer),
        )
        .route(
            "/api/transactions/to-customer/:customer_id",
            get(transactions::get_to_customer),
        )
        .route(
            "/api/transactions/:id",
            get(transactions::get_transaction).delete(transactions::delete_transaction),
        )
        .route("/api/stats/overview", get(stats::get_overview))
        .route(
            "/api/stats/amount-distribution",
            get(stats::get_amount_distribution),
        )
        .route("/api/stats/by-type", get(stats::get_by_type))
        .route("/api/stats/daily", get(stats::get_daily))
        .route("/api/fraud/summary", get(fraud::get_summary))
        .route("/api/fraud/by-type", get(fraud::get_by_type))
        .route("/api/fraud/predict", post(fraud::predict))
        .route("/api/customers", get(customers::list_customers))
        .route("/api/customers/top", get(customers::get_top))
        .route("/api/customers/:customer_id", get(customers::get_customer))
        .route("/api/system/health", get(system::health))
        .route("/api/system/metadata", get(system::metadata))
        .layer(cors)
        .with_state(state)
}

pub(crate) fn parse_type(raw: Option<&str>) -> Result<Option<TransactionType>, AppError> {
    match raw {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<TransactionType>()
            .map(Some)
            .map_err(|e| AppError::BadRequest(e.to_string())),
    }
}

pub(crate) fn parse_fraud_flag(raw: Option<u8>) -> Result<Option<bool>, AppError> {
    match raw {
        None => Ok(None),
        Some(0) => Ok(Some(false)),
        Some(1) => Ok(Some(true)),
        Some(other) => Err(AppError::BadRequest(format!(
            "isFraud must be 0 or 1, got {}",
            other
        ))),
    }
}
