//! Data access abstraction over the transaction store.
//!
//! Every query the service answers goes through [`DataAccessLayer`]. The
//! runtime backs it with [`InMemoryDal`]; other stores can implement the same
//! trait without touching the engines or the routes.

use crate::domain::{CustomerId, Transaction, TransactionType};
use std::fmt;
use std::sync::Weak;
use thiserror::Error;

pub mod dataset;
pub mod loader;
pub mod memory;

pub use dataset::{Dataset, DatasetError, TransactionView};
pub use loader::{load_path, load_reader, LoadError, REQUIRED_COLUMNS};
pub use memory::InMemoryDal;

/// Upper bound for page sizes and `n`-style counts accepted from callers.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Data access contract for the ledger.
///
/// All reads observe one consistent snapshot of the store. `delete` is the
/// only mutator; it is serialized internally and notifies registered
/// listeners before it returns.
pub trait DataAccessLayer: Send + Sync + fmt::Debug {
    /// Fetch a single transaction by id.
    fn get_by_id(&self, id: &str) -> Result<Transaction, DataError>;

    /// Return the `page`-th window (1-based) of rows matching `filter`,
    /// together with the total number of matching rows.
    fn paginate(
        &self,
        page: usize,
        limit: usize,
        filter: &TransactionFilter,
    ) -> Result<Page<Transaction>, DataError>;

    /// Return every row matching `criteria`, in insertion order, up to
    /// `criteria.limit` when set.
    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Transaction>, DataError>;

    /// Distinct transaction types in first-occurrence order.
    fn distinct_types(&self) -> Vec<TransactionType>;

    /// The last `n` rows, most recent first. `n` larger than the store is clamped.
    fn recent(&self, n: usize) -> Result<Vec<Transaction>, DataError>;

    /// Rows sent by `customer_id`. Unknown customers yield an empty list.
    fn by_origin(&self, customer_id: &str) -> Vec<Transaction>;

    /// Rows received by `customer_id`. Unknown customers yield an empty list.
    fn by_dest(&self, customer_id: &str) -> Vec<Transaction>;

    /// Distinct origin customers in first-occurrence order, paginated.
    fn origin_customers(&self, page: usize, limit: usize) -> Result<Page<CustomerId>, DataError>;

    /// Remove a transaction. Only allowed in test mode.
    fn delete(&self, id: &str) -> Result<bool, DataError>;

    /// Visit every row of one snapshot in insertion order and return the
    /// version of the snapshot that was visited.
    fn scan(&self, visit: &mut dyn FnMut(TransactionView<'_>)) -> u64;

    /// Number of rows currently stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic counter bumped by every mutation.
    fn version(&self) -> u64;

    /// Whether mutating operations are enabled.
    fn is_test_mode(&self) -> bool;

    /// Register a cache to be invalidated inside the delete critical section.
    fn register_listener(&self, listener: Weak<dyn MutationListener>);
}

/// Implemented by caches derived from the store.
pub trait MutationListener: Send + Sync {
    fn invalidate(&self);
}

/// Errors surfaced by data operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// One window of a paginated result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of items matching the query regardless of the window.
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    /// Zero-based offset of the first item of `page`.
    pub fn offset(page: usize, limit: usize) -> usize {
        (page - 1).saturating_mul(limit)
    }
}

/// Reject `page < 1` and `limit < 1`.
pub fn validate_page(page: usize, limit: usize) -> Result<(), DataError> {
    if page < 1 {
        return Err(DataError::InvalidParameter("page must be >= 1".to_string()));
    }
    if limit < 1 {
        return Err(DataError::InvalidParameter("limit must be >= 1".to_string()));
    }
    Ok(())
}

/// Reject caller-supplied counts outside `1..=MAX_PAGE_LIMIT`.
pub fn validate_count(name: &str, n: usize) -> Result<(), DataError> {
    if n < 1 || n > MAX_PAGE_LIMIT {
        return Err(DataError::InvalidParameter(format!(
            "{} must be between 1 and {}",
            name, MAX_PAGE_LIMIT
        )));
    }
    Ok(())
}

/// AND-combined row predicate; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub tx_type: Option<TransactionType>,
    pub is_fraud: Option<bool>,
    /// Inclusive lower bound on `amount`.
    pub min_amount: Option<f64>,
    /// Inclusive upper bound on `amount`.
    pub max_amount: Option<f64>,
}

impl TransactionFilter {
    pub fn validate(&self) -> Result<(), DataError> {
        for (name, bound) in [("min_amount", self.min_amount), ("max_amount", self.max_amount)] {
            if let Some(v) = bound {
                if !v.is_finite() || v < 0.0 {
                    return Err(DataError::InvalidParameter(format!(
                        "{} must be a non-negative number",
                        name
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(DataError::InvalidParameter(
                    "min_amount must be <= max_amount".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn matches(&self, row: &TransactionView<'_>) -> bool {
        self.tx_type.map_or(true, |t| row.tx_type == t)
            && self.is_fraud.map_or(true, |f| row.is_fraud == f)
            && self.min_amount.map_or(true, |min| row.amount >= min)
            && self.max_amount.map_or(true, |max| row.amount <= max)
    }
}

/// Structured multi-field search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub tx_type: Option<TransactionType>,
    pub is_fraud: Option<bool>,
    /// Inclusive `(min, max)` amount range.
    pub amount_range: Option<(f64, f64)>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
}

impl SearchCriteria {
    pub fn to_filter(&self) -> TransactionFilter {
        TransactionFilter {
            tx_type: self.tx_type,
            is_fraud: self.is_fraud,
            min_amount: self.amount_range.map(|(min, _)| min),
            max_amount: self.amount_range.map(|(_, max)| max),
        }
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.limit == Some(0) {
            return Err(DataError::InvalidParameter("limit must be >= 1".to_string()));
        }
        self.to_filter().validate()
    }
}
