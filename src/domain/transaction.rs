//! Transaction record as held by the dataset.

use crate::domain::{CustomerId, Step, TransactionType};
use serde::{Deserialize, Serialize};

/// A single ledger row. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier, synthesized as `tx_NNNNNNN` when the source has none.
    pub id: String,
    pub step: Step,
    pub tx_type: TransactionType,
    pub amount: f64,
    pub origin_customer_id: CustomerId,
    pub dest_customer_id: CustomerId,
    pub old_balance_origin: f64,
    pub new_balance_origin: f64,
    pub old_balance_dest: f64,
    pub new_balance_dest: f64,
    /// Ground-truth fraud label.
    pub is_fraud: bool,
    /// Flag raised by the legacy rule system in the source data.
    pub is_flagged_fraud: bool,
}

/// Synthetic identifier for the row at `index` (zero based).
pub fn synthetic_id(index: usize) -> String {
    format!("tx_{:07}", index)
}
