//! Domain types for the transaction ledger.
//!
//! This module provides:
//! - Domain primitives: Step, CustomerId, TransactionType
//! - The Transaction record and its synthetic id scheme

pub mod primitives;
pub mod transaction;

pub use primitives::{CustomerId, Step, TransactionType, UnknownTransactionType};
pub use transaction::{synthetic_id, Transaction};
