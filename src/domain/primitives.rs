//! Domain primitives: Step, CustomerId, TransactionType.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Simulation time unit (one step is one hour).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Step(pub u32);

impl Step {
    pub fn new(step: u32) -> Self {
        Step(step)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Absolute distance between two steps.
    pub fn distance(&self, other: Step) -> u32 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Customer identifier as found in `nameOrig` / `nameDest`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        CustomerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CustomerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of transaction kinds present in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    Transfer,
    CashOut,
    CashIn,
    Debit,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        TransactionType::Payment,
        TransactionType::Transfer,
        TransactionType::CashOut,
        TransactionType::CashIn,
        TransactionType::Debit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "PAYMENT",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::CashOut => "CASH_OUT",
            TransactionType::CashIn => "CASH_IN",
            TransactionType::Debit => "DEBIT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transaction type '{0}'")]
pub struct UnknownTransactionType(pub String);

impl FromStr for TransactionType {
    type Err = UnknownTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| UnknownTransactionType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_parse_roundtrip() {
        for t in TransactionType::ALL {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
        }
    }

    #[test]
    fn test_transaction_type_rejects_unknown() {
        let err = "WIRE".parse::<TransactionType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown transaction type 'WIRE'");
        assert!("payment".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_transaction_type_serialization() {
        let json = serde_json::to_string(&TransactionType::CashOut).unwrap();
        assert_eq!(json, "\"CASH_OUT\"");
    }

    #[test]
    fn test_step_distance() {
        assert_eq!(Step::new(3).distance(Step::new(5)), 2);
        assert_eq!(Step::new(5).distance(Step::new(3)), 2);
        assert_eq!(Step::new(4).distance(Step::new(4)), 0);
    }

    #[test]
    fn test_customer_id_display() {
        let id = CustomerId::new("C1231006815");
        assert_eq!(id.to_string(), "C1231006815");
    }
}
