//! Rule-based fraud scoring.
//!
//! Scores a candidate transaction against a fixed, ordered rule set. Each
//! satisfied rule adds its weight; a total above [`FRAUD_THRESHOLD`] is a
//! fraud decision. Only the rapid-transaction rule looks at stored history.

use super::stats::{FraudSummary, StatisticsEngine, TypeFraudStats};
use crate::data::{DataAccessLayer, DataError};
use crate::domain::{CustomerId, Step, Transaction, TransactionType};
use serde::Serialize;
use std::sync::Arc;

pub const FRAUD_THRESHOLD: f64 = 0.5;
pub const HIGH_AMOUNT_THRESHOLD: f64 = 100_000.0;
/// Steps are hours; history within this many steps is "rapid".
pub const RAPID_STEP_GAP: u32 = 1;

/// A transaction to score. It does not have to exist in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FraudCandidate {
    pub tx_type: TransactionType,
    pub amount: f64,
    pub old_balance_origin: f64,
    pub new_balance_origin: f64,
    pub origin_customer_id: Option<CustomerId>,
    pub step: Option<Step>,
}

impl FraudCandidate {
    pub fn validate(&self) -> Result<(), DataError> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(DataError::InvalidParameter(
                "amount must be a non-negative number".to_string(),
            ));
        }
        if !self.old_balance_origin.is_finite() || !self.new_balance_origin.is_finite() {
            return Err(DataError::InvalidParameter(
                "balances must be finite numbers".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&Transaction> for FraudCandidate {
    fn from(tx: &Transaction) -> Self {
        Self {
            tx_type: tx.tx_type,
            amount: tx.amount,
            old_balance_origin: tx.old_balance_origin,
            new_balance_origin: tx.new_balance_origin,
            origin_customer_id: Some(tx.origin_customer_id.clone()),
            step: Some(tx.step),
        }
    }
}

/// How the balance-inconsistency rule compares expected and reported balances.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BalanceCheck {
    /// `old - amount != new`, compared exactly.
    #[default]
    Exact,
    /// Inconsistent only when the difference exceeds the tolerance.
    Tolerance(f64),
}

impl BalanceCheck {
    fn is_inconsistent(&self, expected: f64, reported: f64) -> bool {
        match *self {
            BalanceCheck::Exact => expected != reported,
            BalanceCheck::Tolerance(tol) => (expected - reported).abs() > tol,
        }
    }
}

/// Inputs one rule evaluation may read.
pub struct RuleContext<'a> {
    pub candidate: &'a FraudCandidate,
    pub balance_check: BalanceCheck,
    /// Steps of the origin customer's stored transactions.
    pub history_steps: &'a [Step],
}

pub struct FraudRule {
    pub name: &'static str,
    pub weight: f64,
    pub predicate: fn(&RuleContext<'_>) -> bool,
}

impl std::fmt::Debug for FraudRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FraudRule")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish()
    }
}

pub const RULES: [FraudRule; 4] = [
    FraudRule {
        name: "Balance Inconsistency",
        weight: 0.3,
        predicate: balance_inconsistency,
    },
    FraudRule {
        name: "Risky Transaction Type",
        weight: 0.3,
        predicate: risky_type,
    },
    FraudRule {
        name: "High Amount",
        weight: 0.4,
        predicate: high_amount,
    },
    FraudRule {
        name: "Rapid Transactions",
        weight: 0.3,
        predicate: rapid_transactions,
    },
];

fn balance_inconsistency(ctx: &RuleContext<'_>) -> bool {
    let c = ctx.candidate;
    ctx.balance_check
        .is_inconsistent(c.old_balance_origin - c.amount, c.new_balance_origin)
}

fn risky_type(ctx: &RuleContext<'_>) -> bool {
    matches!(
        ctx.candidate.tx_type,
        TransactionType::CashOut | TransactionType::Transfer
    )
}

fn high_amount(ctx: &RuleContext<'_>) -> bool {
    ctx.candidate.amount > HIGH_AMOUNT_THRESHOLD
}

// Same-step rows are skipped: the candidate itself may already be stored.
fn rapid_transactions(ctx: &RuleContext<'_>) -> bool {
    let Some(step) = ctx.candidate.step else {
        return false;
    };
    ctx.history_steps.iter().any(|s| {
        let gap = s.distance(step);
        gap != 0 && gap <= RAPID_STEP_GAP
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FraudAssessment {
    pub is_fraud: bool,
    /// Score rounded to two decimals. Not clamped to 1.0.
    pub probability: f64,
    /// Unrounded score the decision was made on.
    pub score: f64,
    pub triggered: Vec<&'static str>,
}

/// Scores candidates against [`RULES`] and exposes label-based fraud aggregates.
#[derive(Debug)]
pub struct FraudScoringEngine {
    dal: Arc<dyn DataAccessLayer>,
    stats: Arc<StatisticsEngine>,
    balance_check: BalanceCheck,
}

impl FraudScoringEngine {
    pub fn new(dal: Arc<dyn DataAccessLayer>, stats: Arc<StatisticsEngine>) -> Self {
        Self {
            dal,
            stats,
            balance_check: BalanceCheck::Exact,
        }
    }

    pub fn with_balance_check(mut self, balance_check: BalanceCheck) -> Self {
        self.balance_check = balance_check;
        self
    }

    pub fn balance_check(&self) -> BalanceCheck {
        self.balance_check
    }

    /// Score `candidate`. Never mutates the store.
    pub fn predict(&self, candidate: &FraudCandidate) -> Result<FraudAssessment, DataError> {
        candidate.validate()?;

        let history_steps: Vec<Step> = match (&candidate.origin_customer_id, candidate.step) {
            (Some(origin), Some(_)) => self
                .dal
                .by_origin(origin.as_str())
                .iter()
                .map(|tx| tx.step)
                .collect(),
            _ => Vec::new(),
        };

        let ctx = RuleContext {
            candidate,
            balance_check: self.balance_check,
            history_steps: &history_steps,
        };

        let mut score = 0.0;
        let mut triggered = Vec::new();
        for rule in RULES.iter() {
            if (rule.predicate)(&ctx) {
                score += rule.weight;
                triggered.push(rule.name);
            }
        }

        let is_fraud = score > FRAUD_THRESHOLD;
        tracing::debug!(
            tx_type = %candidate.tx_type,
            amount = candidate.amount,
            score,
            is_fraud,
            triggered = ?triggered,
            "Scored fraud candidate"
        );

        Ok(FraudAssessment {
            is_fraud,
            probability: (score * 100.0).round() / 100.0,
            score,
            triggered,
        })
    }

    /// Label-based fraud rate per type, in first-occurrence order.
    pub fn fraud_rate_by_type(&self) -> Vec<TypeFraudStats> {
        self.stats.fraud_by_type()
    }

    pub fn summary(&self) -> FraudSummary {
        self.stats.fraud_summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, InMemoryDal};

    fn stored(i: usize, origin: &str, step: u32) -> Transaction {
        Transaction {
            id: crate::domain::synthetic_id(i),
            step: Step::new(step),
            tx_type: TransactionType::Payment,
            amount: 10.0,
            origin_customer_id: CustomerId::new(origin),
            dest_customer_id: CustomerId::new("M1"),
            old_balance_origin: 100.0,
            new_balance_origin: 90.0,
            old_balance_dest: 0.0,
            new_balance_dest: 0.0,
            is_fraud: i % 2 == 0,
            is_flagged_fraud: false,
        }
    }

    fn engine(rows: Vec<Transaction>) -> FraudScoringEngine {
        let dal: Arc<dyn DataAccessLayer> = Arc::new(InMemoryDal::new(
            Dataset::from_transactions(rows).unwrap(),
            false,
        ));
        let stats = StatisticsEngine::new(dal.clone());
        FraudScoringEngine::new(dal, stats)
    }

    fn candidate(tx_type: TransactionType, amount: f64, old: f64, new: f64) -> FraudCandidate {
        FraudCandidate {
            tx_type,
            amount,
            old_balance_origin: old,
            new_balance_origin: new,
            origin_customer_id: None,
            step: None,
        }
    }

    #[test]
    fn test_high_amount_transfer_is_fraud() {
        let engine = engine(Vec::new());
        let result = engine
            .predict(&candidate(TransactionType::Transfer, 150000.0, 200000.0, 50000.0))
            .unwrap();
        assert!(result.is_fraud);
        assert!((result.probability - 0.7).abs() < 1e-9);
        assert_eq!(result.triggered, vec!["Risky Transaction Type", "High Amount"]);
    }

    #[test]
    fn test_consistent_payment_scores_zero() {
        let engine = engine(Vec::new());
        let result = engine
            .predict(&candidate(TransactionType::Payment, 100.0, 500.0, 400.0))
            .unwrap();
        assert!(!result.is_fraud);
        assert_eq!(result.score, 0.0);
        assert!(result.triggered.is_empty());
    }

    #[test]
    fn test_balance_inconsistency_exact_vs_tolerance() {
        // 0.1 + 0.2 style rounding: expected 0.30000000000000004 vs reported 0.3.
        let c = candidate(TransactionType::Payment, 0.1, 0.4, 0.3);
        let exact = engine(Vec::new());
        assert_eq!(
            exact.predict(&c).unwrap().triggered,
            vec!["Balance Inconsistency"]
        );

        let tolerant = engine(Vec::new()).with_balance_check(BalanceCheck::Tolerance(0.01));
        assert!(tolerant.predict(&c).unwrap().triggered.is_empty());

        let off = candidate(TransactionType::Payment, 100.0, 500.0, 350.0);
        assert_eq!(
            tolerant.predict(&off).unwrap().triggered,
            vec!["Balance Inconsistency"]
        );
    }

    #[test]
    fn test_score_is_not_clamped() {
        let engine = engine(vec![stored(0, "C1", 5)]);
        let mut c = candidate(TransactionType::CashOut, 500000.0, 0.0, 0.0);
        c.origin_customer_id = Some(CustomerId::new("C1"));
        c.step = Some(Step::new(6));
        let result = engine.predict(&c).unwrap();
        assert_eq!(result.triggered.len(), 4);
        assert!((result.score - 1.3).abs() < 1e-9);
        assert!((result.probability - 1.3).abs() < 1e-9);
        assert!(result.is_fraud);
    }

    #[test]
    fn test_rapid_rule_needs_neighbouring_step() {
        let engine = engine(vec![stored(0, "C1", 10), stored(1, "C2", 11)]);
        let mut c = candidate(TransactionType::Payment, 10.0, 100.0, 90.0);
        c.origin_customer_id = Some(CustomerId::new("C1"));

        c.step = Some(Step::new(10));
        assert!(engine.predict(&c).unwrap().triggered.is_empty());

        c.step = Some(Step::new(11));
        assert_eq!(engine.predict(&c).unwrap().triggered, vec!["Rapid Transactions"]);

        c.step = Some(Step::new(9));
        assert_eq!(engine.predict(&c).unwrap().triggered, vec!["Rapid Transactions"]);

        c.step = Some(Step::new(12));
        assert!(engine.predict(&c).unwrap().triggered.is_empty());

        c.step = None;
        assert!(engine.predict(&c).unwrap().triggered.is_empty());
    }

    #[test]
    fn test_predict_is_deterministic() {
        let engine = engine(vec![stored(0, "C1", 1), stored(1, "C1", 2)]);
        let mut c = candidate(TransactionType::Transfer, 250000.0, 1000.0, 0.0);
        c.origin_customer_id = Some(CustomerId::new("C1"));
        c.step = Some(Step::new(2));
        let first = engine.predict(&c).unwrap();
        let second = engine.predict(&c).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_predict_rejects_invalid_amounts() {
        let engine = engine(Vec::new());
        assert!(engine
            .predict(&candidate(TransactionType::Payment, -1.0, 0.0, 0.0))
            .is_err());
        assert!(engine
            .predict(&candidate(TransactionType::Payment, f64::NAN, 0.0, 0.0))
            .is_err());
        assert!(engine
            .predict(&candidate(TransactionType::Payment, 1.0, f64::INFINITY, 0.0))
            .is_err());
    }

    #[test]
    fn test_fraud_rate_by_type_uses_labels() {
        let engine = engine(vec![stored(0, "C1", 1), stored(1, "C2", 1), stored(2, "C3", 1)]);
        let rates = engine.fraud_rate_by_type();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].tx_type, TransactionType::Payment);
        assert_eq!(rates[0].total, 3);
        assert_eq!(rates[0].fraud_count, 2);
    }
}
