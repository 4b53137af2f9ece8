//! Computation engines over the data access layer.
//!
//! Engines never touch the dataset directly; every read goes through
//! [`DataAccessLayer`](crate::data::DataAccessLayer).

pub mod customers;
pub mod fraud;
pub mod stats;

pub use customers::{CustomerAggregator, CustomerProfile, TopCustomer};
pub use fraud::{BalanceCheck, FraudAssessment, FraudCandidate, FraudScoringEngine};
pub use stats::{
    AmountDistribution, FraudSummary, PrecomputedStats, StatisticsEngine, StepStats, TypeFraudStats,
    TypeStats, DEFAULT_BIN_EDGES,
};
