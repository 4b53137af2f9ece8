pub mod api;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::Config;
pub use data::{DataAccessLayer, DataError, Dataset, InMemoryDal, LoadError};
pub use domain::{CustomerId, Step, Transaction, TransactionType};
pub use engine::{CustomerAggregator, FraudScoringEngine, StatisticsEngine};
pub use error::AppError;
