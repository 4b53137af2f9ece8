//! Per-customer rollups over the origin index.
//!
//! Profiles read one customer's rows; `top` aggregates the whole store in a
//! single scan and ranks deterministically.

use crate::data::{validate_page, DataAccessLayer, DataError, Page};
use crate::domain::CustomerId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerProfile {
    pub id: CustomerId,
    pub transactions_count: u64,
    pub avg_amount: f64,
    /// True when any outgoing transaction carries the fraud label.
    pub fraudulent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCustomer {
    pub id: CustomerId,
    pub transactions_count: u64,
    pub total_amount: f64,
    pub avg_amount: f64,
}

/// Per-customer views derived from the origin index.
#[derive(Debug)]
pub struct CustomerAggregator {
    dal: Arc<dyn DataAccessLayer>,
}

impl CustomerAggregator {
    pub fn new(dal: Arc<dyn DataAccessLayer>) -> Self {
        Self { dal }
    }

    /// Profile of a customer that appears as an origin at least once.
    pub fn profile(&self, customer_id: &str) -> Result<CustomerProfile, DataError> {
        let rows = self.dal.by_origin(customer_id);
        if rows.is_empty() {
            return Err(DataError::NotFound(format!("Customer '{}'", customer_id)));
        }

        let count = rows.len() as u64;
        let total: f64 = rows.iter().map(|tx| tx.amount).sum();
        Ok(CustomerProfile {
            id: CustomerId::new(customer_id),
            transactions_count: count,
            avg_amount: total / count as f64,
            fraudulent: rows.iter().any(|tx| tx.is_fraud),
        })
    }

    /// The `n` origin customers with the highest outgoing volume.
    ///
    /// Ties on volume are broken by ascending id. Full pass over the store.
    pub fn top(&self, n: usize) -> Result<Vec<TopCustomer>, DataError> {
        if n < 1 {
            return Err(DataError::InvalidParameter("n must be >= 1".to_string()));
        }

        let mut totals: HashMap<CustomerId, (u64, f64)> = HashMap::new();
        self.dal.scan(&mut |row| {
            let entry = totals
                .entry(row.origin_customer_id.clone())
                .or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += row.amount;
        });

        let mut ranked: Vec<TopCustomer> = totals
            .into_iter()
            .map(|(id, (count, total))| TopCustomer {
                id,
                transactions_count: count,
                total_amount: total,
                avg_amount: total / count as f64,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.total_amount
                .total_cmp(&a.total_amount)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Distinct origin customer ids in first-occurrence order.
    pub fn list(&self, page: usize, limit: usize) -> Result<Page<CustomerId>, DataError> {
        validate_page(page, limit)?;
        self.dal.origin_customers(page, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, InMemoryDal};
    use crate::domain::{Step, Transaction, TransactionType};

    fn tx(i: usize, origin: &str, amount: f64, is_fraud: bool) -> Transaction {
        Transaction {
            id: crate::domain::synthetic_id(i),
            step: Step::new(1),
            tx_type: TransactionType::Payment,
            amount,
            origin_customer_id: CustomerId::new(origin),
            dest_customer_id: CustomerId::new("M1"),
            old_balance_origin: 0.0,
            new_balance_origin: 0.0,
            old_balance_dest: 0.0,
            new_balance_dest: 0.0,
            is_fraud,
            is_flagged_fraud: false,
        }
    }

    fn aggregator(rows: Vec<Transaction>) -> CustomerAggregator {
        let dal = Arc::new(InMemoryDal::new(
            Dataset::from_transactions(rows).unwrap(),
            false,
        ));
        CustomerAggregator::new(dal)
    }

    fn sample() -> CustomerAggregator {
        aggregator(vec![
            tx(0, "C3", 100.0, false),
            tx(1, "C1", 300.0, false),
            tx(2, "C3", 200.0, true),
            tx(3, "C2", 300.0, false),
            tx(4, "C4", 5.0, false),
        ])
    }

    #[test]
    fn test_profile() {
        let agg = sample();
        let profile = agg.profile("C3").unwrap();
        assert_eq!(profile.id, CustomerId::new("C3"));
        assert_eq!(profile.transactions_count, 2);
        assert_eq!(profile.avg_amount, 150.0);
        assert!(profile.fraudulent);

        assert!(!agg.profile("C1").unwrap().fraudulent);
    }

    #[test]
    fn test_profile_unknown_or_dest_only_is_not_found() {
        let agg = sample();
        assert!(matches!(agg.profile("C999"), Err(DataError::NotFound(_))));
        assert!(matches!(agg.profile("M1"), Err(DataError::NotFound(_))));
    }

    #[test]
    fn test_top_ranks_by_volume_then_id() {
        let agg = sample();
        let top = agg.top(3).unwrap();
        let ids: Vec<&str> = top.iter().map(|c| c.id.as_str()).collect();
        // C1, C2 and C3 all total 300; ids break the tie.
        assert_eq!(ids, vec!["C1", "C2", "C3"]);
        assert_eq!(top[2].transactions_count, 2);
        assert_eq!(top[2].avg_amount, 150.0);
    }

    #[test]
    fn test_top_is_deterministic_and_clamped() {
        let agg = sample();
        assert_eq!(agg.top(10).unwrap(), agg.top(10).unwrap());
        assert_eq!(agg.top(10).unwrap().len(), 4);
        assert!(agg.top(0).is_err());
    }

    #[test]
    fn test_list_first_occurrence_order() {
        let agg = sample();
        let page = agg.list(1, 2).unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items, vec![CustomerId::new("C3"), CustomerId::new("C1")]);

        let page = agg.list(2, 2).unwrap();
        assert_eq!(page.items, vec![CustomerId::new("C2"), CustomerId::new("C4")]);

        assert!(agg.list(0, 2).is_err());
    }
}
