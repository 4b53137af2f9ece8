//! Columnar in-memory store of transactions plus its derived indexes.
//!
//! Rows are kept in source order; that order doubles as the recency proxy.
//! Three indexes are maintained alongside the columns:
//! - transaction id -> row position
//! - origin customer -> ordered row positions
//! - destination customer -> ordered row positions
//!
//! The store is never mutated in place while shared: the data layer builds the
//! next snapshot with [`Dataset::without`] and swaps it in.

use crate::domain::{CustomerId, Step, Transaction, TransactionType};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("duplicate transaction id '{0}'")]
    DuplicateId(String),
}

/// Borrowed view of a single row, used by scans so aggregations do not
/// materialize owned transactions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionView<'a> {
    pub id: &'a str,
    pub step: Step,
    pub tx_type: TransactionType,
    pub amount: f64,
    pub origin_customer_id: &'a CustomerId,
    pub dest_customer_id: &'a CustomerId,
    pub old_balance_origin: f64,
    pub new_balance_origin: f64,
    pub old_balance_dest: f64,
    pub new_balance_dest: f64,
    pub is_fraud: bool,
    pub is_flagged_fraud: bool,
}

impl TransactionView<'_> {
    pub fn to_transaction(&self) -> Transaction {
        Transaction {
            id: self.id.to_string(),
            step: self.step,
            tx_type: self.tx_type,
            amount: self.amount,
            origin_customer_id: self.origin_customer_id.clone(),
            dest_customer_id: self.dest_customer_id.clone(),
            old_balance_origin: self.old_balance_origin,
            new_balance_origin: self.new_balance_origin,
            old_balance_dest: self.old_balance_dest,
            new_balance_dest: self.new_balance_dest,
            is_fraud: self.is_fraud,
            is_flagged_fraud: self.is_flagged_fraud,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    ids: Vec<String>,
    steps: Vec<Step>,
    types: Vec<TransactionType>,
    amounts: Vec<f64>,
    origins: Vec<CustomerId>,
    dests: Vec<CustomerId>,
    old_balance_origin: Vec<f64>,
    new_balance_origin: Vec<f64>,
    old_balance_dest: Vec<f64>,
    new_balance_dest: Vec<f64>,
    is_fraud: Vec<bool>,
    is_flagged_fraud: Vec<bool>,

    by_id: HashMap<String, usize>,
    by_origin: HashMap<CustomerId, Vec<usize>>,
    by_dest: HashMap<CustomerId, Vec<usize>>,
    /// Distinct origin customers in first-occurrence order.
    origin_order: Vec<CustomerId>,
    /// Distinct transaction types in first-occurrence order.
    type_order: Vec<TransactionType>,

    /// Bumped on every mutation; caches compare against it.
    version: u64,
}

impl Dataset {
    /// Build a dataset from already-typed rows, keeping their order.
    pub fn from_transactions(
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> Result<Self, DatasetError> {
        let mut dataset = Dataset::default();
        for tx in transactions {
            dataset.push(tx)?;
        }
        Ok(dataset)
    }

    /// Append a row, updating every index in the same step.
    pub fn push(&mut self, tx: Transaction) -> Result<(), DatasetError> {
        if self.by_id.contains_key(&tx.id) {
            return Err(DatasetError::DuplicateId(tx.id));
        }

        self.append(tx);
        Ok(())
    }

    fn append(&mut self, tx: Transaction) {
        let pos = self.ids.len();
        self.index_row(pos, &tx.id, &tx.origin_customer_id, &tx.dest_customer_id, tx.tx_type);

        self.ids.push(tx.id);
        self.steps.push(tx.step);
        self.types.push(tx.tx_type);
        self.amounts.push(tx.amount);
        self.origins.push(tx.origin_customer_id);
        self.dests.push(tx.dest_customer_id);
        self.old_balance_origin.push(tx.old_balance_origin);
        self.new_balance_origin.push(tx.new_balance_origin);
        self.old_balance_dest.push(tx.old_balance_dest);
        self.new_balance_dest.push(tx.new_balance_dest);
        self.is_fraud.push(tx.is_fraud);
        self.is_flagged_fraud.push(tx.is_flagged_fraud);
    }

    fn index_row(
        &mut self,
        pos: usize,
        id: &str,
        origin: &CustomerId,
        dest: &CustomerId,
        tx_type: TransactionType,
    ) {
        self.by_id.insert(id.to_string(), pos);

        match self.by_origin.get_mut(origin) {
            Some(positions) => positions.push(pos),
            None => {
                self.by_origin.insert(origin.clone(), vec![pos]);
                self.origin_order.push(origin.clone());
            }
        }

        match self.by_dest.get_mut(dest) {
            Some(positions) => positions.push(pos),
            None => {
                self.by_dest.insert(dest.clone(), vec![pos]);
            }
        }

        if !self.type_order.contains(&tx_type) {
            self.type_order.push(tx_type);
        }
    }

    /// Copy of this dataset without the row `id`, with columns and indexes
    /// built in a single pass. `None` when `id` is absent.
    pub fn without(&self, id: &str) -> Option<Dataset> {
        let skip = self.position(id)?;
        let mut next = Dataset {
            version: self.version + 1,
            ..Default::default()
        };
        for (pos, row) in self.iter().enumerate() {
            if pos != skip {
                next.append(row.to_transaction());
            }
        }
        Some(next)
    }

    /// Remove the row with `id` in place.
    pub fn remove(&mut self, id: &str) -> Option<Transaction> {
        let pos = self.position(id)?;
        let removed = self.row(pos);
        *self = self.without(id)?;
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Borrow the row at `pos`.
    ///
    /// # Panics
    /// Panics if `pos` is out of bounds.
    pub fn view(&self, pos: usize) -> TransactionView<'_> {
        TransactionView {
            id: &self.ids[pos],
            step: self.steps[pos],
            tx_type: self.types[pos],
            amount: self.amounts[pos],
            origin_customer_id: &self.origins[pos],
            dest_customer_id: &self.dests[pos],
            old_balance_origin: self.old_balance_origin[pos],
            new_balance_origin: self.new_balance_origin[pos],
            old_balance_dest: self.old_balance_dest[pos],
            new_balance_dest: self.new_balance_dest[pos],
            is_fraud: self.is_fraud[pos],
            is_flagged_fraud: self.is_flagged_fraud[pos],
        }
    }

    pub fn row(&self, pos: usize) -> Transaction {
        self.view(pos).to_transaction()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = TransactionView<'_>> + '_ {
        (0..self.len()).map(move |pos| self.view(pos))
    }

    pub fn origin_positions(&self, customer_id: &str) -> &[usize] {
        self.by_origin
            .get(customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn dest_positions(&self, customer_id: &str) -> &[usize] {
        self.by_dest
            .get(customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn origin_customers(&self) -> &[CustomerId] {
        &self.origin_order
    }

    pub fn types_in_order(&self) -> &[TransactionType] {
        &self.type_order
    }
}
