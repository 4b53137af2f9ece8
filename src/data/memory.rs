//! In-memory data access layer over a shared [`Dataset`] snapshot.

use super::{
    validate_page, DataAccessLayer, DataError, Dataset, MutationListener, Page, SearchCriteria,
    TransactionFilter, TransactionView,
};
use crate::domain::{CustomerId, Transaction, TransactionType};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// Data access layer backed by the columnar in-memory store.
///
/// Readers clone the current `Arc<Dataset>` under a short read lock and then
/// work lock-free on that snapshot. `delete` builds a new snapshot under the
/// writer mutex and swaps it in, so a reader that starts after a delete
/// returns never sees the removed row.
#[derive(Debug)]
pub struct InMemoryDal {
    snapshot: RwLock<Arc<Dataset>>,
    writer: Mutex<()>,
    listeners: RwLock<Vec<Weak<dyn MutationListener>>>,
    test_mode: bool,
}

impl InMemoryDal {
    pub fn new(dataset: Dataset, test_mode: bool) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(dataset)),
            writer: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            test_mode,
        }
    }

    /// Current snapshot of the store.
    pub fn snapshot(&self) -> Arc<Dataset> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn collect(dataset: &Dataset, positions: &[usize]) -> Vec<Transaction> {
        positions.iter().map(|&pos| dataset.row(pos)).collect()
    }

    fn notify_listeners(&self) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|weak| match weak.upgrade() {
            Some(listener) => {
                listener.invalidate();
                true
            }
            None => false,
        });
    }
}

impl DataAccessLayer for InMemoryDal {
    fn get_by_id(&self, id: &str) -> Result<Transaction, DataError> {
        let dataset = self.snapshot();
        dataset
            .position(id)
            .map(|pos| dataset.row(pos))
            .ok_or_else(|| DataError::NotFound(format!("Transaction '{}'", id)))
    }

    fn paginate(
        &self,
        page: usize,
        limit: usize,
        filter: &TransactionFilter,
    ) -> Result<Page<Transaction>, DataError> {
        validate_page(page, limit)?;
        filter.validate()?;

        let dataset = self.snapshot();
        let offset = Page::<Transaction>::offset(page, limit);
        let mut items = Vec::with_capacity(limit.min(dataset.len()));
        let mut total = 0usize;

        for row in dataset.iter().filter(|row| filter.matches(row)) {
            if total >= offset && items.len() < limit {
                items.push(row.to_transaction());
            }
            total += 1;
        }

        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Transaction>, DataError> {
        criteria.validate()?;
        let filter = criteria.to_filter();
        let dataset = self.snapshot();

        Ok(dataset
            .iter()
            .filter(|row| filter.matches(row))
            .take(criteria.limit.unwrap_or(usize::MAX))
            .map(|row| row.to_transaction())
            .collect())
    }

    fn distinct_types(&self) -> Vec<TransactionType> {
        self.snapshot().types_in_order().to_vec()
    }

    fn recent(&self, n: usize) -> Result<Vec<Transaction>, DataError> {
        if n < 1 {
            return Err(DataError::InvalidParameter("n must be >= 1".to_string()));
        }
        let dataset = self.snapshot();
        Ok(dataset
            .iter()
            .rev()
            .take(n)
            .map(|row| row.to_transaction())
            .collect())
    }

    fn by_origin(&self, customer_id: &str) -> Vec<Transaction> {
        let dataset = self.snapshot();
        Self::collect(&dataset, dataset.origin_positions(customer_id))
    }

    fn by_dest(&self, customer_id: &str) -> Vec<Transaction> {
        let dataset = self.snapshot();
        Self::collect(&dataset, dataset.dest_positions(customer_id))
    }

    fn origin_customers(&self, page: usize, limit: usize) -> Result<Page<CustomerId>, DataError> {
        validate_page(page, limit)?;
        let dataset = self.snapshot();
        let customers = dataset.origin_customers();
        let items = customers
            .iter()
            .skip(Page::<CustomerId>::offset(page, limit))
            .take(limit)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total: customers.len(),
            page,
            limit,
        })
    }

    fn delete(&self, id: &str) -> Result<bool, DataError> {
        if !self.test_mode {
            tracing::warn!(id, "Rejected delete outside test mode");
            return Err(DataError::Forbidden(
                "DELETE operations are only allowed in test mode".to_string(),
            ));
        }

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let next = self
            .snapshot()
            .without(id)
            .ok_or_else(|| DataError::NotFound(format!("Transaction '{}'", id)))?;
        let version = next.version();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

        self.notify_listeners();
        tracing::info!(id, version, "Deleted transaction");
        Ok(true)
    }

    fn scan(&self, visit: &mut dyn FnMut(TransactionView<'_>)) -> u64 {
        let dataset = self.snapshot();
        for row in dataset.iter() {
            visit(row);
        }
        dataset.version()
    }

    fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn version(&self) -> u64 {
        self.snapshot().version()
    }

    fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    fn register_listener(&self, listener: Weak<dyn MutationListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}
