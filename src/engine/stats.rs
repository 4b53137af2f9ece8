//! Precomputed aggregate statistics with explicit invalidation.

use crate::data::{DataAccessLayer, DataError, MutationListener, TransactionView};
use crate::domain::{Step, TransactionType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// Default histogram edges; the last edge opens the final `N+` bin.
pub const DEFAULT_BIN_EDGES: [f64; 8] = [0.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0, 50000.0, 100000.0];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeStats {
    pub tx_type: TransactionType,
    pub count: u64,
    pub avg_amount: f64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeFraudStats {
    pub tx_type: TransactionType,
    pub total: u64,
    pub fraud_count: u64,
    pub fraud_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepStats {
    pub step: Step,
    pub count: u64,
    pub avg_amount: f64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmountDistribution {
    pub bins: Vec<String>,
    pub counts: Vec<u64>,
}

/// Quality of the legacy `isFlaggedFraud` flag against the `isFraud` label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FraudSummary {
    pub total_frauds: u64,
    pub flagged: u64,
    pub precision: f64,
    pub recall: f64,
}

/// Everything derived from one full pass over the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecomputedStats {
    pub total_count: u64,
    pub fraud_count: u64,
    pub fraud_rate: f64,
    pub avg_amount: f64,
    /// Most frequent type; ties go to the type seen first. `None` when empty.
    pub most_common_type: Option<TransactionType>,
    pub by_type: Vec<TypeStats>,
    pub fraud_by_type: Vec<TypeFraudStats>,
    pub amount_distribution: AmountDistribution,
    pub daily: Vec<StepStats>,
    pub fraud_summary: FraudSummary,
}

#[derive(Default)]
struct TypeAcc {
    count: u64,
    total_amount: f64,
    fraud_count: u64,
}

#[derive(Default)]
struct StepAcc {
    count: u64,
    total_amount: f64,
}

/// Single-pass accumulator behind [`PrecomputedStats`].
struct StatsAccumulator<'e> {
    total_count: u64,
    fraud_count: u64,
    flagged: u64,
    flagged_and_fraud: u64,
    total_amount: f64,
    by_type: Vec<(TransactionType, TypeAcc)>,
    by_step: BTreeMap<Step, StepAcc>,
    histogram: Histogram<'e>,
}

impl<'e> StatsAccumulator<'e> {
    fn new(edges: &'e [f64]) -> Self {
        Self {
            total_count: 0,
            fraud_count: 0,
            flagged: 0,
            flagged_and_fraud: 0,
            total_amount: 0.0,
            by_type: Vec::with_capacity(TransactionType::ALL.len()),
            by_step: BTreeMap::new(),
            histogram: Histogram::new(edges),
        }
    }

    fn add(&mut self, row: TransactionView<'_>) {
        self.total_count += 1;
        self.total_amount += row.amount;
        if row.is_fraud {
            self.fraud_count += 1;
        }
        if row.is_flagged_fraud {
            self.flagged += 1;
            if row.is_fraud {
                self.flagged_and_fraud += 1;
            }
        }

        let slot = match self.by_type.iter().position(|(t, _)| *t == row.tx_type) {
            Some(idx) => idx,
            None => {
                self.by_type.push((row.tx_type, TypeAcc::default()));
                self.by_type.len() - 1
            }
        };
        let acc = &mut self.by_type[slot].1;
        acc.count += 1;
        acc.total_amount += row.amount;
        if row.is_fraud {
            acc.fraud_count += 1;
        }

        let step = self.by_step.entry(row.step).or_default();
        step.count += 1;
        step.total_amount += row.amount;

        self.histogram.add(row.amount);
    }

    fn finish(self) -> PrecomputedStats {
        let most_common_type = self
            .by_type
            .iter()
            .fold(None::<(TransactionType, u64)>, |best, (t, acc)| match best {
                Some((_, count)) if count >= acc.count => best,
                _ => Some((*t, acc.count)),
            })
            .map(|(t, _)| t);

        let by_type = self
            .by_type
            .iter()
            .map(|(t, acc)| TypeStats {
                tx_type: *t,
                count: acc.count,
                avg_amount: mean(acc.total_amount, acc.count),
                total_amount: acc.total_amount,
            })
            .collect();

        let fraud_by_type = self
            .by_type
            .iter()
            .map(|(t, acc)| TypeFraudStats {
                tx_type: *t,
                total: acc.count,
                fraud_count: acc.fraud_count,
                fraud_rate: ratio(acc.fraud_count, acc.count),
            })
            .collect();

        let daily = self
            .by_step
            .into_iter()
            .map(|(step, acc)| StepStats {
                step,
                count: acc.count,
                avg_amount: mean(acc.total_amount, acc.count),
                total_amount: acc.total_amount,
            })
            .collect();

        PrecomputedStats {
            total_count: self.total_count,
            fraud_count: self.fraud_count,
            fraud_rate: ratio(self.fraud_count, self.total_count),
            avg_amount: mean(self.total_amount, self.total_count),
            most_common_type,
            by_type,
            fraud_by_type,
            amount_distribution: self.histogram.finish(),
            daily,
            fraud_summary: FraudSummary {
                total_frauds: self.fraud_count,
                flagged: self.flagged,
                precision: ratio(self.flagged_and_fraud, self.flagged),
                recall: ratio(self.flagged_and_fraud, self.fraud_count),
            },
        }
    }
}

/// Histogram over `edges`: first bin `[e0, e1]`, then `(e_i, e_i+1]`, then `(e_last, inf)`.
struct Histogram<'e> {
    edges: &'e [f64],
    counts: Vec<u64>,
}

impl<'e> Histogram<'e> {
    fn new(edges: &'e [f64]) -> Self {
        Self {
            edges,
            counts: vec![0; edges.len()],
        }
    }

    fn bin_index(&self, amount: f64) -> Option<usize> {
        let idx = self.edges.partition_point(|edge| *edge < amount);
        match idx {
            0 if amount == self.edges[0] => Some(0),
            0 => None,
            i => Some(i - 1),
        }
    }

    fn add(&mut self, amount: f64) {
        if let Some(idx) = self.bin_index(amount) {
            self.counts[idx] += 1;
        }
    }

    fn finish(self) -> AmountDistribution {
        AmountDistribution {
            bins: bin_labels(self.edges),
            counts: self.counts,
        }
    }
}

fn bin_labels(edges: &[f64]) -> Vec<String> {
    let mut labels: Vec<String> = edges
        .windows(2)
        .map(|w| format!("{}-{}", format_edge(w[0]), format_edge(w[1])))
        .collect();
    if let Some(last) = edges.last() {
        labels.push(format!("{}+", format_edge(*last)));
    }
    labels
}

/// `1000 -> "1k"`, `500 -> "500"`, `2.5 -> "2.5"`.
fn format_edge(edge: f64) -> String {
    if edge >= 1000.0 && edge % 1000.0 == 0.0 {
        format!("{}k", edge / 1000.0)
    } else {
        format!("{}", edge)
    }
}

fn validate_edges(edges: &[f64]) -> Result<(), DataError> {
    if edges.is_empty() {
        return Err(DataError::InvalidParameter("bin edges must not be empty".to_string()));
    }
    if edges.iter().any(|e| !e.is_finite()) {
        return Err(DataError::InvalidParameter("bin edges must be finite".to_string()));
    }
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(DataError::InvalidParameter(
            "bin edges must be strictly increasing".to_string(),
        ));
    }
    // Amounts are non-negative; a first edge above zero would leave rows unbinned.
    if edges[0] > 0.0 {
        return Err(DataError::InvalidParameter(
            "first bin edge must be <= 0".to_string(),
        ));
    }
    Ok(())
}

fn mean(total: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

impl PrecomputedStats {
    /// One pass over the current snapshot. Returns the snapshot version with the stats.
    pub fn compute(dal: &dyn DataAccessLayer) -> (u64, PrecomputedStats) {
        let mut acc = StatsAccumulator::new(&DEFAULT_BIN_EDGES);
        let version = dal.scan(&mut |row| acc.add(row));
        (version, acc.finish())
    }
}

struct CachedStats {
    version: u64,
    stats: Arc<PrecomputedStats>,
}

/// Owns the precomputed statistics and keeps them consistent with the store.
///
/// Stats are computed eagerly on construction. A delete invalidates them
/// synchronously; the next read recomputes. A cached entry is only served
/// while its version matches the store's.
pub struct StatisticsEngine {
    dal: Arc<dyn DataAccessLayer>,
    cache: RwLock<Option<CachedStats>>,
    recompute: Mutex<()>,
}

impl StatisticsEngine {
    pub fn new(dal: Arc<dyn DataAccessLayer>) -> Arc<Self> {
        let engine = Arc::new(Self {
            dal: dal.clone(),
            cache: RwLock::new(None),
            recompute: Mutex::new(()),
        });
        let weak = Arc::downgrade(&engine);
        let listener: Weak<dyn MutationListener> = weak;
        dal.register_listener(listener);
        engine.snapshot();
        engine
    }

    /// Current stats, recomputing if the cache is empty or stale.
    pub fn snapshot(&self) -> Arc<PrecomputedStats> {
        if let Some(stats) = self.cached() {
            return stats;
        }

        let _guard = self.recompute.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stats) = self.cached() {
            return stats;
        }

        let started = std::time::Instant::now();
        let (version, stats) = PrecomputedStats::compute(self.dal.as_ref());
        let stats = Arc::new(stats);
        tracing::info!(
            version,
            rows = stats.total_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Statistics precomputed"
        );

        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(CachedStats {
            version,
            stats: stats.clone(),
        });
        stats
    }

    fn cached(&self) -> Option<Arc<PrecomputedStats>> {
        let current = self.dal.version();
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|c| c.version == current)
            .map(|c| c.stats.clone())
    }

    pub fn overview(&self) -> Arc<PrecomputedStats> {
        self.snapshot()
    }

    pub fn by_type(&self) -> Vec<TypeStats> {
        self.snapshot().by_type.clone()
    }

    /// Histogram over `bin_edges`, or the precomputed default histogram when `None`.
    pub fn amount_distribution(
        &self,
        bin_edges: Option<&[f64]>,
    ) -> Result<AmountDistribution, DataError> {
        match bin_edges {
            None => Ok(self.snapshot().amount_distribution.clone()),
            Some(edges) if edges == DEFAULT_BIN_EDGES.as_slice() => {
                Ok(self.snapshot().amount_distribution.clone())
            }
            Some(edges) => {
                validate_edges(edges)?;
                let mut histogram = Histogram::new(edges);
                self.dal.scan(&mut |row| histogram.add(row.amount));
                Ok(histogram.finish())
            }
        }
    }

    pub fn daily(&self) -> Vec<StepStats> {
        self.snapshot().daily.clone()
    }

    pub fn fraud_by_type(&self) -> Vec<TypeFraudStats> {
        self.snapshot().fraud_by_type.clone()
    }

    pub fn fraud_summary(&self) -> FraudSummary {
        self.snapshot().fraud_summary.clone()
    }

    /// Drop the cached stats. Waits for an in-flight recompute to finish first.
    pub fn invalidate(&self) {
        let _guard = self.recompute.lock().unwrap_or_else(PoisonError::into_inner);
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!("Statistics invalidated");
    }
}

impl MutationListener for StatisticsEngine {
    fn invalidate(&self) {
        StatisticsEngine::invalidate(self);
    }
}

impl std::fmt::Debug for StatisticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsEngine")
            .field("dal", &self.dal)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, InMemoryDal};
    use crate::domain::{CustomerId, Transaction};

    fn tx(i: usize, step: u32, tx_type: TransactionType, amount: f64, is_fraud: bool, flagged: bool) -> Transaction {
        Transaction {
            id: crate::domain::synthetic_id(i),
            step: Step::new(step),
            tx_type,
            amount,
            origin_customer_id: CustomerId::new(format!("C{}", i)),
            dest_customer_id: CustomerId::new("M1"),
            old_balance_origin: 0.0,
            new_balance_origin: 0.0,
            old_balance_dest: 0.0,
            new_balance_dest: 0.0,
            is_fraud,
            is_flagged_fraud: flagged,
        }
    }

    fn engine_over(rows: Vec<Transaction>, test_mode: bool) -> (Arc<InMemoryDal>, Arc<StatisticsEngine>) {
        let dal = Arc::new(InMemoryDal::new(
            Dataset::from_transactions(rows).unwrap(),
            test_mode,
        ));
        let engine = StatisticsEngine::new(dal.clone());
        (dal, engine)
    }

    fn sample_rows() -> Vec<Transaction> {
        vec![
            tx(0, 1, TransactionType::Payment, 50.0, false, false),
            tx(1, 1, TransactionType::Payment, 150.0, false, false),
            tx(2, 2, TransactionType::Transfer, 200000.0, true, true),
            tx(3, 3, TransactionType::CashOut, 1000.0, true, false),
            tx(4, 3, TransactionType::Transfer, 0.0, false, true),
        ]
    }

    #[test]
    fn test_overview() {
        let (_dal, engine) = engine_over(sample_rows(), false);
        let stats = engine.overview();
        assert_eq!(stats.total_count, 5);
        assert_eq!(stats.fraud_count, 2);
        assert_eq!(stats.fraud_rate, 2.0 / 5.0);
        assert_eq!(stats.avg_amount, 201200.0 / 5.0);
        assert_eq!(stats.most_common_type, Some(TransactionType::Payment));
    }

    #[test]
    fn test_most_common_type_tie_goes_to_first_seen() {
        let rows = vec![
            tx(0, 1, TransactionType::Debit, 1.0, false, false),
            tx(1, 1, TransactionType::CashIn, 1.0, false, false),
            tx(2, 1, TransactionType::CashIn, 1.0, false, false),
            tx(3, 1, TransactionType::Debit, 1.0, false, false),
        ];
        let (_dal, engine) = engine_over(rows, false);
        assert_eq!(engine.overview().most_common_type, Some(TransactionType::Debit));
    }

    #[test]
    fn test_by_type_first_occurrence_order_and_counts_sum() {
        let rows = vec![
            tx(0, 1, TransactionType::Payment, 10.0, false, false),
            tx(1, 1, TransactionType::Payment, 30.0, false, false),
            tx(2, 1, TransactionType::Transfer, 5.0, false, false),
        ];
        let (_dal, engine) = engine_over(rows, false);
        let by_type = engine.by_type();
        assert_eq!(by_type.len(), 2);
        assert_eq!(by_type[0].tx_type, TransactionType::Payment);
        assert_eq!(by_type[0].count, 2);
        assert_eq!(by_type[0].avg_amount, 20.0);
        assert_eq!(by_type[1].tx_type, TransactionType::Transfer);
        assert_eq!(by_type[1].count, 1);

        let sum: u64 = by_type.iter().map(|t| t.count).sum();
        assert_eq!(sum, engine.overview().total_count);
    }

    #[test]
    fn test_amount_distribution_default_bins() {
        let (_dal, engine) = engine_over(sample_rows(), false);
        let dist = engine.amount_distribution(None).unwrap();
        assert_eq!(
            dist.bins,
            vec!["0-100", "100-500", "500-1k", "1k-5k", "5k-10k", "10k-50k", "50k-100k", "100k+"]
        );
        // 0 and 50 land in the closed first bin, 1000 is the upper edge of 500-1k.
        assert_eq!(dist.counts, vec![2, 1, 1, 0, 0, 0, 0, 1]);
        assert_eq!(dist.counts.iter().sum::<u64>(), 5);
    }

    #[test]
    fn test_amount_distribution_custom_edges() {
        let (_dal, engine) = engine_over(sample_rows(), false);
        let dist = engine.amount_distribution(Some(&[0.0, 1000.0])).unwrap();
        assert_eq!(dist.bins, vec!["0-1k", "1k+"]);
        assert_eq!(dist.counts, vec![4, 1]);

        assert!(engine.amount_distribution(Some(&[])).is_err());
        assert!(engine.amount_distribution(Some(&[10.0, 5.0])).is_err());
        assert!(engine.amount_distribution(Some(&[0.0, f64::INFINITY])).is_err());
    }

    #[test]
    fn test_custom_edges_cover_every_row() {
        let rows = vec![
            tx(0, 1, TransactionType::Payment, 5.0, false, false),
            tx(1, 1, TransactionType::Payment, 50.0, false, false),
            tx(2, 1, TransactionType::Payment, 500.0, false, false),
        ];
        let (_dal, engine) = engine_over(rows, false);
        let total = engine.overview().total_count;

        let err = engine.amount_distribution(Some(&[100.0, 1000.0])).unwrap_err();
        assert!(matches!(err, DataError::InvalidParameter(_)));

        for edges in [&[0.0, 100.0, 1000.0][..], &[-10.0, 10.0][..], &[0.0][..]] {
            let dist = engine.amount_distribution(Some(edges)).unwrap();
            assert_eq!(dist.counts.iter().sum::<u64>(), total, "{:?}", edges);
        }
    }

    #[test]
    fn test_daily_grouped_by_step_ascending() {
        let rows = vec![
            tx(0, 3, TransactionType::Payment, 10.0, false, false),
            tx(1, 1, TransactionType::Payment, 20.0, false, false),
            tx(2, 3, TransactionType::Payment, 30.0, false, false),
        ];
        let (_dal, engine) = engine_over(rows, false);
        let daily = engine.daily();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].step, Step::new(1));
        assert_eq!(daily[0].count, 1);
        assert_eq!(daily[1].step, Step::new(3));
        assert_eq!(daily[1].count, 2);
        assert_eq!(daily[1].avg_amount, 20.0);
    }

    #[test]
    fn test_fraud_summary_and_by_type() {
        let (_dal, engine) = engine_over(sample_rows(), false);
        let summary = engine.fraud_summary();
        assert_eq!(summary.total_frauds, 2);
        assert_eq!(summary.flagged, 2);
        assert_eq!(summary.precision, 0.5);
        assert_eq!(summary.recall, 0.5);

        let by_type = engine.fraud_by_type();
        let transfer = by_type
            .iter()
            .find(|t| t.tx_type == TransactionType::Transfer)
            .unwrap();
        assert_eq!(transfer.total, 2);
        assert_eq!(transfer.fraud_count, 1);
        assert_eq!(transfer.fraud_rate, 0.5);
    }

    #[test]
    fn test_empty_dataset_reports_zeros() {
        let (_dal, engine) = engine_over(Vec::new(), false);
        let stats = engine.overview();
        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.fraud_rate, 0.0);
        assert_eq!(stats.avg_amount, 0.0);
        assert_eq!(stats.most_common_type, None);
        assert!(stats.by_type.is_empty());
        assert_eq!(stats.fraud_summary.precision, 0.0);
        assert_eq!(stats.fraud_summary.recall, 0.0);
    }

    #[test]
    fn test_delete_invalidates_and_recomputes() {
        let (dal, engine) = engine_over(sample_rows(), true);
        let before = engine.overview();
        assert_eq!(before.total_count, 5);

        dal.delete("tx_0000002").unwrap();
        let after = engine.overview();
        assert_eq!(after.total_count, 4);
        assert_eq!(after.fraud_count, 1);
        assert_eq!(after.fraud_rate, 0.25);
        assert_eq!(after.amount_distribution.counts.iter().sum::<u64>(), 4);

        // Previously handed-out stats are untouched.
        assert_eq!(before.total_count, 5);
    }

    #[test]
    fn test_snapshot_after_delete_warms_cache() {
        let (dal, engine) = engine_over(sample_rows(), true);
        dal.delete("tx_0000000").unwrap();

        let warmed = engine.snapshot();
        assert_eq!(warmed.total_count, 4);
        assert!(Arc::ptr_eq(&warmed, &engine.overview()));
    }

    #[test]
    fn test_overview_is_memoized() {
        let (_dal, engine) = engine_over(sample_rows(), false);
        let a = engine.overview();
        let b = engine.overview();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
