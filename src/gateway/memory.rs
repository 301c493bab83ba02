//! In-process gateway for development and testing

use super::{Gateway, RowCursor, VecCursor};
use crate::error::GatewayError;
use crate::model::TimeRange;
use crate::query::Predicate;
use crate::schema::{SampleRow, TableName};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Rows of one table, indexed by metric name
#[derive(Debug, Default)]
struct TableData {
    by_name: BTreeMap<Arc<str>, Vec<SampleRow>>,
}

/// In-memory gateway
///
/// Keeps rows per table in insertion order, indexed by metric name so that
/// equality matchers on `__name__` only touch one bucket. Rows are never
/// evicted.
#[derive(Debug)]
pub struct MemoryGateway {
    tables: RwLock<HashMap<String, TableData>>,
    available: AtomicBool,
    batches: AtomicU64,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            batches: AtomicU64::new(0),
        }
    }

    /// Simulate an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful `insert_batch` calls
    pub fn batches_inserted(&self) -> u64 {
        self.batches.load(Ordering::SeqCst)
    }

    /// Total rows stored in `table`
    pub fn row_count(&self, table: &TableName) -> usize {
        self.tables
            .read()
            .get(&table.to_string())
            .map(|t| t.by_name.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::Unavailable(
                "memory gateway is marked unavailable".to_string(),
            ))
        }
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn insert_batch(&self, table: &TableName, rows: &[SampleRow]) -> Result<(), GatewayError> {
        self.check_available()?;

        let mut tables = self.tables.write();
        let data = tables.entry(table.to_string()).or_default();
        for row in rows {
            data.by_name
                .entry(row.metric_name.clone())
                .or_default()
                .push(row.clone());
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query(
        &self,
        table: &TableName,
        predicate: &Predicate,
        range: TimeRange,
    ) -> Result<Box<dyn RowCursor>, GatewayError> {
        self.check_available()?;
        let compiled = predicate.compile()?;

        let tables = self.tables.read();
        let Some(data) = tables.get(&table.to_string()) else {
            return Ok(Box::new(VecCursor::new(Vec::new())));
        };

        let buckets: Vec<&Vec<SampleRow>> = match predicate.metric_name() {
            Some(name) => data.by_name.get(name).into_iter().collect(),
            None => data.by_name.values().collect(),
        };

        let rows = buckets
            .into_iter()
            .flatten()
            .filter(|row| range.contains(row.timestamp_ms) && compiled.matches(row))
            .cloned()
            .collect();

        Ok(Box::new(VecCursor::new(rows)))
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        self.check_available()
    }
}
