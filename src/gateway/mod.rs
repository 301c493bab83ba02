//! Database gateway
//!
//! The only component that talks to storage. It knows how to submit a batch of
//! rows and how to stream the rows matching a predicate, nothing more: no
//! retries and no protocol knowledge.

mod clickhouse;
mod memory;

pub use clickhouse::{ClickHouseGateway, ClickHouseOptions};
pub use memory::MemoryGateway;

use crate::error::GatewayError;
use crate::model::TimeRange;
use crate::query::Predicate;
use crate::schema::{SampleRow, TableName};

use async_trait::async_trait;

/// Storage backend for sample rows
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Insert all rows as one batch.
    async fn insert_batch(&self, table: &TableName, rows: &[SampleRow]) -> Result<(), GatewayError>;

    /// Stream rows within `range` (inclusive) that satisfy `predicate`.
    ///
    /// Row order is unspecified.
    async fn query(
        &self,
        table: &TableName,
        predicate: &Predicate,
        range: TimeRange,
    ) -> Result<Box<dyn RowCursor>, GatewayError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), GatewayError>;
}

/// Forward-only cursor over scanned rows
#[async_trait]
pub trait RowCursor: Send {
    /// Next row, or `None` once the scan is exhausted.
    async fn next_row(&mut self) -> Result<Option<SampleRow>, GatewayError>;
}

/// Cursor over rows that are already in memory
#[derive(Debug)]
pub struct VecCursor {
    rows: std::vec::IntoIter<SampleRow>,
}

impl VecCursor {
    pub fn new(rows: Vec<SampleRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

#[async_trait]
impl RowCursor for VecCursor {
    async fn next_row(&mut self) -> Result<Option<SampleRow>, GatewayError> {
        Ok(self.rows.next())
    }
}
