//! Write path
//!
//! Flattens a decoded remote-write request into one row per sample and hands
//! the whole request to the gateway as a single batch. Either every row is
//! accepted or the request fails; there is no buffering and no retry.

use crate::error::WriteError;
use crate::gateway::Gateway;
use crate::model::WriteRequest;
use crate::schema::{SampleRow, TableName};

use std::sync::Arc;

/// Turn a write request into storage rows.
///
/// Rows of one series share the metric name and label set allocations.
pub fn flatten(request: &WriteRequest) -> Vec<SampleRow> {
    let mut rows = Vec::with_capacity(request.sample_count());

    for series in &request.series {
        if series.samples.is_empty() {
            continue;
        }
        let metric_name: Arc<str> = Arc::from(series.labels.metric_name().unwrap_or_default());
        let labels = Arc::new(series.labels.clone());

        rows.extend(series.samples.iter().map(|sample| SampleRow {
            metric_name: metric_name.clone(),
            labels: labels.clone(),
            timestamp_ms: sample.timestamp_ms,
            value: sample.value,
        }));
    }

    rows
}

/// Persists remote-write requests
#[derive(Clone)]
pub struct Writer {
    gateway: Arc<dyn Gateway>,
    table: TableName,
}

impl Writer {
    pub fn new(gateway: Arc<dyn Gateway>, table: TableName) -> Self {
        Self { gateway, table }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Insert every sample of `request`, returning how many were written.
    ///
    /// A request without samples succeeds without touching storage.
    pub async fn write(&self, request: &WriteRequest) -> Result<u64, WriteError> {
        let rows = flatten(request);
        if rows.is_empty() {
            return Ok(0);
        }

        self.gateway.insert_batch(&self.table, &rows).await?;
        Ok(rows.len() as u64)
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
