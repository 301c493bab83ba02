//! Remote-read execution
//!
//! Each query is translated, scanned and regrouped on its own. Rows come back
//! from storage flat and in no particular order; they are grouped by exact
//! label set and each group becomes one series with ascending samples.

use super::translator::MatcherTranslator;
use crate::error::{GatewayError, ReadError};
use crate::gateway::Gateway;
use crate::model::{LabelSet, QueryResult, ReadRequest, ReadResponse, Sample, TimeRange, TimeSeries};
use crate::query::Predicate;
use crate::schema::{SampleRow, TableName};

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Groups scanned rows into series
#[derive(Debug, Default)]
pub struct SeriesBuilder {
    groups: HashMap<Arc<LabelSet>, Vec<Sample>>,
}

impl SeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: SampleRow) {
        self.groups
            .entry(row.labels)
            .or_default()
            .push(Sample::new(row.timestamp_ms, row.value));
    }

    /// Number of distinct series seen so far
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Series ordered by label set, samples strictly ascending by timestamp.
    ///
    /// When storage returns several rows for one timestamp the last one wins.
    pub fn finish(self) -> Vec<TimeSeries> {
        let mut series: Vec<TimeSeries> = self
            .groups
            .into_iter()
            .map(|(labels, mut samples)| {
                // stable, so duplicates keep arrival order
                samples.sort_by_key(|s| s.timestamp_ms);
                samples.dedup_by(|later, kept| {
                    if later.timestamp_ms == kept.timestamp_ms {
                        *kept = *later;
                        true
                    } else {
                        false
                    }
                });
                TimeSeries {
                    labels: Arc::try_unwrap(labels).unwrap_or_else(|shared| (*shared).clone()),
                    samples,
                }
            })
            .collect();

        series.sort_by(|a, b| a.labels.cmp(&b.labels));
        series
    }
}

/// Executes remote-read requests against a gateway
#[derive(Clone)]
pub struct Reader {
    gateway: Arc<dyn Gateway>,
    table: TableName,
    translator: MatcherTranslator,
}

impl Reader {
    pub fn new(gateway: Arc<dyn Gateway>, table: TableName, translator: MatcherTranslator) -> Self {
        Self {
            gateway,
            table,
            translator,
        }
    }

    /// Answer every query in order.
    ///
    /// If `cancel` fires while a scan is in flight, the scan is dropped and
    /// [`ReadError::Canceled`] is returned.
    pub async fn read(
        &self,
        request: &ReadRequest,
        cancel: &CancellationToken,
    ) -> Result<ReadResponse, ReadError> {
        let mut results = Vec::with_capacity(request.queries.len());

        for (idx, query) in request.queries.iter().enumerate() {
            let predicate = self
                .translator
                .translate(&query.matchers)
                .map_err(|source| ReadError::Translation { query: idx, source })?;

            let series = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReadError::Canceled),
                scanned = self.scan(&predicate, TimeRange::from(query)) => {
                    scanned.map_err(|source| ReadError::Gateway { query: idx, source })?
                }
            };

            results.push(QueryResult { series });
        }

        Ok(ReadResponse { results })
    }

    async fn scan(
        &self,
        predicate: &Predicate,
        range: TimeRange,
    ) -> Result<Vec<TimeSeries>, GatewayError> {
        let mut cursor = self.gateway.query(&self.table, predicate, range).await?;
        let mut builder = SeriesBuilder::new();
        while let Some(row) = cursor.next_row().await? {
            builder.push(row);
        }
        Ok(builder.finish())
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("table", &self.table)
            .field("translator", &self.translator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(labels: &Arc<LabelSet>, ts: i64, value: f64) -> SampleRow {
        SampleRow {
            metric_name: Arc::from(labels.metric_name().unwrap_or("")),
            labels: labels.clone(),
            timestamp_ms: ts,
            value,
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> Arc<LabelSet> {
        Arc::new(pairs.iter().copied().collect())
    }

    #[test]
    fn test_builder_groups_and_sorts() {
        let a = labels(&[("__name__", "up"), ("job", "b")]);
        let b = labels(&[("__name__", "up"), ("job", "a")]);

        let mut builder = SeriesBuilder::new();
        builder.push(row(&a, 3000, 3.0));
        builder.push(row(&b, 2000, 2.0));
        builder.push(row(&a, 1000, 1.0));
        builder.push(row(&b, 1000, 1.0));
        assert_eq!(builder.len(), 2);

        let series = builder.finish();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].labels.get("job"), Some("a"));
        assert_eq!(series[1].labels.get("job"), Some("b"));
        assert_eq!(
            series[1].samples,
            vec![Sample::new(1000, 1.0), Sample::new(3000, 3.0)]
        );
    }

    #[test]
    fn test_builder_last_duplicate_wins() {
        let a = labels(&[("__name__", "up")]);
        let mut builder = SeriesBuilder::new();
        builder.push(row(&a, 1000, 1.0));
        builder.push(row(&a, 2000, 2.0));
        builder.push(row(&a, 1000, 9.0));

        let series = builder.finish();
        assert_eq!(
            series[0].samples,
            vec![Sample::new(1000, 9.0), Sample::new(2000, 2.0)]
        );
    }

    #[test]
    fn test_builder_groups_by_value_not_pointer() {
        let first = labels(&[("__name__", "up"), ("job", "a")]);
        let second = labels(&[("job", "a"), ("__name__", "up")]);
        assert!(!Arc::ptr_eq(&first, &second));

        let mut builder = SeriesBuilder::new();
        builder.push(row(&first, 1, 1.0));
        builder.push(row(&second, 2, 2.0));

        let series = builder.finish();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].samples.len(), 2);
    }

    #[test]
    fn test_empty_builder() {
        assert!(SeriesBuilder::new().finish().is_empty());
    }
}
