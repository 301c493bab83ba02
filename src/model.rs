//! Protocol data model
//!
//! These types are what the codec produces and the read/write paths consume.
//! They are independent of both the protobuf wire types and the storage row
//! layout.

use std::collections::BTreeMap;

/// Reserved label carrying the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A single timestamped measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// Label name to value mapping.
///
/// Backed by a `BTreeMap` so iteration is always sorted by name, which keeps
/// encoding deterministic and makes the set usable as a grouping key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert a label, returning the previous value for that name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value of the `__name__` label, if present.
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A label set with its samples
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    pub labels: LabelSet,
    pub samples: Vec<Sample>,
}

/// Decoded remote-write payload
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteRequest {
    pub series: Vec<TimeSeries>,
}

impl WriteRequest {
    /// Total number of samples across all series.
    pub fn sample_count(&self) -> usize {
        self.series.iter().map(|s| s.samples.len()).sum()
    }
}

/// Label matcher operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    Equal,
    NotEqual,
    RegexMatch,
    RegexNotMatch,
}

/// Predicate over a single label's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub name: String,
    pub value: String,
    pub kind: MatchKind,
}

impl Matcher {
    pub fn new(kind: MatchKind, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind,
        }
    }

    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchKind::Equal, name, value)
    }
}

/// One selection over an inclusive millisecond range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub matchers: Vec<Matcher>,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Decoded remote-read payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadRequest {
    pub queries: Vec<Query>,
}

/// Series returned for one query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub series: Vec<TimeSeries>,
}

/// One result per query, in query order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResponse {
    pub results: Vec<QueryResult>,
}

/// Inclusive time range in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

impl From<&Query> for TimeRange {
    fn from(query: &Query) -> Self {
        Self::new(query.start_ms, query.end_ms)
    }
}
