//! Storage schema for the samples table
//!
//! One row per sample. The full label set (including `__name__`) is stored as
//! a map column next to a dedicated `metric_name` column, so scans can narrow on
//! the primary key prefix before evaluating label predicates.
//!
//! The table is owned by the operator. The expected layout is:
//!
//! ```sql
//! CREATE TABLE metrics.samples (
//!     metric_name LowCardinality(String),
//!     labels      Map(LowCardinality(String), String),
//!     timestamp   DateTime64(3, 'UTC'),
//!     value       Float64
//! ) ENGINE = MergeTree
//! ORDER BY (metric_name, labels, timestamp)
//! ```

mod row_binary;
mod samples;

pub use row_binary::{encode_rows, RowDecoder};
pub use samples::{
    SampleRow, TableName, LABELS_FIELD, METRIC_NAME_FIELD, TIMESTAMP_FIELD, VALUE_FIELD,
};
