//! # tsbridge
//!
//! A Prometheus remote storage bridge for ClickHouse.
//!
//! Prometheus (and compatible agents) push samples with remote write and pull
//! them back with remote read. tsbridge speaks that protocol on one side and
//! stores one row per sample in a ClickHouse table on the other, so the
//! monitoring pipeline never talks to the database directly.
//!
//! ## Key Features
//!
//! - **Exact samples**: values are stored bit for bit, NaN staleness markers
//!   included
//! - **Injection-safe reads**: label matchers become typed query parameters,
//!   never SQL text
//! - **Cancellable scans**: a client that goes away aborts its in-flight query
//!
//! ## Architecture
//!
//! - **Codec**: snappy-compressed protobuf remote storage messages
//! - **Ingester**: flattens write requests into batched row inserts
//! - **Query**: translates matchers, scans, and regroups rows into series
//! - **Gateway**: the storage backend (ClickHouse over HTTP, or in-memory)
//! - **API**: the HTTP endpoints, counters and request logging

pub mod api;
pub mod codec;
pub mod config;
pub mod gateway;
pub mod ingester;
pub mod metrics;
pub mod model;
pub mod query;
pub mod schema;
pub mod telemetry;

mod error;

pub use error::{
    DecodeError, EncodeError, Error, GatewayError, ReadError, Result, TranslationError, WriteError,
};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::{BridgeConfig, ComponentFactory, GatewayKind};
    pub use crate::gateway::{ClickHouseGateway, ClickHouseOptions, Gateway, MemoryGateway, RowCursor};
    pub use crate::ingester::Writer;
    pub use crate::model::{
        LabelSet, MatchKind, Matcher, Query, QueryResult, ReadRequest, ReadResponse, Sample,
        TimeRange, TimeSeries, WriteRequest,
    };
    pub use crate::query::{IgnoreLabel, MatcherTranslator, Predicate, Reader};
    pub use crate::schema::{SampleRow, TableName};
    pub use crate::{Error, Result};
}
