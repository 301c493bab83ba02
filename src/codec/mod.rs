//! Prometheus remote storage wire codec
//!
//! Payloads are protobuf messages compressed as a single snappy raw block
//! (not the framed stream format). Decoding validates everything the read and
//! write paths rely on, so they never see a half-built request.

pub mod proto;

use crate::error::{DecodeError, EncodeError};
use crate::model::{
    LabelSet, MatchKind, Matcher, Query, QueryResult, ReadRequest, ReadResponse, Sample,
    TimeSeries, WriteRequest,
};

use prost::Message;

/// Content type of remote storage payloads
pub const CONTENT_TYPE: &str = "application/x-protobuf";
/// Content encoding of remote storage payloads
pub const CONTENT_ENCODING: &str = "snappy";

/// Decode a snappy-compressed remote-write payload.
pub fn decode_write(bytes: &[u8]) -> Result<WriteRequest, DecodeError> {
    let raw = decompress(bytes)?;
    let msg = proto::WriteRequest::decode(raw.as_slice())?;

    let series = msg
        .timeseries
        .into_iter()
        .enumerate()
        .map(|(idx, ts)| series_from_proto(idx, ts))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WriteRequest { series })
}

/// Decode a snappy-compressed remote-read payload.
pub fn decode_read(bytes: &[u8]) -> Result<ReadRequest, DecodeError> {
    let raw = decompress(bytes)?;
    let msg = proto::ReadRequest::decode(raw.as_slice())?;

    let queries = msg
        .queries
        .into_iter()
        .enumerate()
        .map(|(idx, q)| query_from_proto(idx, q))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ReadRequest { queries })
}

/// Encode a remote-read response as snappy-compressed SAMPLES payload.
pub fn encode_read(response: &ReadResponse) -> Result<Vec<u8>, EncodeError> {
    let msg = proto::ReadResponse {
        results: response
            .results
            .iter()
            .map(|r| proto::QueryResult {
                timeseries: r.series.iter().map(series_to_proto).collect(),
            })
            .collect(),
    };
    compress(&msg.encode_to_vec())
}

/// Encode a remote-write payload, as an agent would send it.
pub fn encode_write(request: &WriteRequest) -> Result<Vec<u8>, EncodeError> {
    let msg = proto::WriteRequest {
        timeseries: request.series.iter().map(series_to_proto).collect(),
    };
    compress(&msg.encode_to_vec())
}

/// Encode a remote-read request, as an agent would send it.
pub fn encode_read_request(request: &ReadRequest) -> Result<Vec<u8>, EncodeError> {
    let msg = proto::ReadRequest {
        queries: request.queries.iter().map(query_to_proto).collect(),
        accepted_response_types: vec![proto::read_request::ResponseType::Samples as i32],
    };
    compress(&msg.encode_to_vec())
}

/// Decode a remote-read response, as an agent would receive it.
pub fn decode_read_response(bytes: &[u8]) -> Result<ReadResponse, DecodeError> {
    let raw = decompress(bytes)?;
    let msg = proto::ReadResponse::decode(raw.as_slice())?;

    let mut results = Vec::with_capacity(msg.results.len());
    for result in msg.results {
        let series = result
            .timeseries
            .into_iter()
            .enumerate()
            .map(|(idx, ts)| series_from_proto(idx, ts))
            .collect::<Result<Vec<_>, _>>()?;
        results.push(QueryResult { series });
    }

    Ok(ReadResponse { results })
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    Ok(snap::raw::Decoder::new().decompress_vec(bytes)?)
}

fn compress(bytes: &[u8]) -> Result<Vec<u8>, EncodeError> {
    Ok(snap::raw::Encoder::new().compress_vec(bytes)?)
}

fn series_from_proto(idx: usize, ts: proto::TimeSeries) -> Result<TimeSeries, DecodeError> {
    let mut labels = LabelSet::new();
    for label in ts.labels {
        if label.name.is_empty() {
            return Err(DecodeError::EmptyLabelName { series: idx });
        }
        let name = label.name.clone();
        if labels.insert(label.name, label.value).is_some() {
            return Err(DecodeError::DuplicateLabel { series: idx, name });
        }
    }

    match labels.metric_name() {
        Some(name) if !name.is_empty() => {}
        _ => return Err(DecodeError::MissingMetricName { series: idx }),
    }

    let samples = ts
        .samples
        .into_iter()
        .map(|s| Sample::new(s.timestamp, s.value))
        .collect();

    Ok(TimeSeries { labels, samples })
}

fn series_to_proto(series: &TimeSeries) -> proto::TimeSeries {
    proto::TimeSeries {
        labels: series
            .labels
            .iter()
            .map(|(name, value)| proto::Label {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect(),
        samples: series
            .samples
            .iter()
            .map(|s| proto::Sample {
                value: s.value,
                timestamp: s.timestamp_ms,
            })
            .collect(),
    }
}

fn query_from_proto(idx: usize, q: proto::Query) -> Result<Query, DecodeError> {
    if q.start_timestamp_ms > q.end_timestamp_ms {
        return Err(DecodeError::InvalidTimeRange {
            query: idx,
            start_ms: q.start_timestamp_ms,
            end_ms: q.end_timestamp_ms,
        });
    }

    let matchers = q
        .matchers
        .into_iter()
        .map(|m| {
            let kind = match proto::label_matcher::Type::try_from(m.r#type) {
                Ok(proto::label_matcher::Type::Eq) => MatchKind::Equal,
                Ok(proto::label_matcher::Type::Neq) => MatchKind::NotEqual,
                Ok(proto::label_matcher::Type::Re) => MatchKind::RegexMatch,
                Ok(proto::label_matcher::Type::Nre) => MatchKind::RegexNotMatch,
                Err(_) => {
                    return Err(DecodeError::UnknownMatcherType {
                        query: idx,
                        value: m.r#type,
                    })
                }
            };
            Ok(Matcher {
                name: m.name,
                value: m.value,
                kind,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Query {
        matchers,
        start_ms: q.start_timestamp_ms,
        end_ms: q.end_timestamp_ms,
    })
}

fn query_to_proto(query: &Query) -> proto::Query {
    proto::Query {
        start_timestamp_ms: query.start_ms,
        end_timestamp_ms: query.end_ms,
        matchers: query
            .matchers
            .iter()
            .map(|m| proto::LabelMatcher {
                r#type: match m.kind {
                    MatchKind::Equal => proto::label_matcher::Type::Eq,
                    MatchKind::NotEqual => proto::label_matcher::Type::Neq,
                    MatchKind::RegexMatch => proto::label_matcher::Type::Re,
                    MatchKind::RegexNotMatch => proto::label_matcher::Type::Nre,
                } as i32,
                name: m.name.clone(),
                value: m.value.clone(),
            })
            .collect(),
        hints: None,
    }
}
