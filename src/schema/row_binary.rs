//! ClickHouse RowBinary encoding of sample rows.
//!
//! Column order is `metric_name String, labels Map(String, String),
//! timestamp DateTime64(3), value Float64`. Strings are LEB128
//! length-prefixed, maps are a LEB128 entry count followed by key/value pairs,
//! `DateTime64(3)` is an `Int64` of milliseconds and `Float64` is IEEE-754
//! little endian, so NaN payloads survive the round trip unchanged.

use super::SampleRow;
use crate::error::GatewayError;
use crate::model::LabelSet;

use bytes::{Buf, BufMut, BytesMut};
use std::sync::Arc;

/// Append rows to `out` in RowBinary format.
pub fn encode_rows(rows: &[SampleRow], out: &mut BytesMut) {
    for row in rows {
        put_string(out, &row.metric_name);
        put_varint(out, row.labels.len() as u64);
        for (name, value) in row.labels.iter() {
            put_string(out, name);
            put_string(out, value);
        }
        out.put_i64_le(row.timestamp_ms);
        out.put_f64_le(row.value);
    }
}

fn put_varint(out: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        out.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    out.put_u8(value as u8);
}

fn put_string(out: &mut BytesMut, s: &str) {
    put_varint(out, s.len() as u64);
    out.put_slice(s.as_bytes());
}

/// Incremental RowBinary decoder.
///
/// Response bodies arrive in arbitrary chunks; rows split across chunk
/// boundaries stay buffered until the rest arrives. Consecutive rows with the
/// same metric name or label set share one allocation.
#[derive(Debug, Default)]
pub struct RowDecoder {
    buf: BytesMut,
    last_name: Option<Arc<str>>,
    last_labels: Option<Arc<LabelSet>>,
}

/// Outcome of reading one field from a partially filled buffer
enum Field<T> {
    Ready(T),
    Incomplete,
}

macro_rules! ready {
    ($e:expr) => {
        match $e? {
            Field::Ready(v) => v,
            Field::Incomplete => return Ok(None),
        }
    };
}

impl RowDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer another chunk of response body.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Decode the next complete row, or `None` if more bytes are needed.
    pub fn next_row(&mut self) -> Result<Option<SampleRow>, GatewayError> {
        let mut cursor: &[u8] = &self.buf;
        let available = cursor.len();
        let Some((name, labels, timestamp_ms, value)) = decode_fields(&mut cursor)? else {
            return Ok(None);
        };
        let consumed = available - cursor.len();
        self.buf.advance(consumed);

        let metric_name = match &self.last_name {
            Some(prev) if **prev == *name => prev.clone(),
            _ => {
                let fresh: Arc<str> = Arc::from(name);
                self.last_name = Some(fresh.clone());
                fresh
            }
        };
        let labels = match &self.last_labels {
            Some(prev) if **prev == labels => prev.clone(),
            _ => {
                let fresh = Arc::new(labels);
                self.last_labels = Some(fresh.clone());
                fresh
            }
        };

        Ok(Some(SampleRow {
            metric_name,
            labels,
            timestamp_ms,
            value,
        }))
    }

    /// Fail if the body ended in the middle of a row.
    pub fn finish(&self) -> Result<(), GatewayError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::Protocol(format!(
                "response ended with {} bytes of a partial row",
                self.buf.len()
            )))
        }
    }
}

type RowFields = (String, LabelSet, i64, f64);

fn decode_fields(cursor: &mut &[u8]) -> Result<Option<RowFields>, GatewayError> {
    let name = ready!(read_string(cursor));
    let pairs = ready!(read_varint(cursor));

    let mut labels = LabelSet::new();
    for _ in 0..pairs {
        let key = ready!(read_string(cursor));
        let value = ready!(read_string(cursor));
        labels.insert(key, value);
    }

    if cursor.len() < 16 {
        return Ok(None);
    }
    let timestamp_ms = cursor.get_i64_le();
    let value = cursor.get_f64_le();

    Ok(Some((name, labels, timestamp_ms, value)))
}

fn read_varint(cursor: &mut &[u8]) -> Result<Field<u64>, GatewayError> {
    let mut value = 0u64;
    for (i, byte) in cursor.iter().enumerate() {
        if i >= 10 {
            return Err(GatewayError::Protocol("varint longer than 10 bytes".to_string()));
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            cursor.advance(i + 1);
            return Ok(Field::Ready(value));
        }
    }
    Ok(Field::Incomplete)
}

fn read_string(cursor: &mut &[u8]) -> Result<Field<String>, GatewayError> {
    let len = match read_varint(cursor)? {
        Field::Ready(len) => len as usize,
        Field::Incomplete => return Ok(Field::Incomplete),
    };
    if cursor.len() < len {
        return Ok(Field::Incomplete);
    }
    let s = std::str::from_utf8(&cursor[..len])
        .map_err(|e| GatewayError::Protocol(format!("string column is not UTF-8: {e}")))?
        .to_string();
    cursor.advance(len);
    Ok(Field::Ready(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, labels: &[(&str, &str)], ts: i64, value: f64) -> SampleRow {
        SampleRow {
            metric_name: Arc::from(name),
            labels: Arc::new(labels.iter().copied().collect()),
            timestamp_ms: ts,
            value,
        }
    }

    #[test]
    fn test_varint_encoding_matches_leb128() {
        let mut out = BytesMut::new();
        put_varint(&mut out, 300);
        assert_eq!(&out[..], &[0xac, 0x02]);
    }

    #[test]
    fn test_decodes_rows_split_across_chunks() {
        let rows = vec![
            row("up", &[("__name__", "up"), ("job", "api")], 1000, 1.0),
            row("up", &[("__name__", "up"), ("job", "api")], 2000, 0.0),
        ];
        let mut encoded = BytesMut::new();
        encode_rows(&rows, &mut encoded);

        let mut decoder = RowDecoder::new();
        let mut decoded = Vec::new();
        for chunk in encoded.chunks(3) {
            decoder.push(chunk);
            while let Some(r) = decoder.next_row().unwrap() {
                decoded.push(r);
            }
        }
        decoder.finish().unwrap();

        assert_eq!(decoded, rows);
        // consecutive identical label sets share one allocation
        assert!(Arc::ptr_eq(&decoded[0].labels, &decoded[1].labels));
    }

    #[test]
    fn test_preserves_nan_payload() {
        let stale = f64::from_bits(0x7ff0_0000_0000_0002);
        let mut encoded = BytesMut::new();
        encode_rows(&[row("up", &[("__name__", "up")], 5, stale)], &mut encoded);

        let mut decoder = RowDecoder::new();
        decoder.push(&encoded);
        let decoded = decoder.next_row().unwrap().unwrap();
        assert_eq!(decoded.value.to_bits(), stale.to_bits());
    }

    #[test]
    fn test_truncated_body_is_reported() {
        let mut encoded = BytesMut::new();
        encode_rows(&[row("up", &[("__name__", "up")], 5, 1.0)], &mut encoded);

        let mut decoder = RowDecoder::new();
        decoder.push(&encoded[..encoded.len() - 4]);
        assert!(decoder.next_row().unwrap().is_none());
        assert!(matches!(decoder.finish(), Err(GatewayError::Protocol(_))));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let mut decoder = RowDecoder::new();
        decoder.push(&[0x02, 0xff, 0xfe]);
        assert!(matches!(decoder.next_row(), Err(GatewayError::Protocol(_))));
    }
}
