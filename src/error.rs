//! Error types for tsbridge
//!
//! Each core component has its own error type so callers can tell a malformed
//! payload from a storage fault from a client-initiated cancellation. The
//! crate-level [`Error`] wraps all of them for code that does not care.

use std::fmt;

/// Result type alias for tsbridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Malformed or corrupt wire payload
    Decode(DecodeError),
    /// Response could not be encoded
    Encode(EncodeError),
    /// Query rejected by the matcher translator
    Translation(TranslationError),
    /// Storage failure on the write path
    Write(WriteError),
    /// Storage failure or cancellation on the read path
    Read(ReadError),
    /// Database gateway failure outside of a read or write
    Gateway(GatewayError),
    /// Configuration errors
    Config(String),
    /// IO errors
    Io(std::io::Error),
}

/// Wire codec errors
#[derive(Debug)]
pub enum DecodeError {
    /// Snappy decompression failed
    Snappy(snap::Error),
    /// Protobuf structure did not match the expected message
    Protobuf(prost::DecodeError),
    /// A written series has no `__name__` label
    MissingMetricName { series: usize },
    /// A written series has a label with an empty name
    EmptyLabelName { series: usize },
    /// A written series repeats a label name
    DuplicateLabel { series: usize, name: String },
    /// A read query carries a matcher type outside the protocol enum
    UnknownMatcherType { query: usize, value: i32 },
    /// A read query's start is after its end
    InvalidTimeRange {
        query: usize,
        start_ms: i64,
        end_ms: i64,
    },
}

/// Wire codec encoding errors
#[derive(Debug)]
pub enum EncodeError {
    /// Snappy compression failed (payload too large for a raw block)
    Snappy(snap::Error),
}

/// Matcher translation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// The query carries no matchers at all
    NoMatchers,
}

/// Write path errors
#[derive(Debug)]
pub enum WriteError {
    /// The batch insert failed
    Gateway(GatewayError),
}

/// Read path errors
#[derive(Debug)]
pub enum ReadError {
    /// The caller canceled the request while a scan was in flight
    Canceled,
    /// A query could not be translated into a predicate
    Translation { query: usize, source: TranslationError },
    /// The scan failed
    Gateway { query: usize, source: GatewayError },
}

/// Database gateway errors
#[derive(Debug)]
pub enum GatewayError {
    /// Transport-level failure (connect, timeout, broken stream)
    Http(reqwest::Error),
    /// The database answered with a non-success status
    Status { code: u16, body: String },
    /// The response body could not be decoded as rows
    Protocol(String),
    /// The database reported an exception after the response had started
    Exception { code: Option<u32>, message: String },
    /// A regex matcher could not be compiled by the in-memory backend
    InvalidRegex { pattern: String, reason: String },
    /// The backend is not accepting requests
    Unavailable(String),
}

impl ReadError {
    /// True when the read was aborted because the caller went away.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ReadError::Canceled)
    }
}

impl Error {
    /// True when the underlying failure is a client-initiated cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Read(e) if e.is_canceled())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode(e) => Some(e),
            Error::Encode(e) => Some(e),
            Error::Translation(e) => Some(e),
            Error::Write(e) => Some(e),
            Error::Read(e) => Some(e),
            Error::Gateway(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Snappy(e) => Some(e),
            DecodeError::Protobuf(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Snappy(e) => Some(e),
        }
    }
}

impl std::error::Error for TranslationError {}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Gateway(e) => Some(e),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Canceled => None,
            ReadError::Translation { source, .. } => Some(source),
            ReadError::Gateway { source, .. } => Some(source),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode(e) => write!(f, "Decode error: {}", e),
            Error::Encode(e) => write!(f, "Encode error: {}", e),
            Error::Translation(e) => write!(f, "Translation error: {}", e),
            Error::Write(e) => write!(f, "Write error: {}", e),
            Error::Read(e) => write!(f, "Read error: {}", e),
            Error::Gateway(e) => write!(f, "Gateway error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Snappy(e) => write!(f, "snappy decompression failed: {}", e),
            DecodeError::Protobuf(e) => write!(f, "protobuf decoding failed: {}", e),
            DecodeError::MissingMetricName { series } => {
                write!(f, "series {} has no __name__ label", series)
            }
            DecodeError::EmptyLabelName { series } => {
                write!(f, "series {} has a label with an empty name", series)
            }
            DecodeError::DuplicateLabel { series, name } => {
                write!(f, "series {} repeats label {:?}", series, name)
            }
            DecodeError::UnknownMatcherType { query, value } => {
                write!(f, "query {} has unknown matcher type {}", query, value)
            }
            DecodeError::InvalidTimeRange {
                query,
                start_ms,
                end_ms,
            } => write!(
                f,
                "query {} has start {} after end {}",
                query, start_ms, end_ms
            ),
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Snappy(e) => write!(f, "snappy compression failed: {}", e),
        }
    }
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationError::NoMatchers => write!(f, "query has no label matchers"),
        }
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::Gateway(e) => write!(f, "batch insert failed: {}", e),
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Canceled => write!(f, "read canceled by caller"),
            ReadError::Translation { query, source } => {
                write!(f, "query {}: {}", query, source)
            }
            ReadError::Gateway { query, source } => {
                write!(f, "query {}: scan failed: {}", query, source)
            }
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Http(e) => write!(f, "HTTP error: {}", e),
            GatewayError::Status { code, body } => {
                write!(f, "database returned status {}: {}", code, body.trim())
            }
            GatewayError::Protocol(msg) => write!(f, "malformed row data: {}", msg),
            GatewayError::Exception { code, message } => match code {
                Some(code) => write!(f, "database exception {} mid-stream: {}", code, message),
                None => write!(f, "database exception mid-stream: {}", message),
            },
            GatewayError::InvalidRegex { pattern, reason } => {
                write!(f, "invalid regex {:?}: {}", pattern, reason)
            }
            GatewayError::Unavailable(msg) => write!(f, "database unavailable: {}", msg),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Error::Encode(e)
    }
}

impl From<TranslationError> for Error {
    fn from(e: TranslationError) -> Self {
        Error::Translation(e)
    }
}

impl From<WriteError> for Error {
    fn from(e: WriteError) -> Self {
        Error::Write(e)
    }
}

impl From<ReadError> for Error {
    fn from(e: ReadError) -> Self {
        Error::Read(e)
    }
}

impl From<GatewayError> for Error {
    fn from(e: GatewayError) -> Self {
        Error::Gateway(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<snap::Error> for DecodeError {
    fn from(e: snap::Error) -> Self {
        DecodeError::Snappy(e)
    }
}

impl From<snap::Error> for EncodeError {
    fn from(e: snap::Error) -> Self {
        EncodeError::Snappy(e)
    }
}

impl From<prost::DecodeError> for DecodeError {
    fn from(e: prost::DecodeError) -> Self {
        DecodeError::Protobuf(e)
    }
}

impl From<GatewayError> for WriteError {
    fn from(e: GatewayError) -> Self {
        WriteError::Gateway(e)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Http(e)
    }
}
