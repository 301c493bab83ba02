//! ClickHouse gateway over the HTTP interface
//!
//! Inserts and scans both use the RowBinary format. Every literal that comes
//! from a client (label names, label values, time bounds) is sent as a typed
//! query parameter; the SQL text only contains generated identifiers.

use super::{Gateway, RowCursor};
use crate::error::GatewayError;
use crate::model::TimeRange;
use crate::query::{Predicate, QueryParams};
use crate::schema::{
    encode_rows, RowDecoder, SampleRow, TableName, LABELS_FIELD, METRIC_NAME_FIELD,
    TIMESTAMP_FIELD, VALUE_FIELD,
};

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{Client, RequestBuilder, Response};
use std::fmt;
use std::time::Duration;
use tracing::debug;

const USER_HEADER: &str = "X-ClickHouse-User";
const KEY_HEADER: &str = "X-ClickHouse-Key";
const DATABASE_HEADER: &str = "X-ClickHouse-Database";
const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";

/// Bytes of raw body kept around to recover an exception written mid-stream
const EXCEPTION_TAIL_BYTES: usize = 4096;

/// Connection settings for [`ClickHouseGateway`]
#[derive(Clone, Default)]
pub struct ClickHouseOptions {
    /// Base URL of the HTTP interface, e.g. `http://127.0.0.1:8123`
    pub url: String,
    /// Default database for unqualified table names
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout, covering the whole response body
    pub timeout: Option<Duration>,
}

impl ClickHouseOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for ClickHouseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseOptions")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Gateway backed by a pooled HTTP client
#[derive(Debug, Clone)]
pub struct ClickHouseGateway {
    client: Client,
    options: ClickHouseOptions,
}

impl ClickHouseGateway {
    pub fn new(options: ClickHouseOptions) -> Result<Self, GatewayError> {
        let mut builder = Client::builder().pool_idle_timeout(Duration::from_secs(90));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, options })
    }

    pub fn options(&self) -> &ClickHouseOptions {
        &self.options
    }

    fn with_auth(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(user) = &self.options.username {
            request = request.header(USER_HEADER, user);
        }
        if let Some(password) = &self.options.password {
            request = request.header(KEY_HEADER, password);
        }
        if let Some(database) = &self.options.database {
            request = request.header(DATABASE_HEADER, database);
        }
        request
    }

    fn url_pairs(sql: String, settings: &[(&str, &str)], params: &QueryParams) -> Vec<(String, String)> {
        let mut pairs = vec![("query".to_string(), sql)];
        pairs.extend(settings.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        pairs.extend(params.url_pairs());
        pairs
    }
}

/// Turn a non-2xx response into [`GatewayError::Status`] with the server's message.
async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("<unreadable body: {e}>"),
    };
    Err(GatewayError::Status {
        code: status.as_u16(),
        body,
    })
}

/// Build the scan statement and bind its parameters.
pub(crate) fn select_statement(
    table: &TableName,
    predicate: &Predicate,
    range: TimeRange,
    params: &mut QueryParams,
) -> String {
    let start = params.bind(&range.start.to_string(), "Int64");
    let end = params.bind(&range.end.to_string(), "Int64");

    let mut sql = format!(
        "SELECT {}, {}, {}, {} FROM {} WHERE {} >= fromUnixTimestamp64Milli({}) AND {} <= fromUnixTimestamp64Milli({})",
        METRIC_NAME_FIELD,
        LABELS_FIELD,
        TIMESTAMP_FIELD,
        VALUE_FIELD,
        table.quoted(),
        TIMESTAMP_FIELD,
        start,
        TIMESTAMP_FIELD,
        end,
    );
    if let Some(filter) = predicate.render(params) {
        sql.push_str(" AND ");
        sql.push_str(&filter);
    }
    sql.push_str(" FORMAT RowBinary");
    sql
}

pub(crate) fn insert_statement(table: &TableName) -> String {
    format!(
        "INSERT INTO {} ({}, {}, {}, {}) FORMAT RowBinary",
        table.quoted(),
        METRIC_NAME_FIELD,
        LABELS_FIELD,
        TIMESTAMP_FIELD,
        VALUE_FIELD
    )
}

#[async_trait]
impl Gateway for ClickHouseGateway {
    async fn insert_batch(&self, table: &TableName, rows: &[SampleRow]) -> Result<(), GatewayError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut body = BytesMut::new();
        encode_rows(rows, &mut body);
        debug!(table = %table, rows = rows.len(), bytes = body.len(), "Inserting batch");

        let pairs = Self::url_pairs(
            insert_statement(table),
            &[("wait_end_of_query", "1")],
            &QueryParams::new(),
        );
        let request = self
            .client
            .post(&self.options.url)
            .query(&pairs)
            .body(body.freeze());

        let response = self.with_auth(request).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        table: &TableName,
        predicate: &Predicate,
        range: TimeRange,
    ) -> Result<Box<dyn RowCursor>, GatewayError> {
        let mut params = QueryParams::new();
        let sql = select_statement(table, predicate, range, &mut params);
        debug!(table = %table, params = params.len(), "Scanning");

        // GET keeps the query read-only so the server can cancel it when we hang up.
        let pairs = Self::url_pairs(
            sql,
            &[("cancel_http_readonly_queries_on_client_close", "1")],
            &params,
        );
        let request = self.client.get(&self.options.url).query(&pairs);

        let response = check_status(self.with_auth(request).send().await?).await?;
        let exception_code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        Ok(Box::new(ClickHouseCursor {
            response,
            decoder: RowDecoder::new(),
            exhausted: false,
            tail: Vec::new(),
            exception_code,
        }))
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        let url = format!("{}/ping", self.options.url.trim_end_matches('/'));
        let response = self.client.get(url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Find a `Code: N. DB::Exception` message in the tail of a response body.
///
/// Once a 200 status has gone out, the server can only report a failure by
/// appending the exception text to the row stream.
pub(crate) fn server_exception(tail: &[u8]) -> Option<(Option<u32>, String)> {
    let text = String::from_utf8_lossy(tail);
    let (start, _) = text
        .match_indices("Code: ")
        .find(|(idx, _)| text[*idx..].contains("DB::Exception"))?;
    let message = text[start..].trim().to_string();
    let code = message["Code: ".len()..]
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|digits| digits.parse().ok());
    Some((code, message))
}

/// Streams rows out of a RowBinary response body as chunks arrive
struct ClickHouseCursor {
    response: Response,
    decoder: RowDecoder,
    exhausted: bool,
    tail: Vec<u8>,
    exception_code: Option<u32>,
}

impl ClickHouseCursor {
    fn remember(&mut self, chunk: &[u8]) {
        self.tail.extend_from_slice(chunk);
        if self.tail.len() > EXCEPTION_TAIL_BYTES {
            let excess = self.tail.len() - EXCEPTION_TAIL_BYTES;
            self.tail.drain(..excess);
        }
    }

    /// Prefer the server's own exception over a decoding error it caused.
    fn explain(&self, err: GatewayError) -> GatewayError {
        match (server_exception(&self.tail), self.exception_code) {
            (Some((code, message)), header_code) => GatewayError::Exception {
                code: header_code.or(code),
                message,
            },
            (None, Some(code)) => GatewayError::Exception {
                code: Some(code),
                message: err.to_string(),
            },
            (None, None) => err,
        }
    }
}

#[async_trait]
impl RowCursor for ClickHouseCursor {
    async fn next_row(&mut self) -> Result<Option<SampleRow>, GatewayError> {
        loop {
            match self.decoder.next_row() {
                Ok(Some(row)) => return Ok(Some(row)),
                Ok(None) => {}
                Err(e) => return Err(self.explain(e)),
            }
            if self.exhausted {
                if let Err(e) = self.decoder.finish() {
                    return Err(self.explain(e));
                }
                return Ok(None);
            }
            match self.response.chunk().await? {
                Some(chunk) => {
                    self.remember(&chunk);
                    self.decoder.push(&chunk);
                }
                None => self.exhausted = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Matcher;
    use crate::query::MatcherTranslator;

    #[test]
    fn test_select_binds_time_range_and_labels() {
        let table: TableName = "metrics.samples".parse().unwrap();
        let predicate = MatcherTranslator::new(None)
            .translate(&[Matcher::equal("__name__", "up"), Matcher::equal("job", "a'b")])
            .unwrap();

        let mut params = QueryParams::new();
        let sql = select_statement(&table, &predicate, TimeRange::new(1000, 2000), &mut params);

        assert_eq!(
            sql,
            "SELECT metric_name, labels, timestamp, value FROM `metrics`.`samples` \
             WHERE timestamp >= fromUnixTimestamp64Milli({p0:Int64}) \
             AND timestamp <= fromUnixTimestamp64Milli({p1:Int64}) \
             AND metric_name = {p2:String} AND labels[{p3:String}] = {p4:String} \
             FORMAT RowBinary"
        );
        let values: Vec<String> = params.url_pairs().map(|(_, v)| v).collect();
        assert_eq!(values, vec!["1000", "2000", "up", "job", "a'b"]);
    }

    #[test]
    fn test_select_without_predicate_only_filters_time() {
        let table: TableName = "samples".parse().unwrap();
        let mut params = QueryParams::new();
        let sql = select_statement(&table, &Predicate::default(), TimeRange::new(0, 1), &mut params);
        assert!(sql.ends_with("fromUnixTimestamp64Milli({p1:Int64}) FORMAT RowBinary"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_insert_names_columns() {
        let table: TableName = "metrics.samples".parse().unwrap();
        assert_eq!(
            insert_statement(&table),
            "INSERT INTO `metrics`.`samples` (metric_name, labels, timestamp, value) FORMAT RowBinary"
        );
    }

    #[test]
    fn test_server_exception_in_body_tail() {
        let mut body = vec![0x02, b'u', b'p', 0x00];
        body.extend_from_slice(b"Code: 60. DB::Exception: Table samples does not exist.\n");

        let (code, message) = server_exception(&body).unwrap();
        assert_eq!(code, Some(60));
        assert_eq!(message, "Code: 60. DB::Exception: Table samples does not exist.");
    }

    #[test]
    fn test_server_exception_requires_marker() {
        assert!(server_exception(b"Code: 60. nothing to see").is_none());
        assert!(server_exception(&[0x43, 0x00, 0xff]).is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut options = ClickHouseOptions::new("http://db:8123");
        options.password = Some("hunter2".to_string());
        let printed = format!("{:?}", options);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }
}
