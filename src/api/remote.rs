//! Prometheus remote storage endpoints
//!
//! Both handlers run the actual work in a spawned task. A client that hangs up
//! mid-write does not abort the insert; a client that hangs up mid-read cancels
//! the scan through the request's cancellation token.

use crate::api::ApiState;
use crate::codec;
use crate::{Error, Result};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Handle Prometheus remote-write requests
///
/// POST /write
/// Content-Encoding: snappy
/// Content-Type: application/x-protobuf
pub async fn handle_write(State(state): State<ApiState>, body: Bytes) -> Response {
    let task = tokio::spawn(async move { serve_write(&state, &body).await });

    match task.await {
        Ok(Ok(_)) => StatusCode::OK.into_response(),
        Ok(Err(e)) => internal_error(&e),
        Err(e) => {
            error!(error = %e, "Write task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "write task failed").into_response()
        }
    }
}

async fn serve_write(state: &ApiState, body: &[u8]) -> Result<u64> {
    state.metrics.write_requests.inc();

    match decode_and_write(state, body).await {
        Ok(samples) => {
            state.metrics.samples_written.inc_by(samples);
            debug!(samples, "Write completed");
            Ok(samples)
        }
        Err(e) => {
            state.metrics.write_errors.inc();
            error!(error = %e, "Write failed");
            Err(e)
        }
    }
}

async fn decode_and_write(state: &ApiState, body: &[u8]) -> Result<u64> {
    let request = codec::decode_write(body)?;
    Ok(state.writer.write(&request).await?)
}

/// Handle Prometheus remote-read requests
///
/// POST /read
/// Content-Encoding: snappy
/// Content-Type: application/x-protobuf
pub async fn handle_read(State(state): State<ApiState>, body: Bytes) -> Response {
    let cancel = CancellationToken::new();
    // fires if this handler is dropped because the client went away
    let _guard = cancel.clone().drop_guard();

    let task = tokio::spawn(async move { serve_read(&state, &body, &cancel).await });

    match task.await {
        Ok(Ok(payload)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, codec::CONTENT_TYPE),
                (header::CONTENT_ENCODING, codec::CONTENT_ENCODING),
            ],
            payload,
        )
            .into_response(),
        Ok(Err(e)) => internal_error(&e),
        Err(e) => {
            error!(error = %e, "Read task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "read task failed").into_response()
        }
    }
}

async fn serve_read(state: &ApiState, body: &[u8], cancel: &CancellationToken) -> Result<Vec<u8>> {
    state.metrics.read_requests.inc();

    match decode_and_read(state, body, cancel).await {
        Ok(payload) => Ok(payload),
        Err(e) if e.is_canceled() => {
            debug!("Read canceled by client");
            Err(e)
        }
        Err(e) => {
            state.metrics.read_errors.inc();
            error!(error = %e, "Read failed");
            Err(e)
        }
    }
}

async fn decode_and_read(
    state: &ApiState,
    body: &[u8],
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    let request = codec::decode_read(body)?;
    let response = state.reader.read(&request, cancel).await?;
    debug!(
        queries = request.queries.len(),
        series = response.results.iter().map(|r| r.series.len()).sum::<usize>(),
        "Read completed"
    );
    Ok(codec::encode_read(&response)?)
}

fn internal_error(e: &Error) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}
