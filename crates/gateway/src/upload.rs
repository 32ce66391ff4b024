//! `POST /api/v1/upload`: HTTP ingress feeding the dispatcher.

use std::io;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{ALLOW, CONTENT_LENGTH};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use mission_protocol::TransferMeta;
use tokio_util::io::StreamReader;

use crate::server::AppState;
use crate::{DispatchError, FILE_NAME_HEADER, FILE_SHA256_HEADER};

pub(crate) async fn upload(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(ALLOW, "POST")],
            "method not allowed",
        )
            .into_response();
    }

    if !state.registry.is_online().await {
        return (StatusCode::SERVICE_UNAVAILABLE, "agent offline").into_response();
    }

    let filename = match file_name(&headers) {
        Ok(Some(name)) => name,
        Ok(None) => return (StatusCode::BAD_REQUEST, "missing X-File-Name").into_response(),
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "X-File-Name is not valid UTF-8").into_response();
        }
    };

    let limit = state.settings.max_upload_size;
    let declared = header_str(&headers, CONTENT_LENGTH.as_str()).and_then(|s| s.parse::<u64>().ok());
    if limit > 0 && declared.is_some_and(|len| len > limit) {
        tracing::warn!(filename, declared, limit, "upload rejected: too large");
        return (StatusCode::PAYLOAD_TOO_LARGE, "file too large").into_response();
    }

    let meta = TransferMeta {
        id: uuid::Uuid::new_v4().to_string(),
        filename: filename.to_owned(),
        size: declared.and_then(|n| i64::try_from(n).ok()).unwrap_or(-1),
        sha256: header_str(&headers, FILE_SHA256_HEADER)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
    };

    let source = StreamReader::new(capped(body, limit));
    let cancel = state.shutdown.child_token();
    match state.dispatcher.dispatch(&cancel, &meta, source).await {
        Ok(report) => {
            tracing::info!(id = %meta.id, filename = %meta.filename, bytes = report.bytes, "upload dispatched");
            (StatusCode::OK, "ok\n").into_response()
        }
        Err(DispatchError::AgentOffline) => {
            (StatusCode::SERVICE_UNAVAILABLE, "agent offline").into_response()
        }
        Err(DispatchError::Source(e)) if e.kind() == io::ErrorKind::FileTooLarge => {
            tracing::warn!(id = %meta.id, limit, "upload aborted: body over limit");
            (StatusCode::PAYLOAD_TOO_LARGE, "file too large").into_response()
        }
        Err(DispatchError::Cancelled) => {
            tracing::info!(id = %meta.id, "upload aborted by shutdown");
            (StatusCode::BAD_GATEWAY, "upload failed").into_response()
        }
        Err(e) => {
            tracing::error!(id = %meta.id, filename = %meta.filename, "upload failed: {e}");
            (StatusCode::BAD_GATEWAY, "upload failed").into_response()
        }
    }
}

/// Reads `X-File-Name` as UTF-8. Header values may carry non-ASCII bytes,
/// which `HeaderValue::to_str` refuses.
fn file_name(headers: &HeaderMap) -> Result<Option<&str>, std::str::Utf8Error> {
    let Some(value) = headers.get(FILE_NAME_HEADER) else {
        return Ok(None);
    };
    let name = std::str::from_utf8(value.as_bytes())?.trim();
    Ok((!name.is_empty()).then_some(name))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

/// Turns the request body into an I/O stream that fails once more than
/// `limit` bytes arrived (0 means unlimited). Covers bodies without a
/// usable `Content-Length`.
fn capped(
    body: Body,
    limit: u64,
) -> impl futures_util::Stream<Item = io::Result<axum::body::Bytes>> + Unpin {
    let mut seen = 0u64;
    body.into_data_stream().map(move |chunk| {
        let chunk = chunk.map_err(io::Error::other)?;
        seen += chunk.len() as u64;
        if limit > 0 && seen > limit {
            return Err(io::Error::new(
                io::ErrorKind::FileTooLarge,
                "upload exceeds maximum size",
            ));
        }
        Ok(chunk)
    })
}
