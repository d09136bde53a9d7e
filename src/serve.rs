//! Purpose: Provide the HTTP/JSON conversion service for mediconv.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based loopback server wrapping `FormatConverter`.
//! Invariants: Error envelopes are `{ "error": { kind, message, ... } }`; kinds remain stable.
//! Invariants: Loopback-only unless explicitly allowed.
//! Notes: Conversion is synchronous and runs inside the handler; there is no I/O in decoding.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;

use mediconv::api::{ContentType, Error, ErrorKind, FormatConverter, detect_format};

use crate::conversion_json;

/// Media types that say nothing about the payload; treated like a missing header.
const GENERIC_CONTENT_TYPES: [&str; 3] = [
    "application/octet-stream",
    "text/plain",
    "application/x-www-form-urlencoded",
];

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
}

struct AppState {
    converter: Arc<FormatConverter>,
}

pub async fn serve(config: ServeConfig, converter: Arc<FormatConverter>) -> Result<(), Error> {
    validate_config(&config)?;

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let app = router(Arc::new(AppState { converter }), max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    tracing::info!(bind = %config.bind, "mediconv server listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/convert", post(convert))
        .route("/v1/detect", post(detect))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 4194304."));
    }

    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

async fn convert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let input = match body_text(&body) {
        Ok(input) => input,
        Err(err) => return error_response(err),
    };
    let content_type = request_content_type(&headers);
    match state.converter.to_json_detected(input, content_type) {
        Ok(conversion) => json_response(conversion_json(conversion, None)),
        Err(err) => {
            tracing::debug!(kind = ?err.kind(), error = %err, "conversion failed");
            error_response(err)
        }
    }
}

async fn detect(body: Bytes) -> Response {
    let input = match body_text(&body) {
        Ok(input) => input,
        Err(err) => return error_response(err),
    };
    let format = detect_format(input);
    json_response(json!({
        "format": format.as_str(),
        "content_type": format.content_type().map(ContentType::as_str),
        "editor_language": format.editor_language().as_str(),
    }))
}

fn body_text(body: &Bytes) -> Result<&str, Error> {
    std::str::from_utf8(body).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("request body must be UTF-8 text")
            .with_source(err)
    })
}

fn request_content_type(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let media_type = value.split(';').next().unwrap_or_default().trim();
    if media_type.is_empty()
        || GENERIC_CONTENT_TYPES
            .iter()
            .any(|generic| media_type.eq_ignore_ascii_case(generic))
    {
        return None;
    }
    Some(value)
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
}

fn json_response(payload: serde_json::Value) -> Response {
    let mut response = Json(payload).into_response();
    response
        .headers_mut()
        .insert("mediconv-version", HeaderValue::from_static("1"));
    response
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Parse => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Unsupported => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
            line: err.line(),
        },
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("mediconv-version", HeaderValue::from_static("1"));
    response
}
