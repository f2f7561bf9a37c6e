use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_governor::{governor::GovernorConfigBuilder, GovernorError, GovernorLayer};

/// IP-keyed governor applied to every route
pub type GlobalGovernorLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    Body,
>;

/// Per-IP limit applied ahead of authentication: one token every 60ms,
/// bursting to 1000
pub fn create_global_governor() -> GlobalGovernorLayer {
    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(60)
            .burst_size(1000)
            .finish()
            .expect("global rate limit config is valid"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

/// Render governor rejections with the same JSON body as other errors
pub fn rate_limit_error_handler(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, wait_time.to_string())],
            Json(json!({ "error": format!("Too many requests, retry in {}s", wait_time) })),
        )
            .into_response(),
        GovernorError::UnableToExtractKey => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unable to identify caller" })),
        )
            .into_response(),
        GovernorError::Other { code, msg, .. } => (
            code,
            Json(json!({ "error": msg.unwrap_or_else(|| "Request rejected".to_string()) })),
        )
            .into_response(),
    }
}

/// Per-request access log keyed by client address
///
/// Seat conflicts and quota rejections are routine outcomes under contention
/// and are logged at debug; other failures at warn.
pub async fn log_request(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match status {
        StatusCode::TOO_MANY_REQUESTS => tracing::warn!(
            client_ip = %addr.ip(),
            %method,
            path,
            elapsed_ms,
            "Rate limited"
        ),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => tracing::debug!(
            client_ip = %addr.ip(),
            %method,
            path,
            %status,
            elapsed_ms,
            "Request refused"
        ),
        _ if status.is_client_error() || status.is_server_error() => tracing::warn!(
            client_ip = %addr.ip(),
            %method,
            path,
            %status,
            elapsed_ms,
            "Request failed"
        ),
        _ => tracing::debug!(
            client_ip = %addr.ip(),
            %method,
            path,
            %status,
            elapsed_ms,
            "Request completed"
        ),
    }

    response
}
