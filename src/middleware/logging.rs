//! Logging middleware
//!
//! Logs one line per HTTP request with its outcome and latency.

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;
use log::{info, warn};
use std::net::SocketAddr;
use std::time::Instant;

/// Log a request once its response is ready
pub async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| "-".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();
    if status.is_server_error() {
        warn!("{client} {method} {path} -> {} ({elapsed_ms} ms)", status.as_u16());
    } else {
        info!("{client} {method} {path} -> {} ({elapsed_ms} ms)", status.as_u16());
    }

    response
}
