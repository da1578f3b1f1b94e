//! Request logging middleware.
//!
//! Logs every API request with method, path, response status, latency
//! and the signed-in user, if any.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::ApiContext;

/// Log API access. Reads `ApiContext` from request extensions.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    // Identity at arrival; sign-in and sign-out handlers change it.
    let user = req
        .extensions()
        .get::<ApiContext>()
        .and_then(|ctx| {
            ctx.core
                .read_session()
                .ok()
                .and_then(|s| s.user().map(|u| u.email.clone()))
        })
        .unwrap_or_else(|| "anonymous".to_string());

    let started = Instant::now();
    let response = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        %user,
        "API access"
    );
    response
}
