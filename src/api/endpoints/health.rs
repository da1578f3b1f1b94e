//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub authenticated: bool,
    pub model: String,
    pub version: &'static str,
}

/// `GET /api/health`: liveness plus session and model summary.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let authenticated = ctx.core.read_session()?.is_authenticated();

    Ok(Json(HealthResponse {
        status: "ok",
        authenticated,
        model: ctx.core.assessor().model_name().to_string(),
        version: crate::config::APP_VERSION,
    }))
}
