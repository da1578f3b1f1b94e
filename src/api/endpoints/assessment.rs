use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::Capability;
use crate::pipeline::assessment::ConnectionCheck;

/// `GET /api/assessment/connection`: round trip to the assessment API.
pub async fn connection(State(ctx): State<ApiContext>) -> Result<Json<ConnectionCheck>, ApiError> {
    ctx.authorize(Capability::Settings)?;
    let check = ctx.core.assessor().test_connection().await;
    tracing::info!(success = check.success, "Assessment connection checked");
    Ok(Json(check))
}
