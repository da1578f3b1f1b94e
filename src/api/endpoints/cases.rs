//! Intake cases.
//!
//! - `POST /api/cases`: validate and store an intake submission
//! - `GET /api/cases`: list stored cases, newest first
//! - `GET /api/cases/:id`: one case

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::{Capability, Case, CaseDraft, RiskLevel};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCase {
    pub case_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub id: String,
    pub chief_complaint: String,
    pub age_group: String,
    pub created_at: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub risk_score: Option<u8>,
}

/// `POST /api/cases`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(draft): Json<CaseDraft>,
) -> Result<(StatusCode, Json<CreatedCase>), ApiError> {
    let user = ctx.authorize(Capability::CreateCase)?;
    let case = ctx.core.create_case(draft)?;
    tracing::info!(case_id = %case.id, user = %user.email, "Intake submitted");
    Ok((StatusCode::CREATED, Json(CreatedCase { case_id: case.id })))
}

/// `GET /api/cases`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<CaseSummary>>, ApiError> {
    ctx.authorize(Capability::ViewCase)?;
    let conn = ctx.core.conn()?;

    let mut summaries = Vec::new();
    for id in db::list_case_ids(&conn)? {
        let Some(case) = db::load_case(&conn, &id)? else {
            continue;
        };
        let result = db::load_result(&conn, &id)?;
        summaries.push(CaseSummary {
            id,
            chief_complaint: case.chief_complaint,
            age_group: case.age_group,
            created_at: case.created_at,
            risk_level: result.as_ref().map(|r| r.risk_level),
            risk_score: result.as_ref().map(|r| r.risk_score),
        });
    }
    // Ids embed the creation time, so reverse lexical order is newest first
    // for ids of equal length.
    summaries.sort_by(|a, b| b.id.len().cmp(&a.id.len()).then_with(|| b.id.cmp(&a.id)));
    Ok(Json(summaries))
}

/// `GET /api/cases/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(case_id): Path<String>,
) -> Result<Json<Case>, ApiError> {
    ctx.authorize(Capability::ViewCase)?;
    let case = ctx
        .core
        .load_case(&case_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Case {case_id}")))?;
    Ok(Json(case))
}
