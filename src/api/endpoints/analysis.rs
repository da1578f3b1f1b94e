//! Analysis runs, results and exports for one case.
//!
//! - `POST /api/cases/:id/analysis[?restart=true]`: start a run
//! - `GET /api/cases/:id/analysis`: latest run snapshot
//! - `DELETE /api/cases/:id/analysis`: tear the run down
//! - `GET /api/cases/:id/result`: stored assessment
//! - `GET /api/cases/:id/report.pdf`: assessment as PDF
//! - `GET /api/cases/:id/report.txt`: assessment as plain text for copying
//! - `POST /api/cases/:id/follow-up`: question about the assessment

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::{AssessmentResult, Capability};
use crate::pipeline::RunSnapshot;
use crate::report;

#[derive(Deserialize, Default)]
pub struct StartQuery {
    #[serde(default)]
    pub restart: bool,
}

#[derive(Deserialize)]
pub struct FollowUpRequest {
    pub question: String,
}

#[derive(Serialize)]
pub struct FollowUpResponse {
    pub answer: String,
}

/// `POST /api/cases/:id/analysis`
pub async fn start(
    State(ctx): State<ApiContext>,
    Path(case_id): Path<String>,
    Query(query): Query<StartQuery>,
) -> Result<(StatusCode, Json<RunSnapshot>), ApiError> {
    ctx.authorize(Capability::CreateCase)?;
    let snapshot = ctx.core.start_analysis(&case_id, query.restart)?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// `GET /api/cases/:id/analysis`
pub async fn status(
    State(ctx): State<ApiContext>,
    Path(case_id): Path<String>,
) -> Result<Json<RunSnapshot>, ApiError> {
    ctx.authorize(Capability::ViewCase)?;
    ctx.core
        .runs()
        .snapshot(&case_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No analysis run for {case_id}")))
}

/// `DELETE /api/cases/:id/analysis`
pub async fn abandon(
    State(ctx): State<ApiContext>,
    Path(case_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.authorize(Capability::CreateCase)?;
    if ctx.core.runs().abandon(&case_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No analysis run for {case_id}")))
    }
}

fn stored_result(ctx: &ApiContext, case_id: &str) -> Result<AssessmentResult, ApiError> {
    let conn = ctx.core.conn()?;
    db::load_result(&conn, case_id)?
        .ok_or_else(|| ApiError::NotFound(format!("No result for {case_id}")))
}

/// `GET /api/cases/:id/result`
pub async fn result(
    State(ctx): State<ApiContext>,
    Path(case_id): Path<String>,
) -> Result<Json<AssessmentResult>, ApiError> {
    ctx.authorize(Capability::ViewCase)?;
    stored_result(&ctx, &case_id).map(Json)
}

/// `GET /api/cases/:id/report.pdf`
pub async fn report_pdf(
    State(ctx): State<ApiContext>,
    Path(case_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = ctx.authorize(Capability::Download)?;
    let result = stored_result(&ctx, &case_id)?;
    let bytes = report::render_pdf(&case_id, &result)?;
    let file_name = report::pdf_file_name(&case_id, chrono::Local::now().date_naive());
    tracing::info!(%case_id, user = %user.email, bytes = bytes.len(), "Report exported");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}

/// `GET /api/cases/:id/report.txt`
pub async fn report_text(
    State(ctx): State<ApiContext>,
    Path(case_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.authorize(Capability::Download)?;
    let result = stored_result(&ctx, &case_id)?;
    let text = report::render_text(&case_id, &result);
    let file_name = report::text_file_name(&case_id, chrono::Local::now().date_naive());

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{file_name}\""),
            ),
        ],
        text,
    ))
}

/// `POST /api/cases/:id/follow-up`
pub async fn follow_up(
    State(ctx): State<ApiContext>,
    Path(case_id): Path<String>,
    Json(req): Json<FollowUpRequest>,
) -> Result<Json<FollowUpResponse>, ApiError> {
    ctx.authorize(Capability::ViewCase)?;
    let question = req.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question is empty".into()));
    }
    let result = stored_result(&ctx, &case_id)?;
    let answer = ctx.core.assessor().ask_follow_up(&result, question).await?;
    Ok(Json(FollowUpResponse { answer }))
}
