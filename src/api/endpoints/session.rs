//! Sign-in, sign-out and consent.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::capabilities_for;
use crate::models::Capability;
use crate::session::{SessionContext, User};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: Option<User>,
    pub consented: bool,
    pub consented_at: Option<String>,
    pub capabilities: Vec<Capability>,
}

impl SessionResponse {
    fn from_session(session: &SessionContext) -> Self {
        Self {
            user: session.user().cloned(),
            consented: session.has_consented(),
            consented_at: session.consented_at().map(str::to_string),
            capabilities: session
                .user()
                .map(|u| capabilities_for(u.role).to_vec())
                .unwrap_or_default(),
        }
    }
}

/// `GET /api/session`
pub async fn current(State(ctx): State<ApiContext>) -> Result<Json<SessionResponse>, ApiError> {
    let session = ctx.core.read_session()?;
    Ok(Json(SessionResponse::from_session(&session)))
}

/// `POST /api/session/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let conn = ctx.core.conn()?;
    let mut session = ctx.core.write_session()?;
    session.login(&conn, &req.email, &req.password)?;
    Ok(Json(SessionResponse::from_session(&session)))
}

/// `POST /api/session/logout`
pub async fn logout(State(ctx): State<ApiContext>) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.conn()?;
    ctx.core.write_session()?.logout(&conn)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/session/consent`
pub async fn consent(State(ctx): State<ApiContext>) -> Result<Json<SessionResponse>, ApiError> {
    let conn = ctx.core.conn()?;
    let mut session = ctx.core.write_session()?;
    session.accept_consent(&conn)?;
    tracing::info!("Consent recorded");
    Ok(Json(SessionResponse::from_session(&session)))
}
