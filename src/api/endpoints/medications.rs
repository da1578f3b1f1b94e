//! Drug registry lookup for the intake medication field.
//!
//! - `GET /api/medications/search?q=`: autocomplete suggestions
//! - `GET /api/medications/:item_seq`: product detail

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::medications::{DrugDetail, DrugProduct};
use crate::models::Capability;

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub items: Vec<DrugProduct>,
    /// A newer search arrived before this one ran; `items` is empty.
    pub superseded: bool,
}

/// `GET /api/medications/search?q=`
pub async fn search(
    State(ctx): State<ApiContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    ctx.authorize(Capability::CreateCase)?;
    let core = ctx.core.clone();
    let q = query.q;
    let outcome = ctx
        .core
        .drug_search()
        .submit(|| async move { core.drugs().search(&q).await })
        .await;

    Ok(Json(match outcome {
        Some(items) => SearchResponse {
            items,
            superseded: false,
        },
        None => SearchResponse {
            items: vec![],
            superseded: true,
        },
    }))
}

/// `GET /api/medications/:item_seq`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(item_seq): Path<String>,
) -> Result<Json<DrugDetail>, ApiError> {
    ctx.authorize(Capability::CreateCase)?;
    ctx.core
        .drugs()
        .detail(&item_seq)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Drug {item_seq}")))
}
