//! Public tracking endpoint. No authentication: a tracking id is the capability.

use crate::{
    api::AppState,
    core::tracking::{self, TrackingInfo},
    errors::Result,
};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub id: Option<String>,
}

/// `GET /track?id=<trackingId>`
pub async fn track(
    State(state): State<AppState>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<TrackingInfo>> {
    let info = tracking::track(&state.db, query.id.as_deref().unwrap_or_default()).await?;
    Ok(Json(info))
}
