//! Event ingestion handlers: identity and source-registry webhooks.

use axum::{extract::State, response::Json};

use super::AppState;
use crate::types::{RelocationSummary, RoleUpdate, SourceUpdated};

pub async fn role_update(
    State(archive): State<AppState>,
    Json(event): Json<RoleUpdate>,
) -> Json<RelocationSummary> {
    Json(archive.handle_role_update(&event))
}

#[derive(Debug, serde::Serialize)]
pub struct SourceUpdatedResponse {
    pub flagged: usize,
}

pub async fn source_updated(
    State(archive): State<AppState>,
    Json(event): Json<SourceUpdated>,
) -> Json<SourceUpdatedResponse> {
    let flagged = archive.handle_source_updated(&event);
    Json(SourceUpdatedResponse { flagged })
}
