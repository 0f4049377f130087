//! Health and snapshot handlers.

use axum::{extract::State, response::Json};

use super::AppState;
use crate::archive::ArchiveStats;
use crate::errors::Result;

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub stats: ArchiveStats,
}

pub async fn health(State(archive): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        stats: archive.stats(),
    })
}

#[derive(Debug, serde::Serialize)]
pub struct SnapshotResponse {
    pub saved: bool,
}

pub async fn snapshot(State(archive): State<AppState>) -> Result<Json<SnapshotResponse>> {
    archive.snapshot()?;
    Ok(Json(SnapshotResponse { saved: true }))
}
