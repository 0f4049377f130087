//! HTTP handlers.
//!
//! The transport layer is deliberately thin: it deserializes requests,
//! hands them to the archive facade, and maps `ArchiveError` onto
//! structured JSON errors. Identity arrives as a `UserContext` in the
//! request body; the identity provider itself is an external collaborator.

pub mod admin;
pub mod events;
pub mod thoughts;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::archive::ThoughtArchive;

pub type AppState = Arc<ThoughtArchive>;

/// Assemble the full route table.
pub fn build_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(admin::health))
        .route("/api/thoughts", post(thoughts::add_thought))
        .route("/api/lookup", post(thoughts::smart_lookup))
        .route("/api/retrieve", post(thoughts::retrieve))
        .route("/api/events/role-update", post(events::role_update))
        .route("/api/events/source-updated", post(events::source_updated))
        .route("/api/snapshot", post(admin::snapshot))
        .with_state(state)
}
