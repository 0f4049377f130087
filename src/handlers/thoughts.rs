//! Ingest and lookup handlers.

use axum::{extract::State, response::Json};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use super::AppState;
use crate::archive::AddThoughtRequest;
use crate::errors::Result;
use crate::matchmaker::LookupOutcome;
use crate::types::{MemoryScope, ThoughtId, UserContext};

/// Ingest request body.
#[derive(Debug, serde::Deserialize)]
pub struct AddThoughtBody {
    pub prompt: String,
    pub response: String,
    #[serde(default)]
    pub reasoning: Option<String>,
    pub scope: MemoryScope,
    pub scope_id: String,
    pub context: UserContext,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub source_urns: Vec<String>,
    #[serde(default)]
    pub access_roles: BTreeSet<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct AddThoughtResponse {
    pub id: ThoughtId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub ttl_seconds: u64,
}

pub async fn add_thought(
    State(archive): State<AppState>,
    Json(body): Json<AddThoughtBody>,
) -> Result<Json<AddThoughtResponse>> {
    let request = AddThoughtRequest {
        prompt: body.prompt,
        response: body.response,
        reasoning: body.reasoning,
        scope: body.scope,
        scope_id: body.scope_id,
        ttl_seconds: body.ttl_seconds,
        source_urns: body.source_urns,
        access_roles: body.access_roles,
    };

    let thought = archive.add_thought(request, &body.context)?;

    Ok(Json(AddThoughtResponse {
        id: thought.id,
        created_at: thought.created_at,
        ttl_seconds: thought.ttl_seconds,
    }))
}

/// Lookup request body.
#[derive(Debug, serde::Deserialize)]
pub struct LookupBody {
    pub query: String,
    pub context: UserContext,
    /// Optional per-request deadline in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub async fn smart_lookup(
    State(archive): State<AppState>,
    Json(body): Json<LookupBody>,
) -> Json<LookupOutcome> {
    let deadline = body
        .timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let outcome = archive.smart_lookup(&body.query, &body.context, deadline);
    Json(outcome)
}

/// Ranked-retrieval request body.
#[derive(Debug, serde::Deserialize)]
pub struct RetrieveBody {
    pub query: String,
    pub context: UserContext,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub min_score: f32,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, serde::Serialize)]
pub struct RetrievedThought {
    pub id: ThoughtId,
    pub score: f32,
    pub prompt: String,
    pub reasoning_trace: String,
    pub final_response: String,
}

pub async fn retrieve(
    State(archive): State<AppState>,
    Json(body): Json<RetrieveBody>,
) -> Json<Vec<RetrievedThought>> {
    let results = archive.retrieve(&body.query, &body.context, body.limit, body.min_score);

    Json(
        results
            .into_iter()
            .map(|(thought, score)| RetrievedThought {
                id: thought.id,
                score,
                prompt: thought.prompt_text,
                reasoning_trace: thought.reasoning_trace,
                final_response: thought.final_response,
            })
            .collect(),
    )
}
