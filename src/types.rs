//! Core data model: thoughts, scopes, graph labels, identity context, events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a cached thought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThoughtId(pub Uuid);

impl ThoughtId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ThoughtId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThoughtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Visibility domain for a thought, from narrowest to widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryScope {
    User,
    Project,
    Department,
    Client,
    Global,
}

impl MemoryScope {
    /// Graph node type used for scope-membership edges.
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Project => "Project",
            Self::Department => "Department",
            Self::Client => "Client",
            Self::Global => "Global",
        }
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "USER",
            Self::Project => "PROJECT",
            Self::Department => "DEPARTMENT",
            Self::Client => "CLIENT",
            Self::Global => "GLOBAL",
        };
        write!(f, "{s}")
    }
}

/// Sentinel scope id for GLOBAL thoughts.
pub const GLOBAL_SCOPE_ID: &str = "*";

/// A persisted cognitive state: one completed agent computation plus the
/// metadata the retrieval engine ranks and filters on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedThought {
    pub id: ThoughtId,

    /// Dense embedding of `prompt + "\n" + response`, unit L2 norm.
    pub vector: Vec<f32>,

    /// Typed entity labels in `Type:Name` form (e.g., `Project:Apollo`).
    /// Populated asynchronously after ingest; may be empty meanwhile.
    #[serde(default)]
    pub entities: BTreeSet<String>,

    pub scope: MemoryScope,

    /// Scope instance identifier (e.g., `dept_oncology`); `"*"` for GLOBAL.
    pub scope_id: String,

    /// User responsible for creation.
    pub owner_id: String,

    pub prompt_text: String,
    pub reasoning_trace: String,
    pub final_response: String,

    /// Source document identifiers backing this thought, in ingest order.
    #[serde(default)]
    pub source_urns: Vec<String>,

    /// True iff at least one source urn has been reported updated.
    #[serde(default)]
    pub is_stale: bool,

    pub created_at: DateTime<Utc>,

    /// Half-life for retrieval decay, in seconds. Always >= 1.
    pub ttl_seconds: u64,

    /// Roles required to read this thought. Conjunctive: the caller must
    /// hold every listed role.
    #[serde(default)]
    pub access_roles: BTreeSet<String>,
}

impl CachedThought {
    /// Graph node label for this thought.
    pub fn node_label(&self) -> String {
        NodeLabel::thought(self.id)
    }
}

/// Helpers for building `Type:Name` graph node labels.
pub struct NodeLabel;

impl NodeLabel {
    pub fn thought(id: ThoughtId) -> String {
        format!("Thought:{id}")
    }

    pub fn user(user_id: &str) -> String {
        format!("User:{user_id}")
    }

    pub fn project(project_id: &str) -> String {
        format!("Project:{project_id}")
    }

    pub fn scope(scope: MemoryScope, scope_id: &str) -> String {
        format!("{}:{}", scope.node_type(), scope_id)
    }
}

/// Typed relation on a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    Created,
    BelongsTo,
    RelatedTo,
    MentionedIn,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::BelongsTo => "BELONGS_TO",
            Self::RelatedTo => "RELATED_TO",
            Self::MentionedIn => "MENTIONED_IN",
        };
        write!(f, "{s}")
    }
}

/// Per-query identity context supplied by the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub dept_ids: BTreeSet<String>,
    #[serde(default)]
    pub project_ids: BTreeSet<String>,
    #[serde(default)]
    pub client_ids: BTreeSet<String>,
    #[serde(default)]
    pub active_project_id: Option<String>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// Identity-provider event: a user's roles or group memberships changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub user_id: String,
    #[serde(default)]
    pub added_roles: Vec<String>,
    #[serde(default)]
    pub removed_roles: Vec<String>,
    #[serde(default)]
    pub new_dept_ids: Vec<String>,
    #[serde(default)]
    pub old_dept_ids: Vec<String>,
    #[serde(default)]
    pub new_project_ids: Vec<String>,
    #[serde(default)]
    pub old_project_ids: Vec<String>,
}

/// Source-registry event: a source document was updated after ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUpdated {
    pub source_urn: String,
}

/// Which retrieval path produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStrategy {
    ExactHit,
    SemanticHint,
    EntityHop,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ExactHit => "EXACT_HIT",
            Self::SemanticHint => "SEMANTIC_HINT",
            Self::EntityHop => "ENTITY_HOP",
        };
        write!(f, "{s}")
    }
}

/// Emitted to the cost accountant on every non-miss lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHit {
    pub thought_id: ThoughtId,
    pub strategy: MatchStrategy,
    pub estimated_saved_units: f32,
}

/// Emitted after a role-change event has been processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocationSummary {
    pub user_id: String,
    pub retained: usize,
    pub deleted: usize,
    pub retagged: usize,
}
