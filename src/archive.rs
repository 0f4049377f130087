//! The archive facade: composition root over the three indices.
//!
//! Owns the thought store, vector index, and graph index behind their own
//! reader-writer locks, and orchestrates the two core flows:
//!
//! - ingest (`add_thought`): validate, embed with retry, then one atomic
//!   multi-index update under write locks
//! - lookup (`smart_lookup`): embed, candidate search, federation filter,
//!   graph boost, decay, classification, hit event
//!
//! Long work (embedding, entity extraction) always happens outside the lock
//! critical sections. Multi-index writers take the locks in a fixed order
//! (store, vector, graph) so writes cannot deadlock.

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::accounting::CostAccountant;
use crate::config::ArchiveConfig;
use crate::embeddings::{l2_normalize, Embedder};
use crate::errors::{ArchiveError, Result};
use crate::extraction::EntityExtractor;
use crate::federation::FederationBroker;
use crate::graph_index::GraphIndex;
use crate::matchmaker::{self, LookupOutcome, ScoredCandidate};
use crate::relocation::RelocationManager;
use crate::runner::TaskRunner;
use crate::store::{SnapshotFile, ThoughtStore};
use crate::types::{
    CacheHit, CachedThought, MatchStrategy, MemoryScope, NodeLabel, Relation, RelocationSummary,
    RoleUpdate, SourceUpdated, ThoughtId, UserContext,
};
use crate::vector_index::VectorIndex;

/// Ingest payload for [`ThoughtArchive::add_thought`].
#[derive(Debug, Clone)]
pub struct AddThoughtRequest {
    pub prompt: String,
    pub response: String,
    /// Reasoning trace; defaults to the response when the caller captured
    /// no separate trace.
    pub reasoning: Option<String>,
    pub scope: MemoryScope,
    pub scope_id: String,
    /// Decay half-life; per-scope default applies when absent.
    pub ttl_seconds: Option<u64>,
    pub source_urns: Vec<String>,
    pub access_roles: BTreeSet<String>,
}

impl AddThoughtRequest {
    pub fn new(
        prompt: impl Into<String>,
        response: impl Into<String>,
        scope: MemoryScope,
        scope_id: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            reasoning: None,
            scope,
            scope_id: scope_id.into(),
            ttl_seconds: None,
            source_urns: Vec::new(),
            access_roles: BTreeSet::new(),
        }
    }
}

/// Counters for the health endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ArchiveStats {
    pub thoughts: usize,
    pub vectors: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
}

pub struct ThoughtArchive {
    config: ArchiveConfig,

    store: Arc<RwLock<ThoughtStore>>,
    vectors: Arc<RwLock<VectorIndex>>,
    graph: Arc<RwLock<GraphIndex>>,

    embedder: Arc<dyn Embedder>,
    extractor: Option<Arc<dyn EntityExtractor>>,
    runner: Arc<dyn TaskRunner>,
    accountant: Arc<dyn CostAccountant>,

    relocation: RelocationManager,

    /// Deleted ids; consulted by the extractor-completion path so a late
    /// callback for a removed thought becomes a no-op.
    tombstones: Arc<Mutex<HashSet<ThoughtId>>>,

    /// Query embedding cache, keyed by SHA-256 of the query text. Stable
    /// across restarts and safe under concurrent lookups.
    query_cache: moka::sync::Cache<[u8; 32], Vec<f32>>,

    /// Floor for issued `created_at` values; keeps timestamps strictly
    /// monotonic even if the wall clock steps backwards.
    clock_floor: Mutex<DateTime<Utc>>,
}

impl ThoughtArchive {
    pub fn new(
        config: ArchiveConfig,
        embedder: Arc<dyn Embedder>,
        extractor: Option<Arc<dyn EntityExtractor>>,
        runner: Arc<dyn TaskRunner>,
        accountant: Arc<dyn CostAccountant>,
    ) -> Self {
        let store = Arc::new(RwLock::new(ThoughtStore::new()));
        let vectors = Arc::new(RwLock::new(VectorIndex::new(config.dimension)));
        let graph = Arc::new(RwLock::new(GraphIndex::new()));
        let tombstones = Arc::new(Mutex::new(HashSet::new()));

        let relocation = RelocationManager::new(
            Arc::clone(&store),
            Arc::clone(&vectors),
            Arc::clone(&graph),
            Arc::clone(&tombstones),
            &config.sanitizer,
        );

        let query_cache = moka::sync::Cache::new(config.query_cache_capacity);

        Self {
            config,
            store,
            vectors,
            graph,
            embedder,
            extractor,
            runner,
            accountant,
            relocation,
            tombstones,
            query_cache,
            clock_floor: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    // ========================================================================
    // INGEST
    // ========================================================================

    /// Ingest a new thought: validate, embed, persist to all three indices
    /// atomically, then schedule entity extraction off the request path.
    pub fn add_thought(
        &self,
        request: AddThoughtRequest,
        ctx: &UserContext,
    ) -> Result<CachedThought> {
        self.validate_request(&request, ctx)?;

        let combined = format!("{}\n{}", request.prompt, request.response);
        let mut vector = self.embed_with_retry(&combined)?;

        if vector.len() != self.config.dimension {
            return Err(ArchiveError::invalid(
                "vector",
                format!(
                    "embedder returned dimension {}, expected {}",
                    vector.len(),
                    self.config.dimension
                ),
            ));
        }
        if !l2_normalize(&mut vector) {
            return Err(ArchiveError::EmbeddingFailed(
                "embedding has zero norm".to_string(),
            ));
        }

        let ttl_seconds = request
            .ttl_seconds
            .unwrap_or_else(|| self.config.scope_ttls.for_scope(request.scope));

        let thought = CachedThought {
            id: ThoughtId::new(),
            vector: vector.clone(),
            entities: BTreeSet::new(),
            scope: request.scope,
            scope_id: request.scope_id.clone(),
            owner_id: ctx.user_id.clone(),
            prompt_text: request.prompt.clone(),
            reasoning_trace: request
                .reasoning
                .clone()
                .unwrap_or_else(|| request.response.clone()),
            final_response: request.response.clone(),
            source_urns: request.source_urns.clone(),
            is_stale: false,
            created_at: self.next_created_at(),
            ttl_seconds,
            access_roles: request.access_roles.clone(),
        };

        // Atomic multi-index insert. Lock order: store, vector, graph.
        {
            let mut store = self.store.write();
            let mut vectors = self.vectors.write();
            let mut graph = self.graph.write();

            vectors.insert(thought.id, vector)?;
            store.put(thought.clone());

            let node = thought.node_label();
            graph.add_node(&node);
            graph.add_edge(&node, Relation::Created, &NodeLabel::user(&thought.owner_id));
            graph.add_edge(
                &node,
                Relation::BelongsTo,
                &NodeLabel::scope(thought.scope, &thought.scope_id),
            );
        }

        debug!(thought_id = %thought.id, scope = %thought.scope, "thought ingested");

        self.schedule_extraction(thought.id, combined);

        Ok(thought)
    }

    fn validate_request(&self, request: &AddThoughtRequest, ctx: &UserContext) -> Result<()> {
        if request.prompt.trim().is_empty() {
            return Err(ArchiveError::invalid("prompt", "must not be empty"));
        }
        if request.response.trim().is_empty() {
            return Err(ArchiveError::invalid("response", "must not be empty"));
        }
        if request.scope_id.is_empty() {
            return Err(ArchiveError::invalid("scope_id", "must not be empty"));
        }
        if let Some(ttl) = request.ttl_seconds {
            if ttl < 1 {
                return Err(ArchiveError::invalid("ttl_seconds", "must be >= 1"));
            }
        }
        if ctx.user_id.is_empty() {
            return Err(ArchiveError::invalid("context", "user_id must not be empty"));
        }

        if !FederationBroker::can_write(ctx, request.scope, &request.scope_id) {
            return Err(ArchiveError::AccessDenied(format!(
                "user {} may not write under {}:{}",
                ctx.user_id, request.scope, request.scope_id
            )));
        }

        Ok(())
    }

    fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 0u32;
        loop {
            match self.embedder.embed(text) {
                Ok(vector) => return Ok(vector),
                Err(e) if attempt < self.config.embed_retries => {
                    let backoff = self.config.embed_backoff_ms << attempt;
                    let jitter = rand::random::<u64>() % (backoff / 2 + 1);
                    warn!(
                        "embedding attempt {} failed, retrying in {}ms: {e}",
                        attempt + 1,
                        backoff + jitter
                    );
                    std::thread::sleep(std::time::Duration::from_millis(backoff + jitter));
                    attempt += 1;
                }
                Err(e) => return Err(ArchiveError::EmbeddingFailed(e.to_string())),
            }
        }
    }

    /// Issue a `created_at` that is strictly later than every previously
    /// issued one.
    fn next_created_at(&self) -> DateTime<Utc> {
        let mut floor = self.clock_floor.lock();
        let now = Utc::now();
        let ts = if now > *floor {
            now
        } else {
            *floor + Duration::microseconds(1)
        };
        *floor = ts;
        ts
    }

    fn schedule_extraction(&self, id: ThoughtId, text: String) {
        let Some(extractor) = self.extractor.clone() else {
            return;
        };

        let store = Arc::clone(&self.store);
        let graph = Arc::clone(&self.graph);
        let tombstones = Arc::clone(&self.tombstones);

        self.runner.submit(Box::new(move || {
            let entities = match extractor.extract(&text) {
                Ok(entities) => entities,
                Err(e) => {
                    // No retry; the thought stays queryable with no entities.
                    warn!(thought_id = %id, "entity extraction failed: {e}");
                    return;
                }
            };

            if tombstones.lock().contains(&id) {
                debug!(thought_id = %id, "extraction completed after delete, dropping");
                return;
            }

            let mut store = store.write();
            let mut graph = graph.write();

            let Some(thought) = store.get_mut(&id) else {
                return;
            };

            let node = NodeLabel::thought(id);
            for entity in &entities {
                graph.add_node(entity);
                graph.add_edge(&node, Relation::MentionedIn, entity);
            }
            thought.entities = entities;
        }));
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    /// The lookup-vs-compute decision. Returns MISS (without emitting a hit
    /// event) on embedding failure or deadline expiry rather than surfacing
    /// an error to the query path.
    pub fn smart_lookup(
        &self,
        query: &str,
        ctx: &UserContext,
        deadline: Option<Instant>,
    ) -> LookupOutcome {
        let Some(query_vector) = self.embed_query(query) else {
            return LookupOutcome::Miss;
        };

        let query_entities = self.extract_query_entities(query);

        if expired(deadline) {
            return LookupOutcome::Miss;
        }

        let hits = self
            .vectors
            .read()
            .search(&query_vector, self.config.candidate_k);

        if expired(deadline) {
            return LookupOutcome::Miss;
        }

        // Federation filter + staleness, cloning survivors out of the lock.
        let survivors: Vec<(CachedThought, f32)> = {
            let store = self.store.read();
            hits.into_iter()
                .filter_map(|(id, similarity)| {
                    let thought = store.get(&id)?;
                    if thought.is_stale || !FederationBroker::can_read(ctx, thought) {
                        return None;
                    }
                    Some((thought.clone(), similarity))
                })
                .collect()
        };

        if expired(deadline) {
            return LookupOutcome::Miss;
        }

        let boosted: Vec<bool> = {
            let graph = self.graph.read();
            survivors
                .iter()
                .map(|(thought, _)| match &ctx.active_project_id {
                    Some(project) => graph.linked(
                        &thought.node_label(),
                        &NodeLabel::project(project),
                        self.config.boost_max_hops,
                    ),
                    None => false,
                })
                .collect()
        };

        if expired(deadline) {
            return LookupOutcome::Miss;
        }

        let now = Utc::now();
        let mut candidates: Vec<ScoredCandidate> = survivors
            .into_iter()
            .zip(boosted)
            .map(|((thought, similarity), linked)| {
                let score =
                    matchmaker::score_candidate(similarity, linked, &thought, &self.config, now);
                ScoredCandidate {
                    thought,
                    similarity,
                    boosted: linked,
                    score,
                }
            })
            .collect();

        matchmaker::rank(&mut candidates);
        let outcome = matchmaker::classify(&candidates, &query_entities, &self.config);

        if let (Some(strategy), Some(thought_id)) = (outcome.strategy(), outcome.thought_id()) {
            let saved = match strategy {
                MatchStrategy::ExactHit => self.config.saved_units.exact_hit,
                MatchStrategy::SemanticHint => self.config.saved_units.semantic_hint,
                MatchStrategy::EntityHop => self.config.saved_units.entity_hop,
            };
            self.accountant.record_hit(&CacheHit {
                thought_id,
                strategy,
                estimated_saved_units: saved,
            });
        }

        outcome
    }

    /// Ranked retrieval under the same fused scoring, without the
    /// classification step. Scores below `min_score` are dropped.
    pub fn retrieve(
        &self,
        query: &str,
        ctx: &UserContext,
        limit: usize,
        min_score: f32,
    ) -> Vec<(CachedThought, f32)> {
        let Some(query_vector) = self.embed_query(query) else {
            return Vec::new();
        };

        let hits = self
            .vectors
            .read()
            .search(&query_vector, self.config.candidate_k.max(limit));

        let survivors: Vec<(CachedThought, f32)> = {
            let store = self.store.read();
            hits.into_iter()
                .filter_map(|(id, similarity)| {
                    let thought = store.get(&id)?;
                    if thought.is_stale || !FederationBroker::can_read(ctx, thought) {
                        return None;
                    }
                    Some((thought.clone(), similarity))
                })
                .collect()
        };

        let now = Utc::now();
        let mut candidates: Vec<ScoredCandidate> = {
            let graph = self.graph.read();
            survivors
                .into_iter()
                .map(|(thought, similarity)| {
                    let linked = ctx.active_project_id.as_ref().is_some_and(|project| {
                        graph.linked(
                            &thought.node_label(),
                            &NodeLabel::project(project),
                            self.config.boost_max_hops,
                        )
                    });
                    let score = matchmaker::score_candidate(
                        similarity,
                        linked,
                        &thought,
                        &self.config,
                        now,
                    );
                    ScoredCandidate {
                        thought,
                        similarity,
                        boosted: linked,
                        score,
                    }
                })
                .collect()
        };

        matchmaker::rank(&mut candidates);
        candidates
            .into_iter()
            .filter(|c| c.score >= min_score)
            .take(limit)
            .map(|c| (c.thought, c.score))
            .collect()
    }

    /// Fetch a single thought through the federation filter. Stale thoughts
    /// are returned (they stay readable for audit); out-of-scope ones are
    /// not.
    pub fn get_thought(&self, id: ThoughtId, ctx: &UserContext) -> Result<CachedThought> {
        let store = self.store.read();
        let thought = store
            .get(&id)
            .ok_or_else(|| ArchiveError::NotFound(id.to_string()))?;

        if !FederationBroker::can_read(ctx, thought) {
            return Err(ArchiveError::AccessDenied(format!(
                "user {} may not read thought {id}",
                ctx.user_id
            )));
        }

        Ok(thought.clone())
    }

    fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let key: [u8; 32] = Sha256::digest(query.as_bytes()).into();
        if let Some(cached) = self.query_cache.get(&key) {
            return Some(cached);
        }

        // Lookup does not retry: a transient embedder failure degrades to
        // MISS and the agent computes fresh.
        let mut vector = match self.embedder.embed(query) {
            Ok(v) => v,
            Err(e) => {
                warn!("query embedding failed, returning miss: {e}");
                return None;
            }
        };
        if vector.len() != self.config.dimension || !l2_normalize(&mut vector) {
            warn!("query embedding unusable (dimension or norm), returning miss");
            return None;
        }

        self.query_cache.insert(key, vector.clone());
        Some(vector)
    }

    fn extract_query_entities(&self, query: &str) -> BTreeSet<String> {
        match &self.extractor {
            Some(extractor) => extractor.extract(query).unwrap_or_default(),
            None => BTreeSet::new(),
        }
    }

    // ========================================================================
    // MUTATION & EVENTS
    // ========================================================================

    /// Remove a thought from every index. Idempotent; returns whether a row
    /// was actually removed.
    pub fn remove_thought(&self, id: ThoughtId) -> bool {
        erase_thought(&self.store, &self.vectors, &self.graph, &self.tombstones, id)
    }

    /// Process an identity role-change event.
    pub fn handle_role_update(&self, update: &RoleUpdate) -> RelocationSummary {
        self.relocation.on_role_update(update)
    }

    /// Process a source-registry update event. Returns how many thoughts
    /// were newly marked stale.
    pub fn handle_source_updated(&self, event: &SourceUpdated) -> usize {
        self.relocation.on_source_updated(event)
    }

    /// Drop thoughts that have outlived their usefulness: elapsed time
    /// beyond `sweep_after_half_lives` half-lives. Disabled when the config
    /// knob is `None`.
    pub fn sweep_expired(&self) -> usize {
        let Some(half_lives) = self.config.sweep_after_half_lives else {
            return 0;
        };

        let now = Utc::now();
        let expired_ids: Vec<ThoughtId> = self
            .store
            .read()
            .scan(|t| {
                let elapsed = now.signed_duration_since(t.created_at).num_seconds() as f64;
                elapsed > t.ttl_seconds as f64 * half_lives
            })
            .map(|t| t.id)
            .collect();

        let mut removed = 0;
        for id in expired_ids {
            if self.remove_thought(id) {
                removed += 1;
            }
        }

        if removed > 0 {
            info!("expiry sweep removed {removed} thoughts");
        }
        removed
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    pub fn stats(&self) -> ArchiveStats {
        let store = self.store.read();
        let vectors = self.vectors.read();
        let graph = self.graph.read();
        ArchiveStats {
            thoughts: store.len(),
            vectors: vectors.len(),
            graph_nodes: graph.node_count(),
            graph_edges: graph.edge_count(),
        }
    }

    /// Write the current state to the configured snapshot path.
    pub fn snapshot(&self) -> Result<()> {
        let snapshot = {
            let store = self.store.read();
            let graph = self.graph.read();

            let mut thoughts: Vec<CachedThought> = store.iter().cloned().collect();
            thoughts.sort_by_key(|t| (t.created_at, t.id));

            SnapshotFile {
                thoughts,
                edges: graph.edges(),
            }
        };

        snapshot.save(&self.config.snapshot_path)
    }

    /// Restore state from the configured snapshot path, replacing all three
    /// indices. Returns the number of thoughts restored; a missing file
    /// restores nothing.
    pub fn load_snapshot(&self) -> Result<usize> {
        let Some(snapshot) = SnapshotFile::load(&self.config.snapshot_path)? else {
            return Ok(0);
        };

        let mut new_store = ThoughtStore::new();
        let mut new_vectors = VectorIndex::new(self.config.dimension);
        let mut new_graph = GraphIndex::new();

        for (from, relation, to) in &snapshot.edges {
            new_graph.add_edge(from, *relation, to);
        }

        let mut max_created = DateTime::<Utc>::MIN_UTC;
        for thought in snapshot.thoughts {
            validate_row(&thought, self.config.dimension)?;

            // Invariant: every restored thought has its node and CREATED
            // edge in the graph; a snapshot violating that is unusable.
            let node = thought.node_label();
            if !new_graph.has_edge(&node, Relation::Created, &NodeLabel::user(&thought.owner_id)) {
                return Err(ArchiveError::IndexInconsistency(format!(
                    "snapshot missing CREATED edge for thought {}",
                    thought.id
                )));
            }

            new_vectors.insert(thought.id, thought.vector.clone())?;
            max_created = max_created.max(thought.created_at);
            new_store.put(thought);
        }

        let restored = new_store.len();

        {
            let mut store = self.store.write();
            let mut vectors = self.vectors.write();
            let mut graph = self.graph.write();
            *store = new_store;
            *vectors = new_vectors;
            *graph = new_graph;
        }

        let mut floor = self.clock_floor.lock();
        if max_created > *floor {
            *floor = max_created;
        }

        info!("restored {restored} thoughts from snapshot");
        Ok(restored)
    }
}

/// Erase a thought from every index in one critical section. Lock order:
/// store, vector, graph.
pub(crate) fn erase_thought(
    store: &RwLock<ThoughtStore>,
    vectors: &RwLock<VectorIndex>,
    graph: &RwLock<GraphIndex>,
    tombstones: &Mutex<HashSet<ThoughtId>>,
    id: ThoughtId,
) -> bool {
    let mut store = store.write();
    let mut vectors = vectors.write();
    let mut graph = graph.write();

    let removed = store.delete(&id).is_some();
    if removed {
        vectors.remove(&id);
        graph.remove_node(&NodeLabel::thought(id));
    }
    tombstones.lock().insert(id);

    removed
}

/// Validator contract for persisted rows.
fn validate_row(thought: &CachedThought, dimension: usize) -> Result<()> {
    if thought.vector.len() != dimension {
        return Err(ArchiveError::IndexInconsistency(format!(
            "thought {} has vector dimension {}, expected {dimension}",
            thought.id,
            thought.vector.len()
        )));
    }
    if thought.ttl_seconds < 1 {
        return Err(ArchiveError::IndexInconsistency(format!(
            "thought {} has non-positive ttl",
            thought.id
        )));
    }
    let norm: f32 = thought.vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if (norm - 1.0).abs() > 1e-4 {
        return Err(ArchiveError::IndexInconsistency(format!(
            "thought {} vector norm {norm} is not unit",
            thought.id
        )));
    }
    Ok(())
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
