//! Relocation manager: reacts to identity and source-registry events.
//!
//! Role changes trigger sanitization of the user's personal thoughts:
//! anything the sensitive-content predicate flags is fully erased from all
//! three indices. Departed departments need no data mutation at all, since
//! access is evaluated against the caller's current context on every read.
//! Source updates flip the stale bit; stale thoughts drop out of lookup but
//! stay in the store for audit.

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::archive::erase_thought;
use crate::config::SanitizerConfig;
use crate::graph_index::GraphIndex;
use crate::sanitize::SensitivePatterns;
use crate::store::ThoughtStore;
use crate::types::{MemoryScope, RelocationSummary, RoleUpdate, SourceUpdated, ThoughtId};
use crate::vector_index::VectorIndex;

pub struct RelocationManager {
    store: Arc<RwLock<ThoughtStore>>,
    vectors: Arc<RwLock<VectorIndex>>,
    graph: Arc<RwLock<GraphIndex>>,
    tombstones: Arc<Mutex<HashSet<ThoughtId>>>,
    sanitizer: SensitivePatterns,
}

impl RelocationManager {
    pub fn new(
        store: Arc<RwLock<ThoughtStore>>,
        vectors: Arc<RwLock<VectorIndex>>,
        graph: Arc<RwLock<GraphIndex>>,
        tombstones: Arc<Mutex<HashSet<ThoughtId>>>,
        sanitizer_config: &SanitizerConfig,
    ) -> Self {
        Self {
            store,
            vectors,
            graph,
            tombstones,
            sanitizer: SensitivePatterns::from_config(sanitizer_config),
        }
    }

    /// Process a role-change event.
    ///
    /// Departed scopes are handled passively: future reads fail the
    /// federation filter because the filter evaluates the current context,
    /// not a stored ACL. The user's personal thoughts get the sanitization
    /// check; sensitive ones are deleted outright.
    pub fn on_role_update(&self, update: &RoleUpdate) -> RelocationSummary {
        let departed: Vec<&String> = update
            .old_dept_ids
            .iter()
            .filter(|d| !update.new_dept_ids.contains(d))
            .collect();
        if !departed.is_empty() {
            debug!(
                user_id = %update.user_id,
                "user left departments {departed:?}; access lapses via the scope filter"
            );
        }

        let personal: Vec<crate::types::CachedThought> = self
            .store
            .read()
            .scan(|t| t.scope == MemoryScope::User && t.owner_id == update.user_id)
            .cloned()
            .collect();

        let mut deleted = 0;
        let mut retained = 0;

        for thought in &personal {
            if self.sanitizer.contains_sensitive(thought) {
                warn!(
                    thought_id = %thought.id,
                    user_id = %update.user_id,
                    "sanitization flagged thought, deleting"
                );
                if erase_thought(
                    &self.store,
                    &self.vectors,
                    &self.graph,
                    &self.tombstones,
                    thought.id,
                ) {
                    deleted += 1;
                }
            } else {
                // USER scope is already keyed to the user; nothing to move.
                retained += 1;
            }
        }

        let summary = RelocationSummary {
            user_id: update.user_id.clone(),
            retained,
            deleted,
            retagged: 0,
        };
        info!(
            user_id = %summary.user_id,
            retained = summary.retained,
            deleted = summary.deleted,
            "relocation complete"
        );
        summary
    }

    /// Flag every thought backed by the updated source as stale. Returns
    /// the number of thoughts newly flagged; reapplying the same event is a
    /// no-op.
    pub fn on_source_updated(&self, event: &SourceUpdated) -> usize {
        let mut store = self.store.write();

        let ids: Vec<ThoughtId> = store
            .scan(|t| !t.is_stale && t.source_urns.iter().any(|u| u == &event.source_urn))
            .map(|t| t.id)
            .collect();

        for id in &ids {
            if let Some(thought) = store.get_mut(id) {
                thought.is_stale = true;
            }
        }

        if !ids.is_empty() {
            info!(
                source_urn = %event.source_urn,
                flagged = ids.len(),
                "source updated, thoughts marked stale"
            );
        }
        ids.len()
    }
}
