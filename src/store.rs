//! Thought store: authoritative record of cached thoughts, plus the JSON
//! snapshot format used for persistence.
//!
//! The store is an in-memory map; durability comes from periodic snapshots
//! written atomically (write to a temp file in the target directory, then
//! rename over the previous snapshot).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::{ArchiveError, Result};
use crate::types::{CachedThought, Relation, ThoughtId};

#[derive(Default)]
pub struct ThoughtStore {
    thoughts: HashMap<ThoughtId, CachedThought>,
}

impl ThoughtStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.thoughts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thoughts.is_empty()
    }

    /// Insert or replace a thought row.
    pub fn put(&mut self, thought: CachedThought) {
        self.thoughts.insert(thought.id, thought);
    }

    pub fn get(&self, id: &ThoughtId) -> Option<&CachedThought> {
        self.thoughts.get(id)
    }

    pub fn get_mut(&mut self, id: &ThoughtId) -> Option<&mut CachedThought> {
        self.thoughts.get_mut(id)
    }

    /// Remove a row. Returns the removed thought, if present.
    pub fn delete(&mut self, id: &ThoughtId) -> Option<CachedThought> {
        self.thoughts.remove(id)
    }

    /// Iterate rows matching a predicate.
    pub fn scan<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a CachedThought>
    where
        P: Fn(&CachedThought) -> bool + 'a,
    {
        self.thoughts.values().filter(move |t| predicate(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedThought> {
        self.thoughts.values()
    }
}

/// On-disk snapshot: thought rows plus the graph edge list. The vector
/// matrix is not stored separately; vectors live on the rows and the vector
/// index is rebuilt on load.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub thoughts: Vec<CachedThought>,
    pub edges: Vec<(String, Relation, String)>,
}

impl SnapshotFile {
    /// Write the snapshot atomically: serialize to a temp file in the target
    /// directory, fsync, then rename over the destination.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_vec_pretty(self)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| ArchiveError::StorageError(e.to_string()))?;

        info!(
            "Snapshot saved: {} thoughts, {} edges -> {:?}",
            self.thoughts.len(),
            self.edges.len(),
            path
        );
        Ok(())
    }

    /// Load a snapshot. A missing file is not an error: the archive starts
    /// empty, matching first-boot behavior.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            warn!("Snapshot file {:?} not found, starting empty", path);
            return Ok(None);
        }

        let bytes = std::fs::read(path)?;
        let snapshot: SnapshotFile = serde_json::from_slice(&bytes)?;

        info!(
            "Snapshot loaded: {} thoughts, {} edges from {:?}",
            snapshot.thoughts.len(),
            snapshot.edges.len(),
            path
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryScope;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn thought(owner: &str) -> CachedThought {
        CachedThought {
            id: ThoughtId::new(),
            vector: vec![1.0, 0.0],
            entities: BTreeSet::new(),
            scope: MemoryScope::User,
            scope_id: owner.to_string(),
            owner_id: owner.to_string(),
            prompt_text: "p".to_string(),
            reasoning_trace: "r".to_string(),
            final_response: "f".to_string(),
            source_urns: vec![],
            is_stale: false,
            created_at: Utc::now(),
            ttl_seconds: 86_400,
            access_roles: BTreeSet::new(),
        }
    }

    #[test]
    fn test_put_get_delete() {
        let mut store = ThoughtStore::new();
        let t = thought("u1");
        let id = t.id;

        store.put(t);
        assert!(store.get(&id).is_some());

        let removed = store.delete(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(store.get(&id).is_none());
        assert!(store.delete(&id).is_none());
    }

    #[test]
    fn test_scan_filters() {
        let mut store = ThoughtStore::new();
        store.put(thought("u1"));
        store.put(thought("u1"));
        store.put(thought("u2"));

        let count = store.scan(|t| t.owner_id == "u1").count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");

        let t = thought("u1");
        let id = t.id;
        let snapshot = SnapshotFile {
            thoughts: vec![t],
            edges: vec![(
                format!("Thought:{id}"),
                Relation::Created,
                "User:u1".to_string(),
            )],
        };

        snapshot.save(&path).unwrap();
        let loaded = SnapshotFile::load(&path).unwrap().unwrap();

        assert_eq!(loaded.thoughts.len(), 1);
        assert_eq!(loaded.thoughts[0].id, id);
        assert_eq!(loaded.edges.len(), 1);
        assert_eq!(loaded.edges[0].1, Relation::Created);
    }

    #[test]
    fn test_snapshot_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nope.json");
        assert!(SnapshotFile::load(&path).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_overwrites_previous() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");

        SnapshotFile {
            thoughts: vec![thought("u1")],
            edges: vec![],
        }
        .save(&path)
        .unwrap();

        SnapshotFile {
            thoughts: vec![thought("u1"), thought("u2")],
            edges: vec![],
        }
        .save(&path)
        .unwrap();

        let loaded = SnapshotFile::load(&path).unwrap().unwrap();
        assert_eq!(loaded.thoughts.len(), 2);
    }
}
