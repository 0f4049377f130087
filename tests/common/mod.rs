//! Shared test fixtures: a controllable stub embedder and an archive
//! builder wired to deterministic components.
#![allow(dead_code)]

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use thought_archive::accounting::RecordingAccountant;
use thought_archive::archive::{AddThoughtRequest, ThoughtArchive};
use thought_archive::config::ArchiveConfig;
use thought_archive::embeddings::Embedder;
use thought_archive::extraction::PatternExtractor;
use thought_archive::runner::ManualTaskRunner;
use thought_archive::types::{MemoryScope, UserContext};

pub const DIM: usize = 8;

/// Embedder with an explicit text -> vector table. Unmapped text falls back
/// to a deterministic hash-derived unit vector.
pub struct StubEmbedder {
    map: Mutex<HashMap<String, Vec<f32>>>,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Register a vector for a text; normalized on insert.
    pub fn map(&self, text: &str, vector: Vec<f32>) {
        self.map.lock().insert(text.to_string(), normalize(vector));
    }

    /// Register a vector verbatim, without normalizing it first.
    pub fn map_raw(&self, text: &str, vector: Vec<f32>) {
        self.map.lock().insert(text.to_string(), vector);
    }

    /// Map both the bare prompt and the ingest-combined `prompt\nresponse`
    /// text to the same vector, so an exact prompt re-ask scores 1.0.
    pub fn map_thought(&self, prompt: &str, response: &str, vector: Vec<f32>) {
        let v = normalize(vector);
        self.map.lock().insert(prompt.to_string(), v.clone());
        self.map.lock().insert(format!("{prompt}\n{response}"), v);
    }
}

impl Embedder for StubEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if let Some(v) = self.map.lock().get(text) {
            return Ok(v.clone());
        }

        let digest = Sha256::digest(text.as_bytes());
        let v: Vec<f32> = digest[..DIM].iter().map(|b| *b as f32 - 127.5).collect();
        Ok(normalize(v))
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

/// Embedder that always fails, for degradation tests.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding backend unavailable")
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

pub fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in v.iter_mut() {
        *x /= norm;
    }
    v
}

/// A unit vector along the given axis.
pub fn axis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i] = 1.0;
    v
}

/// A unit vector whose cosine with `axis(0)` is exactly `cos`.
pub fn with_cosine(cos: f32) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = cos;
    v[1] = (1.0 - cos * cos).sqrt();
    v
}

pub struct TestArchive {
    pub archive: ThoughtArchive,
    pub embedder: Arc<StubEmbedder>,
    pub runner: Arc<ManualTaskRunner>,
    pub accountant: Arc<RecordingAccountant>,
}

pub fn test_config(snapshot_dir: &Path) -> ArchiveConfig {
    let mut config = ArchiveConfig::default();
    config.dimension = DIM;
    config.snapshot_path = snapshot_dir.join("snapshot.json");
    config.embed_backoff_ms = 1;
    config.sanitizer.extra_patterns = vec!["Secret R&D Formula".to_string()];
    config
}

/// Archive wired to the stub embedder, a manual task runner (drain to
/// complete entity extraction), and a recording accountant. The extractor
/// knows the "Drug Z" phrase used by the entity-hop scenarios.
pub fn build_archive(snapshot_dir: &Path) -> TestArchive {
    build_archive_with_config(test_config(snapshot_dir))
}

pub fn build_archive_with_config(config: ArchiveConfig) -> TestArchive {
    let embedder = Arc::new(StubEmbedder::new());
    let runner = Arc::new(ManualTaskRunner::new());
    let accountant = Arc::new(RecordingAccountant::new());

    let extractor = PatternExtractor::new().with_phrase("Drug Z", "Drug:Z");

    let archive = ThoughtArchive::new(
        config,
        embedder.clone(),
        Some(Arc::new(extractor)),
        runner.clone(),
        accountant.clone(),
    );

    TestArchive {
        archive,
        embedder,
        runner,
        accountant,
    }
}

pub fn user_ctx(user_id: &str) -> UserContext {
    UserContext::new(user_id)
}

pub fn project_ctx(user_id: &str, project_id: &str) -> UserContext {
    let mut ctx = UserContext::new(user_id);
    ctx.project_ids.insert(project_id.to_string());
    ctx
}

pub fn dept_ctx(user_id: &str, dept_id: &str) -> UserContext {
    let mut ctx = UserContext::new(user_id);
    ctx.dept_ids.insert(dept_id.to_string());
    ctx
}

pub fn user_request(prompt: &str, response: &str, user_id: &str) -> AddThoughtRequest {
    AddThoughtRequest::new(prompt, response, MemoryScope::User, user_id)
}
