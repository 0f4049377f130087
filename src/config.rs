//! Configuration for the archive engine and server.
//!
//! All configurable parameters in one place with environment variable
//! overrides. Sensible defaults, configurable in production.

use std::env;
use std::path::PathBuf;
use tracing::info;

use crate::types::MemoryScope;

/// Scoring and storage parameters for the archive engine.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Embedding dimension (default: 1536)
    pub dimension: usize,

    /// Candidates fetched from the vector index per lookup (default: 20)
    pub candidate_k: usize,

    /// Score at or above which a lookup is an exact hit (default: 0.99)
    pub exact_threshold: f32,

    /// Score at or above which a lookup returns a semantic hint (default: 0.85)
    pub hint_threshold: f32,

    /// Graph boost factor beta: score multiplier is `1 + beta` when the
    /// candidate is linked to the caller's active project (default: 0.15)
    pub graph_boost_beta: f32,

    /// Maximum hops for the graph-boost reachability check (default: 2)
    pub boost_max_hops: usize,

    /// Per-scope default half-lives, applied when ingest receives no
    /// explicit ttl_seconds
    pub scope_ttls: ScopeTtls,

    /// Estimated compute units saved per hit strategy, reported to the
    /// cost accountant
    pub saved_units: SavedUnits,

    /// Embedding retry attempts on ingest (default: 3)
    pub embed_retries: u32,

    /// Base backoff between embedding retries, in milliseconds (default: 50)
    pub embed_backoff_ms: u64,

    /// Query-embedding cache capacity (default: 10_000 entries)
    pub query_cache_capacity: u64,

    /// Thoughts older than this many half-lives are eligible for the
    /// expiry sweep; `None` disables sweeping (default: 10)
    pub sweep_after_half_lives: Option<f64>,

    /// Snapshot file path (default: ./archive_data/snapshot.json)
    pub snapshot_path: PathBuf,

    /// Sanitization policy applied on relocation
    pub sanitizer: SanitizerConfig,
}

/// Default decay half-lives per scope, in seconds.
///
/// USER scopes carry scratchpad semantics and decay fast; GLOBAL facts are
/// near-permanent. The decay convention is half-life: lambda = ln 2 / ttl.
#[derive(Debug, Clone)]
pub struct ScopeTtls {
    pub user: u64,
    pub project: u64,
    pub department: u64,
    pub client: u64,
    pub global: u64,
}

impl Default for ScopeTtls {
    fn default() -> Self {
        Self {
            user: 86_400,            // 1 day
            project: 604_800,        // 1 week
            department: 2_592_000,   // 30 days
            client: 7_776_000,       // 90 days
            global: 31_536_000,      // 1 year
        }
    }
}

impl ScopeTtls {
    pub fn for_scope(&self, scope: MemoryScope) -> u64 {
        match scope {
            MemoryScope::User => self.user,
            MemoryScope::Project => self.project,
            MemoryScope::Department => self.department,
            MemoryScope::Client => self.client,
            MemoryScope::Global => self.global,
        }
    }
}

/// Estimated compute units saved per hit strategy.
#[derive(Debug, Clone)]
pub struct SavedUnits {
    pub exact_hit: f32,
    pub semantic_hint: f32,
    pub entity_hop: f32,
}

impl Default for SavedUnits {
    fn default() -> Self {
        Self {
            exact_hit: 1.0,
            semantic_hint: 0.6,
            entity_hop: 0.3,
        }
    }
}

/// Sanitization policy: what counts as sensitive when a user's personal
/// thoughts are re-examined on a role change.
#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    /// Extra regex patterns checked against prompt, trace, and response,
    /// on top of the built-in secret/PII patterns
    pub extra_patterns: Vec<String>,

    /// Entity labels whose presence marks a thought sensitive
    pub denied_entities: Vec<String>,

    /// Access-role prefix that marks a thought sensitive (default: "secret:")
    pub denied_role_prefix: String,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            extra_patterns: Vec::new(),
            denied_entities: Vec::new(),
            denied_role_prefix: "secret:".to_string(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dimension: 1536,
            candidate_k: 20,
            exact_threshold: 0.99,
            hint_threshold: 0.85,
            graph_boost_beta: 0.15,
            boost_max_hops: 2,
            scope_ttls: ScopeTtls::default(),
            saved_units: SavedUnits::default(),
            embed_retries: 3,
            embed_backoff_ms: 50,
            query_cache_capacity: 10_000,
            sweep_after_half_lives: Some(10.0),
            snapshot_path: PathBuf::from("./archive_data/snapshot.json"),
            sanitizer: SanitizerConfig::default(),
        }
    }
}

impl ArchiveConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("ARCHIVE_DIMENSION") {
            if let Ok(n) = val.parse() {
                config.dimension = n;
            }
        }

        if let Ok(val) = env::var("ARCHIVE_CANDIDATE_K") {
            if let Ok(n) = val.parse() {
                config.candidate_k = n;
            }
        }

        if let Ok(val) = env::var("ARCHIVE_EXACT_THRESHOLD") {
            if let Ok(n) = val.parse::<f32>() {
                config.exact_threshold = n.clamp(0.0, 1.0);
            }
        }

        if let Ok(val) = env::var("ARCHIVE_HINT_THRESHOLD") {
            if let Ok(n) = val.parse::<f32>() {
                config.hint_threshold = n.clamp(0.0, 1.0);
            }
        }

        if let Ok(val) = env::var("ARCHIVE_GRAPH_BOOST_BETA") {
            if let Ok(n) = val.parse() {
                config.graph_boost_beta = n;
            }
        }

        if let Ok(val) = env::var("ARCHIVE_SNAPSHOT_PATH") {
            config.snapshot_path = PathBuf::from(val);
        }

        if let Ok(val) = env::var("ARCHIVE_SWEEP_HALF_LIVES") {
            config.sweep_after_half_lives = val.parse().ok();
        }

        if let Ok(val) = env::var("ARCHIVE_SENSITIVE_PATTERNS") {
            config.sanitizer.extra_patterns = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(val) = env::var("ARCHIVE_DENIED_ENTITIES") {
            config.sanitizer.denied_entities = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config
    }
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty = allow all)
    pub allowed_origins: Vec<String>,
    /// Max age for preflight cache (seconds)
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 86_400,
        }
    }
}

impl CorsConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(origins) = env::var("ARCHIVE_CORS_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(val) = env::var("ARCHIVE_CORS_MAX_AGE") {
            if let Ok(n) = val.parse() {
                config.max_age_seconds = n;
            }
        }

        config
    }

    pub fn is_restricted(&self) -> bool {
        !self.allowed_origins.is_empty()
    }

    /// Convert to tower-http CorsLayer
    pub fn to_layer(&self) -> tower_http::cors::CorsLayer {
        use tower_http::cors::{AllowOrigin, Any, CorsLayer};

        let mut layer = CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any);

        if self.allowed_origins.is_empty() {
            layer = layer.allow_origin(Any);
        } else {
            let origins: Vec<_> = self
                .allowed_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            if origins.is_empty() {
                layer = layer.allow_origin(Any);
            } else {
                layer = layer.allow_origin(AllowOrigin::list(origins));
            }
        }

        layer.max_age(std::time::Duration::from_secs(self.max_age_seconds))
    }
}

/// Server configuration loaded from environment with defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server port (default: 3040)
    pub port: u16,

    /// Maximum concurrent requests (default: 200)
    pub max_concurrent_requests: usize,

    /// Periodic snapshot interval in seconds; 0 disables (default: 300)
    pub snapshot_interval_secs: u64,

    /// Whether running in production mode
    pub is_production: bool,

    /// CORS configuration
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3040,
            max_concurrent_requests: 200,
            snapshot_interval_secs: 300,
            is_production: false,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.is_production = env::var("ARCHIVE_ENV")
            .map(|v| {
                let v = v.to_lowercase();
                v == "production" || v == "prod"
            })
            .unwrap_or(false);

        if let Ok(val) = env::var("ARCHIVE_PORT") {
            if let Ok(port) = val.parse() {
                config.port = port;
            }
        }

        if let Ok(val) = env::var("ARCHIVE_MAX_CONCURRENT") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_requests = n;
            }
        }

        if let Ok(val) = env::var("ARCHIVE_SNAPSHOT_INTERVAL") {
            if let Ok(n) = val.parse() {
                config.snapshot_interval_secs = n;
            }
        }

        config.cors = CorsConfig::from_env();

        config
    }

    /// Log the current configuration
    pub fn log(&self, archive: &ArchiveConfig) {
        info!(
            "Mode: {}",
            if self.is_production {
                "PRODUCTION"
            } else {
                "Development"
            }
        );
        info!("Port: {}", self.port);
        info!("Snapshot: {:?} every {}s", archive.snapshot_path, self.snapshot_interval_secs);
        info!(
            "Thresholds: exact={} hint={} beta={} k={}",
            archive.exact_threshold,
            archive.hint_threshold,
            archive.graph_boost_beta,
            archive.candidate_k
        );
        info!("Max concurrent: {}", self.max_concurrent_requests);
        if self.cors.is_restricted() {
            info!("CORS origins: {:?}", self.cors.allowed_origins);
        } else {
            info!("CORS: Permissive (all origins allowed)");
        }
    }
}
