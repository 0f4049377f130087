//! Temporal ranker: exponential decay with half-life semantics.
//!
//! Each thought carries its own `ttl_seconds`, interpreted as a half-life:
//! `lambda = ln 2 / ttl_seconds`, so a thought's score halves every
//! `ttl_seconds`. (The alternative `lambda = 1 / ttl` convention, where
//! relevance is near zero at `t = ttl`, is not used; the half-life reading
//! keeps the knob directly interpretable.) Per-scope defaults for `ttl`
//! live in [`crate::config::ScopeTtls`].

use chrono::{DateTime, Utc};

pub struct TemporalRanker;

impl TemporalRanker {
    /// Decay factor in (0, 1]. Future `created_at` clamps to 1.0 rather
    /// than amplifying the score.
    pub fn decay_factor(ttl_seconds: u64, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let elapsed = now.signed_duration_since(created_at).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 {
            return 1.0;
        }

        let ttl = ttl_seconds.max(1) as f64;
        let lambda = std::f64::consts::LN_2 / ttl;
        (-lambda * elapsed).exp()
    }

    /// Apply decay to a similarity score.
    pub fn adjust_score(
        score: f32,
        ttl_seconds: u64,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f32 {
        score * Self::decay_factor(ttl_seconds, created_at, now) as f32
    }
}
