//! Cost accounting: hit events for the downstream cost accountant.

use parking_lot::Mutex;
use tracing::info;

use crate::types::CacheHit;

/// Subscriber for cache-hit notifications. Emitted on every exact hit,
/// semantic hint, and entity hop; never on a miss.
pub trait CostAccountant: Send + Sync {
    fn record_hit(&self, hit: &CacheHit);
}

/// Default accountant: structured log line per hit.
#[derive(Default)]
pub struct TracingAccountant;

impl TracingAccountant {
    pub fn new() -> Self {
        Self
    }
}

impl CostAccountant for TracingAccountant {
    fn record_hit(&self, hit: &CacheHit) {
        info!(
            thought_id = %hit.thought_id,
            strategy = %hit.strategy,
            saved_units = hit.estimated_saved_units,
            "cache hit"
        );
    }
}

/// Accumulates hits in memory for inspection.
#[derive(Default)]
pub struct RecordingAccountant {
    hits: Mutex<Vec<CacheHit>>,
}

impl RecordingAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> Vec<CacheHit> {
        self.hits.lock().clone()
    }

    pub fn hit_count(&self) -> usize {
        self.hits.lock().len()
    }
}

impl CostAccountant for RecordingAccountant {
    fn record_hit(&self, hit: &CacheHit) {
        self.hits.lock().push(hit.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchStrategy, ThoughtId};

    #[test]
    fn test_recording_accountant_accumulates() {
        let accountant = RecordingAccountant::new();
        assert_eq!(accountant.hit_count(), 0);

        accountant.record_hit(&CacheHit {
            thought_id: ThoughtId::new(),
            strategy: MatchStrategy::ExactHit,
            estimated_saved_units: 1.0,
        });

        assert_eq!(accountant.hit_count(), 1);
        assert_eq!(accountant.hits()[0].strategy, MatchStrategy::ExactHit);
    }
}
