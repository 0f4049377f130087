//! Matchmaker: fused scoring and the lookup-vs-compute decision.
//!
//! The score pipeline is `S = cos(q, v) * boost * decay`, where boost is
//! `1 + beta` when the candidate thought is graph-linked to the caller's
//! active project within two hops, and decay is the half-life attenuation
//! from [`crate::temporal::TemporalRanker`]. Classification by the best S:
//!
//! - `S >= exact_threshold`  -> EXACT_HIT (full cached payload)
//! - `S >= hint_threshold`   -> SEMANTIC_HINT (reasoning trace only)
//! - `0 < S`, and a surviving candidate shares an entity with the query
//!   -> ENTITY_HOP (structural match, reasoning trace with a marker)
//! - otherwise               -> MISS
//!
//! Ties on S break toward the newer thought, then the lexicographically
//! smaller id.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::ArchiveConfig;
use crate::temporal::TemporalRanker;
use crate::types::{CachedThought, MatchStrategy, ThoughtId};

/// A candidate that survived the access filter, carrying its score parts.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub thought: CachedThought,
    /// Raw cosine similarity from the vector index.
    pub similarity: f32,
    /// Whether the graph-boost rule fired.
    pub boosted: bool,
    /// Final score after boost and decay.
    pub score: f32,
}

/// Tagged lookup result; each strategy carries a distinct payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LookupOutcome {
    ExactHit {
        thought_id: ThoughtId,
        score: f32,
        prompt: String,
        reasoning_trace: String,
        final_response: String,
    },
    /// The retrieval-augmented-thought path: steer fresh computation with a
    /// prior trace instead of replacing it.
    SemanticHint {
        thought_id: ThoughtId,
        score: f32,
        reasoning_trace: String,
    },
    /// Structural (not semantic) match via shared entities.
    EntityHop {
        thought_id: ThoughtId,
        score: f32,
        reasoning_trace: String,
        shared_entities: Vec<String>,
    },
    Miss,
}

impl LookupOutcome {
    pub fn strategy(&self) -> Option<MatchStrategy> {
        match self {
            Self::ExactHit { .. } => Some(MatchStrategy::ExactHit),
            Self::SemanticHint { .. } => Some(MatchStrategy::SemanticHint),
            Self::EntityHop { .. } => Some(MatchStrategy::EntityHop),
            Self::Miss => None,
        }
    }

    pub fn thought_id(&self) -> Option<ThoughtId> {
        match self {
            Self::ExactHit { thought_id, .. }
            | Self::SemanticHint { thought_id, .. }
            | Self::EntityHop { thought_id, .. } => Some(*thought_id),
            Self::Miss => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }
}

/// Compute the final score for one candidate.
pub fn score_candidate(
    similarity: f32,
    linked_to_active_project: bool,
    thought: &CachedThought,
    config: &ArchiveConfig,
    now: DateTime<Utc>,
) -> f32 {
    let boost = if linked_to_active_project {
        1.0 + config.graph_boost_beta
    } else {
        1.0
    };
    TemporalRanker::adjust_score(
        similarity * boost,
        thought.ttl_seconds,
        thought.created_at,
        now,
    )
}

/// Sort candidates best-first: score descending, then newer `created_at`,
/// then lexicographic id.
pub fn rank(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        OrderedFloat(b.score)
            .cmp(&OrderedFloat(a.score))
            .then_with(|| b.thought.created_at.cmp(&a.thought.created_at))
            .then_with(|| a.thought.id.cmp(&b.thought.id))
    });
}

/// Classify ranked candidates into a lookup outcome.
///
/// `query_entities` are the labels extracted from the query text; they only
/// matter for the entity-hop fallback.
pub fn classify(
    ranked: &[ScoredCandidate],
    query_entities: &BTreeSet<String>,
    config: &ArchiveConfig,
) -> LookupOutcome {
    let Some(best) = ranked.first() else {
        return LookupOutcome::Miss;
    };

    if best.score >= config.exact_threshold {
        return LookupOutcome::ExactHit {
            thought_id: best.thought.id,
            score: best.score,
            prompt: best.thought.prompt_text.clone(),
            reasoning_trace: best.thought.reasoning_trace.clone(),
            final_response: best.thought.final_response.clone(),
        };
    }

    if best.score >= config.hint_threshold {
        return LookupOutcome::SemanticHint {
            thought_id: best.thought.id,
            score: best.score,
            reasoning_trace: best.thought.reasoning_trace.clone(),
        };
    }

    // Entity-hop fallback: only when something scored above zero and a
    // survivor shares an entity with the query. Ranked order already encodes
    // the tie-break, so the first sharing candidate is the hop target.
    if best.score > 0.0 && !query_entities.is_empty() {
        let hop = ranked.iter().find(|c| {
            c.thought
                .entities
                .iter()
                .any(|e| query_entities.contains(e))
        });

        if let Some(candidate) = hop {
            let shared: Vec<String> = candidate
                .thought
                .entities
                .iter()
                .filter(|e| query_entities.contains(*e))
                .cloned()
                .collect();
            return LookupOutcome::EntityHop {
                thought_id: candidate.thought.id,
                score: candidate.score,
                reasoning_trace: candidate.thought.reasoning_trace.clone(),
                shared_entities: shared,
            };
        }
    }

    LookupOutcome::Miss
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryScope;
    use chrono::Duration;

    fn thought_with(entities: &[&str], created_at: DateTime<Utc>) -> CachedThought {
        CachedThought {
            id: ThoughtId::new(),
            vector: vec![1.0],
            entities: entities.iter().map(|s| s.to_string()).collect(),
            scope: MemoryScope::Project,
            scope_id: "project_apollo".to_string(),
            owner_id: "u1".to_string(),
            prompt_text: "prompt".to_string(),
            reasoning_trace: "trace".to_string(),
            final_response: "response".to_string(),
            source_urns: vec![],
            is_stale: false,
            created_at,
            ttl_seconds: 86_400,
            access_roles: BTreeSet::new(),
        }
    }

    fn candidate(score: f32, entities: &[&str]) -> ScoredCandidate {
        ScoredCandidate {
            thought: thought_with(entities, Utc::now()),
            similarity: score,
            boosted: false,
            score,
        }
    }

    #[test]
    fn test_classify_exact_at_boundary() {
        let config = ArchiveConfig::default();
        let ranked = vec![candidate(0.99, &[])];
        let outcome = classify(&ranked, &BTreeSet::new(), &config);
        assert!(matches!(outcome, LookupOutcome::ExactHit { .. }));
    }

    #[test]
    fn test_classify_hint_at_boundary() {
        let config = ArchiveConfig::default();
        let ranked = vec![candidate(0.85, &[])];
        let outcome = classify(&ranked, &BTreeSet::new(), &config);
        assert!(matches!(outcome, LookupOutcome::SemanticHint { .. }));

        let ranked = vec![candidate(0.989, &[])];
        let outcome = classify(&ranked, &BTreeSet::new(), &config);
        assert!(matches!(outcome, LookupOutcome::SemanticHint { .. }));
    }

    #[test]
    fn test_classify_below_hint_without_entities_is_miss() {
        let config = ArchiveConfig::default();
        let ranked = vec![candidate(0.849, &[])];
        let outcome = classify(&ranked, &BTreeSet::new(), &config);
        assert!(outcome.is_miss());
    }

    #[test]
    fn test_classify_entity_hop() {
        let config = ArchiveConfig::default();
        let ranked = vec![candidate(0.4, &["Drug:Z"])];
        let query_entities: BTreeSet<String> = ["Drug:Z".to_string()].into();

        match classify(&ranked, &query_entities, &config) {
            LookupOutcome::EntityHop {
                shared_entities, ..
            } => assert_eq!(shared_entities, vec!["Drug:Z".to_string()]),
            other => panic!("expected entity hop, got {other:?}"),
        }
    }

    #[test]
    fn test_entity_hop_picks_highest_scoring_sharer() {
        let config = ArchiveConfig::default();
        let low = candidate(0.2, &["Drug:Z"]);
        let high_non_sharing = candidate(0.5, &["Protein:Q"]);
        let mid = candidate(0.3, &["Drug:Z"]);
        let expected = mid.thought.id;

        let mut ranked = vec![low, high_non_sharing, mid];
        rank(&mut ranked);

        let query_entities: BTreeSet<String> = ["Drug:Z".to_string()].into();
        match classify(&ranked, &query_entities, &config) {
            LookupOutcome::EntityHop { thought_id, .. } => assert_eq!(thought_id, expected),
            other => panic!("expected entity hop, got {other:?}"),
        }
    }

    #[test]
    fn test_no_hop_when_query_has_no_entities() {
        let config = ArchiveConfig::default();
        let ranked = vec![candidate(0.4, &["Drug:Z"])];
        assert!(classify(&ranked, &BTreeSet::new(), &config).is_miss());
    }

    #[test]
    fn test_no_hop_at_zero_score() {
        let config = ArchiveConfig::default();
        let ranked = vec![candidate(0.0, &["Drug:Z"])];
        let query_entities: BTreeSet<String> = ["Drug:Z".to_string()].into();
        assert!(classify(&ranked, &query_entities, &config).is_miss());
    }

    #[test]
    fn test_empty_candidates_is_miss() {
        let config = ArchiveConfig::default();
        assert!(classify(&[], &BTreeSet::new(), &config).is_miss());
    }

    #[test]
    fn test_rank_ties_prefer_newer_then_smaller_id() {
        let now = Utc::now();
        let older = ScoredCandidate {
            thought: thought_with(&[], now - Duration::hours(1)),
            similarity: 0.9,
            boosted: false,
            score: 0.9,
        };
        let newer = ScoredCandidate {
            thought: thought_with(&[], now),
            similarity: 0.9,
            boosted: false,
            score: 0.9,
        };
        let newer_id = newer.thought.id;

        let mut ranked = vec![older, newer];
        rank(&mut ranked);
        assert_eq!(ranked[0].thought.id, newer_id);

        // Same score, same timestamp: smaller id wins
        let a = ScoredCandidate {
            thought: thought_with(&[], now),
            similarity: 0.5,
            boosted: false,
            score: 0.5,
        };
        let b = ScoredCandidate {
            thought: thought_with(&[], now),
            similarity: 0.5,
            boosted: false,
            score: 0.5,
        };
        let min_id = a.thought.id.min(b.thought.id);
        let mut ranked = vec![a, b];
        rank(&mut ranked);
        assert_eq!(ranked[0].thought.id, min_id);
    }

    #[test]
    fn test_score_candidate_applies_boost_and_decay() {
        let config = ArchiveConfig::default();
        let now = Utc::now();
        let t = thought_with(&[], now - Duration::seconds(86_400));

        // One half-life elapsed, boosted: 0.8 * 1.15 * 0.5
        let boosted = score_candidate(0.8, true, &t, &config, now);
        assert!((boosted - 0.8 * 1.15 * 0.5).abs() < 1e-3);

        let plain = score_candidate(0.8, false, &t, &config, now);
        assert!((plain - 0.8 * 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_outcome_strategy_mapping() {
        let config = ArchiveConfig::default();
        let ranked = vec![candidate(1.0, &[])];
        let outcome = classify(&ranked, &BTreeSet::new(), &config);
        assert_eq!(outcome.strategy(), Some(MatchStrategy::ExactHit));
        assert!(LookupOutcome::Miss.strategy().is_none());
    }
}
