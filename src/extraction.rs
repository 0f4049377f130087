//! Entity extraction.
//!
//! Like the embedder, the extractor is a capability contract. The built-in
//! [`PatternExtractor`] recognizes explicit `Type:Name` mentions plus a
//! configurable phrase dictionary; model-backed extractors implement the
//! same trait.

use anyhow::Result;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

/// Trait for extracting typed entity labels from text.
///
/// Labels are returned in `Type:Name` form (e.g., `Project:Apollo`).
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<BTreeSet<String>>;
}

/// Regex-driven extractor for explicit entity mentions.
pub struct PatternExtractor {
    label_pattern: Regex,
    /// Phrase -> label dictionary, matched case-insensitively.
    phrases: HashMap<String, String>,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self {
            // Matches tokens already in Type:Name form, e.g. "Project:Apollo"
            label_pattern: Regex::new(r"\b([A-Z][A-Za-z0-9]*):([A-Za-z0-9_\-]+)")
                .expect("static entity pattern"),
            phrases: HashMap::new(),
        }
    }

    /// Register a phrase that maps to an entity label, e.g.
    /// `with_phrase("Drug Z", "Drug:Z")`.
    pub fn with_phrase(mut self, phrase: &str, label: &str) -> Self {
        self.phrases.insert(phrase.to_lowercase(), label.to_string());
        self
    }
}

impl EntityExtractor for PatternExtractor {
    fn extract(&self, text: &str) -> Result<BTreeSet<String>> {
        let mut entities = BTreeSet::new();

        for cap in self.label_pattern.captures_iter(text) {
            entities.insert(format!("{}:{}", &cap[1], &cap[2]));
        }

        let lowered = text.to_lowercase();
        for (phrase, label) in &self.phrases {
            if lowered.contains(phrase) {
                entities.insert(label.clone());
            }
        }

        Ok(entities)
    }
}
