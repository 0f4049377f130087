//! Sensitive-content detection for relocation sanitization.
//!
//! Three signals, any one of which marks a thought sensitive:
//! - regex patterns (built-in secret/PII patterns plus configured extras)
//!   over the prompt, reasoning trace, and final response
//! - an access role carrying the configured deny prefix (e.g. `secret:*`)
//! - an extracted entity on the configured deny list

use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

use crate::config::SanitizerConfig;
use crate::types::CachedThought;

pub struct SensitivePatterns {
    patterns: Vec<Regex>,
    denied_entities: HashSet<String>,
    denied_role_prefix: String,
}

impl SensitivePatterns {
    /// Built-in patterns: credential assignments, SSNs, and card numbers.
    fn builtin() -> Vec<Regex> {
        [
            r#"(?i)(api[_-]?key|secret|token|password)\s*[:=]\s*['"]?[\w-]{16,}['"]?"#,
            r"\b\d{3}-\d{2}-\d{4}\b",
            r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static sensitive pattern"))
        .collect()
    }

    pub fn from_config(config: &SanitizerConfig) -> Self {
        let mut patterns = Self::builtin();

        for raw in &config.extra_patterns {
            match Regex::new(raw) {
                Ok(re) => patterns.push(re),
                Err(e) => warn!("Skipping invalid sensitive pattern '{raw}': {e}"),
            }
        }

        Self {
            patterns,
            denied_entities: config.denied_entities.iter().cloned().collect(),
            denied_role_prefix: config.denied_role_prefix.clone(),
        }
    }

    /// The configurable predicate consulted by the relocation manager.
    pub fn contains_sensitive(&self, thought: &CachedThought) -> bool {
        if thought
            .access_roles
            .iter()
            .any(|role| role.starts_with(&self.denied_role_prefix))
        {
            return true;
        }

        if thought
            .entities
            .iter()
            .any(|e| self.denied_entities.contains(e))
        {
            return true;
        }

        let texts = [
            thought.prompt_text.as_str(),
            thought.reasoning_trace.as_str(),
            thought.final_response.as_str(),
        ];
        texts
            .iter()
            .any(|text| self.patterns.iter().any(|re| re.is_match(text)))
    }
}
