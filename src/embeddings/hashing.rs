//! Deterministic feature-hashing embedder.
//!
//! Maps each token to a dimension via SHA-256 and accumulates signed counts,
//! then L2-normalizes. Identical text always produces the identical vector,
//! so an exact re-ask of a cached prompt scores cosine 1.0, and texts with
//! overlapping vocabulary land close in embedding space. No model files, no
//! network, stable across restarts.

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use super::{l2_normalize, Embedder};

/// Feature-hashing embedder over lowercase word tokens.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
    }

    /// Hash a token to (dimension index, sign).
    fn slot(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let idx = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
            % self.dimension;
        let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for token in Self::tokenize(text) {
            let (idx, sign) = self.slot(&token);
            vector[idx] += sign;
            tokens += 1;
        }

        if tokens == 0 || !l2_normalize(&mut vector) {
            return Err(anyhow!("text produced no embeddable tokens"));
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
