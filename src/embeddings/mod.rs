//! Embedding generation.
//!
//! The archive treats the embedding model as a capability contract:
//! implementations are selected at composition time. The built-in
//! [`hashing::HashingEmbedder`] is deterministic and fully offline;
//! production deployments plug in a model-backed implementation behind the
//! same trait.

pub mod hashing;

use anyhow::Result;

pub use hashing::HashingEmbedder;

/// Trait for embedding generation
pub trait Embedder: Send + Sync {
    /// Generate an embedding for text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;

    /// Batch embed multiple texts
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Normalize a vector to unit L2 norm in place.
///
/// Returns false when the vector has zero norm and cannot be normalized.
pub fn l2_normalize(vector: &mut [f32]) -> bool {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for v in vector.iter_mut() {
        *v /= norm;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_norm() {
        let mut v = vec![3.0, 4.0];
        assert!(l2_normalize(&mut v));
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_rejected() {
        let mut v = vec![0.0; 8];
        assert!(!l2_normalize(&mut v));
    }
}
