//! Vector index: cosine top-k over unit-normalized embeddings.
//!
//! Exact brute-force scan. Vectors are normalized at write time, so cosine
//! similarity reduces to a dot product. At the archive's working set sizes a
//! full scan is faster than maintaining an ANN structure; an ANN variant can
//! replace this behind the same contract provided it documents a recall
//! floor of 0.9 at k=20 against the exact scan.

use ordered_float::OrderedFloat;
use std::collections::HashMap;

use crate::errors::{ArchiveError, Result};
use crate::types::ThoughtId;

pub struct VectorIndex {
    dimension: usize,
    vectors: HashMap<ThoughtId, Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, id: &ThoughtId) -> bool {
        self.vectors.contains_key(id)
    }

    /// Insert a vector. Exactly one entry per thought id; a duplicate insert
    /// or a dimension mismatch means an upstream invariant is broken.
    pub fn insert(&mut self, id: ThoughtId, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(ArchiveError::IndexInconsistency(format!(
                "vector for {id} has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        if self.vectors.contains_key(&id) {
            return Err(ArchiveError::IndexInconsistency(format!(
                "duplicate vector entry for {id}"
            )));
        }
        self.vectors.insert(id, vector);
        Ok(())
    }

    /// Remove a vector entry. Returns whether the id was present.
    pub fn remove(&mut self, id: &ThoughtId) -> bool {
        self.vectors.remove(id).is_some()
    }

    /// Top-k ids by cosine similarity, descending. Ties broken by id so
    /// results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(ThoughtId, f32)> {
        if query.len() != self.dimension || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(OrderedFloat<f32>, ThoughtId)> = self
            .vectors
            .iter()
            .map(|(id, vec)| (OrderedFloat(dot(query, vec)), *id))
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        scored
            .into_iter()
            .take(k)
            .map(|(score, id)| (id, score.0))
            .collect()
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(mut v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in v.iter_mut() {
            *x /= norm;
        }
        v
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let mut index = VectorIndex::new(3);
        let a = ThoughtId::new();
        let b = ThoughtId::new();
        let c = ThoughtId::new();

        index.insert(a, unit(vec![1.0, 0.0, 0.0])).unwrap();
        index.insert(b, unit(vec![1.0, 1.0, 0.0])).unwrap();
        index.insert(c, unit(vec![0.0, 0.0, 1.0])).unwrap();

        let results = index.search(&unit(vec![1.0, 0.0, 0.0]), 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, a);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(results[1].0, b);
        assert_eq!(results[2].0, c);
    }

    #[test]
    fn test_k_truncates() {
        let mut index = VectorIndex::new(2);
        for _ in 0..10 {
            index.insert(ThoughtId::new(), unit(vec![1.0, 0.5])).unwrap();
        }
        assert_eq!(index.search(&unit(vec![1.0, 0.0]), 4).len(), 4);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut index = VectorIndex::new(2);
        let id = ThoughtId::new();
        index.insert(id, unit(vec![1.0, 0.0])).unwrap();

        let err = index.insert(id, unit(vec![0.0, 1.0])).unwrap_err();
        assert_eq!(err.code(), "INDEX_INCONSISTENCY");
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = VectorIndex::new(4);
        let err = index.insert(ThoughtId::new(), vec![1.0, 0.0]).unwrap_err();
        assert_eq!(err.code(), "INDEX_INCONSISTENCY");
    }

    #[test]
    fn test_remove() {
        let mut index = VectorIndex::new(2);
        let id = ThoughtId::new();
        index.insert(id, unit(vec![1.0, 0.0])).unwrap();

        assert!(index.remove(&id));
        assert!(!index.remove(&id));
        assert!(index.search(&unit(vec![1.0, 0.0]), 5).is_empty());
    }

    #[test]
    fn test_wrong_query_dimension_returns_empty() {
        let mut index = VectorIndex::new(3);
        index
            .insert(ThoughtId::new(), unit(vec![1.0, 0.0, 0.0]))
            .unwrap();
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }
}
