//! In-memory similarity index.
//!
//! This is the reference implementation of `SimilarityIndex`.
//! It keeps embedding vectors in a HashMap protected by an RwLock and
//! answers every query with an exact brute-force cosine scan.
//!
//! ## Limitations
//!
//! - **O(n) per query**: no ANN structure. Fine for tests and for
//!   collections of a few hundred thousand cells, not beyond.
//! - **No persistence**: vectors live as long as the index does.
//!
//! Use this index for:
//! - Testing the expansion controller against real geometry
//! - Embedding clustering in applications that already hold the vectors
//! - Validating results before running against a vector database

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{EntityId, NeighborMatch};
use crate::{Error, Result};
use super::{rank_neighbors, IndexCapabilities, QueryResponse, SimilarityIndex};

// ============================================================================
// MemoryIndex
// ============================================================================

/// In-process cosine k-NN index.
pub struct MemoryIndex<Id: EntityId> {
    inner: Arc<MemoryInner<Id>>,
}

struct MemoryInner<Id> {
    vectors: RwLock<HashMap<Id, Embedding>>,
    /// Fixed by the first inserted vector.
    dimension: RwLock<Option<usize>>,
}

struct Embedding {
    values: Vec<f32>,
    norm: f64,
}

impl Embedding {
    fn new(values: Vec<f32>) -> Self {
        let norm = values.iter().map(|v| f64::from(*v) * f64::from(*v)).sum::<f64>().sqrt();
        Self { values, norm }
    }

    fn cosine(&self, other: &Embedding) -> f64 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 0.0;
        }
        let dot: f64 = self.values.iter()
            .zip(&other.values)
            .map(|(a, b)| f64::from(*a) * f64::from(*b))
            .sum();
        dot / (self.norm * other.norm)
    }
}

impl<Id: EntityId> MemoryIndex<Id> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                vectors: RwLock::new(HashMap::new()),
                dimension: RwLock::new(None),
            }),
        }
    }

    /// Store (or replace) the embedding for `id`.
    ///
    /// All vectors must share the dimension of the first one inserted.
    pub fn insert(&self, id: Id, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::InvalidInput(format!("empty embedding for {id}")));
        }
        {
            let mut dim = self.inner.dimension.write();
            match *dim {
                Some(d) if d != vector.len() => {
                    return Err(Error::InvalidInput(format!(
                        "embedding for {id} has dimension {}, index expects {d}",
                        vector.len()
                    )));
                }
                Some(_) => {}
                None => *dim = Some(vector.len()),
            }
        }
        self.inner.vectors.write().insert(id, Embedding::new(vector));
        Ok(())
    }

    /// Remove an embedding. Returns true if it existed.
    pub fn remove(&self, id: &Id) -> bool {
        self.inner.vectors.write().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.vectors.read().is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        *self.inner.dimension.read()
    }
}

impl<Id: EntityId> Default for MemoryIndex<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: EntityId> Clone for MemoryIndex<Id> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

// ============================================================================
// SimilarityIndex impl
// ============================================================================

#[async_trait]
impl<Id: EntityId> SimilarityIndex for MemoryIndex<Id> {
    type Id = Id;

    async fn query(&self, ids: &[Id], k: usize) -> Result<QueryResponse<Id>> {
        let vectors = self.inner.vectors.read();
        let mut response = QueryResponse::new();

        for id in ids {
            let Some(query) = vectors.get(id) else {
                response.mark_missing(id.clone());
                continue;
            };

            // The query cell is scanned too and scores 1.0 against itself,
            // the same answer a vector database gives.
            let candidates = vectors.iter()
                .map(|(other, emb)| NeighborMatch::new(other.clone(), query.cosine(emb)))
                .collect();
            response.insert(id.clone(), rank_neighbors(candidates, k));
        }

        Ok(response)
    }

    fn capabilities(&self) -> IndexCapabilities {
        IndexCapabilities {
            includes_self: true,
            ..IndexCapabilities::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> MemoryIndex<u64> {
        let idx = MemoryIndex::new();
        idx.insert(1, vec![1.0, 0.0]).unwrap();
        idx.insert(2, vec![0.9, 0.1]).unwrap();
        idx.insert(3, vec![0.0, 1.0]).unwrap();
        idx.insert(4, vec![-1.0, 0.0]).unwrap();
        idx
    }

    #[tokio::test]
    async fn test_query_ranks_by_cosine() {
        let idx = index();
        let resp = idx.query(&[1], 3).await.unwrap();
        let ids: Vec<u64> = resp.neighbors_of(&1).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let top = &resp.neighbors_of(&1).unwrap()[0];
        assert!((top.score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unknown_id_is_missing() {
        let idx = index();
        let resp = idx.query(&[1, 99], 2).await.unwrap();
        assert!(resp.is_partial());
        assert_eq!(resp.missing, vec![99]);
        assert!(resp.neighbors_of(&1).is_some());
    }

    #[tokio::test]
    async fn test_k_zero_returns_empty_lists() {
        let idx = index();
        let resp = idx.query(&[2], 0).await.unwrap();
        assert_eq!(resp.neighbors_of(&2).map(|n| n.len()), Some(0));
        assert!(!resp.is_partial());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let idx = index();
        assert!(matches!(idx.insert(5, vec![1.0, 2.0, 3.0]), Err(Error::InvalidInput(_))));
        assert!(matches!(idx.insert(5, vec![]), Err(Error::InvalidInput(_))));
        assert_eq!(idx.dimension(), Some(2));
        assert_eq!(idx.len(), 4);
    }

    #[tokio::test]
    async fn test_zero_vector_scores_zero() {
        let idx = index();
        idx.insert(5, vec![0.0, 0.0]).unwrap();
        let resp = idx.query(&[5], 5).await.unwrap();
        assert!(resp.neighbors_of(&5).unwrap().iter().all(|m| m.score == 0.0));
    }

    #[test]
    fn test_remove() {
        let idx = index();
        assert!(idx.remove(&4));
        assert!(!idx.remove(&4));
        assert_eq!(idx.len(), 3);
    }
}
