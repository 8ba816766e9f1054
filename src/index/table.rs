//! Precomputed neighbor lists.
//!
//! A materialized k-NN graph: each entity maps to its neighbors, already
//! ranked. Useful when the graph was exported from a vector database once
//! and clustering is re-run offline with different budgets.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{EntityId, NeighborMatch};
use crate::Result;
use super::{rank_neighbors, QueryResponse, SimilarityIndex};

/// Similarity index backed by stored neighbor lists.
pub struct NeighborTable<Id: EntityId> {
    rows: Arc<RwLock<HashMap<Id, Vec<NeighborMatch<Id>>>>>,
}

impl<Id: EntityId> NeighborTable<Id> {
    pub fn new() -> Self {
        Self { rows: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Set the neighbor list of `id`. Neighbors are re-ranked on insert.
    pub fn insert(&self, id: Id, neighbors: Vec<NeighborMatch<Id>>) {
        let len = neighbors.len();
        self.rows.write().insert(id, rank_neighbors(neighbors, len));
    }

    /// Build a table from `(from, to, score)` edges.
    pub fn from_edges(edges: impl IntoIterator<Item = (Id, Id, f64)>) -> Self {
        let mut rows: HashMap<Id, Vec<NeighborMatch<Id>>> = HashMap::new();
        for (from, to, score) in edges {
            rows.entry(from).or_default().push(NeighborMatch::new(to, score));
        }
        let table = Self::new();
        for (id, neighbors) in rows {
            table.insert(id, neighbors);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl<Id: EntityId> Default for NeighborTable<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: EntityId> Clone for NeighborTable<Id> {
    fn clone(&self) -> Self {
        Self { rows: Arc::clone(&self.rows) }
    }
}

#[async_trait]
impl<Id: EntityId> SimilarityIndex for NeighborTable<Id> {
    type Id = Id;

    async fn query(&self, ids: &[Id], k: usize) -> Result<QueryResponse<Id>> {
        let rows = self.rows.read();
        let mut response = QueryResponse::new();
        for id in ids {
            match rows.get(id) {
                Some(neighbors) => {
                    response.insert(id.clone(), neighbors.iter().take(k).cloned().collect());
                }
                None => response.mark_missing(id.clone()),
            }
        }
        Ok(response)
    }
}
