//! # Similarity Index Trait
//!
//! This is THE contract between the expansion controller and whatever
//! answers k-nearest-neighbor questions. The controller never sees
//! embeddings, collections or connections, only ids in, neighbor lists out.
//!
//! ## Implementations
//!
//! | Index | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryIndex` | `memory` | Brute-force cosine k-NN over in-process vectors |
//! | `NeighborTable` | `table` | Precomputed neighbor lists (materialized k-NN graph) |
//! | `MilvusIndex` | `milvus` | Milvus REST v2 collection (feature `milvus`) |

pub mod memory;
pub mod table;
#[cfg(feature = "milvus")]
pub mod milvus;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{EntityId, NeighborMatch};
use crate::Result;

pub use memory::MemoryIndex;
pub use table::NeighborTable;
#[cfg(feature = "milvus")]
pub use milvus::{MilvusConfig, MilvusIndex};

// ============================================================================
// Index capabilities
// ============================================================================

/// What an index can do. Used by the controller to size batches.
///
/// All fields default to "no limit" / false. Indexes override via `capabilities()`.
#[derive(Debug, Clone, Default)]
pub struct IndexCapabilities {
    /// Largest number of ids accepted in one `query` call.
    pub max_batch_size: Option<usize>,
    /// Largest `k` the index will honor.
    pub max_neighbors: Option<usize>,
    /// Whether a queried entity is returned as its own nearest neighbor.
    pub includes_self: bool,
}

// ============================================================================
// Query response
// ============================================================================

/// Answer to one batched k-NN query.
///
/// Ids the index knows nothing about are listed in `missing`. That is a
/// partial result, not a failure: absence just means no neighbors.
#[derive(Debug, Clone)]
pub struct QueryResponse<Id: EntityId> {
    pub matches: HashMap<Id, Vec<NeighborMatch<Id>>>,
    pub missing: Vec<Id>,
}

impl<Id: EntityId> QueryResponse<Id> {
    pub fn new() -> Self {
        Self { matches: HashMap::new(), missing: Vec::new() }
    }

    pub fn insert(&mut self, id: Id, neighbors: Vec<NeighborMatch<Id>>) {
        self.matches.insert(id, neighbors);
    }

    pub fn mark_missing(&mut self, id: Id) {
        self.missing.push(id);
    }

    pub fn with_matches(mut self, id: Id, neighbors: Vec<NeighborMatch<Id>>) -> Self {
        self.insert(id, neighbors);
        self
    }

    /// True when some queried ids came back without an entry.
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }

    pub fn neighbors_of(&self, id: &Id) -> Option<&[NeighborMatch<Id>]> {
        self.matches.get(id).map(Vec::as_slice)
    }

    /// Total neighbor occurrences across every queried id.
    pub fn hit_count(&self) -> usize {
        self.matches.values().map(Vec::len).sum()
    }
}

impl<Id: EntityId> Default for QueryResponse<Id> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SimilarityIndex Trait
// ============================================================================

/// Batched k-nearest-neighbor lookup by entity id.
///
/// Indexes return `Error::IndexUnavailable` when the backing service cannot
/// be reached and `Error::BatchQueryFailed` when one call fails; the
/// controller treats the former as fatal only at run start.
#[async_trait]
pub trait SimilarityIndex: Send + Sync + 'static {
    /// The identifier type this index speaks.
    type Id: EntityId;

    /// Verify the index is reachable. Called once before a run issues any query.
    ///
    /// Default: always reachable (in-process indexes).
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    /// For each id, up to `k` neighbors ordered from most to least similar.
    async fn query(&self, ids: &[Self::Id], k: usize) -> Result<QueryResponse<Self::Id>>;

    /// Report batch and neighbor limits.
    fn capabilities(&self) -> IndexCapabilities {
        IndexCapabilities::default()
    }
}

#[async_trait]
impl<I: SimilarityIndex> SimilarityIndex for Arc<I> {
    type Id = I::Id;

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }

    async fn query(&self, ids: &[Self::Id], k: usize) -> Result<QueryResponse<Self::Id>> {
        (**self).query(ids, k).await
    }

    fn capabilities(&self) -> IndexCapabilities {
        (**self).capabilities()
    }
}

/// Rank candidates: descending score, ascending id on ties, keep `k`.
pub(crate) fn rank_neighbors<Id: EntityId>(mut candidates: Vec<NeighborMatch<Id>>, k: usize) -> Vec<NeighborMatch<Id>> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    candidates.truncate(k);
    candidates
}
