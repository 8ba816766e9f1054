//! # cellcluster: Community Discovery over k-NN Similarity Graphs
//!
//! Finds the cluster a set of seed cells belongs to in a similarity graph
//! whose edges only exist implicitly, as answers from a k-nearest-neighbor
//! service over embedding vectors.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `SimilarityIndex` is the contract between the
//!    algorithm and whatever answers k-NN queries
//! 2. **Run-scoped state**: frontier, visited set and counters live inside
//!    one `expand` call; no globals, no cross-run sharing
//! 3. **Best effort, never silent**: failed batches are skipped but reported;
//!    cancelled runs return their partial result, tagged as such
//! 4. **Explicit cutoff**: the acceptance threshold is a named policy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cellcluster::{CellId, ExpansionConfig, MemoryIndex};
//!
//! # async fn example() -> cellcluster::Result<()> {
//! let index = MemoryIndex::new();
//! index.insert(CellId(100_000), vec![0.1, 0.9, 0.3])?;
//! index.insert(CellId(100_001), vec![0.2, 0.8, 0.3])?;
//!
//! let config = ExpansionConfig::default().with_round_budget(3);
//! let outcome = cellcluster::find_clusters(index, [CellId(100_000)], config).await?;
//!
//! for member in &outcome.result {
//!     println!("{} seen {} times", member.id, member.count);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Similarity Indexes
//!
//! | Index | Feature | Description |
//! |-------|---------|-------------|
//! | Memory | (default) | Brute-force cosine k-NN for testing/embedding |
//! | NeighborTable | (default) | Precomputed neighbor lists |
//! | Milvus | `milvus` | Milvus REST v2 collection |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod index;
pub mod frontier;
pub mod accumulator;
pub mod membership;
pub mod expansion;
pub mod export;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    EntityId, CellId, NeighborMatch, ClusterMember, ClusterResult,
};

// ============================================================================
// Re-exports: Indexes
// ============================================================================

pub use index::{
    SimilarityIndex, IndexCapabilities, QueryResponse,
    MemoryIndex, NeighborTable,
};
#[cfg(feature = "milvus")]
pub use index::{MilvusConfig, MilvusIndex};

// ============================================================================
// Re-exports: Algorithm
// ============================================================================

pub use frontier::{FrontierBatcher, VisitedSet};
pub use accumulator::ClusterAccumulator;
pub use membership::{CutoffPolicy, MembershipFilter};
pub use expansion::{
    ExpansionController, ExpansionConfig, ExpansionOutcome, ExpansionEvent,
    ExpansionStats, BatchFailure, RunStatus,
};
pub use export::{ResultSink, CsvSink, JsonSink};

// ============================================================================
// Top-level entry point
// ============================================================================

/// Run a single expansion from `seeds` against `index`.
///
/// Shorthand for building an [`ExpansionController`] and calling
/// [`expand`](ExpansionController::expand) once.
pub async fn find_clusters<I: SimilarityIndex>(
    index: I,
    seeds: impl IntoIterator<Item = I::Id>,
    config: ExpansionConfig,
) -> Result<ExpansionOutcome<I::Id>> {
    ExpansionController::new(index, config)?.expand(seeds).await
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Similarity index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Batch query failed for {} ids: {message}", .ids.len())]
    BatchQueryFailed { ids: Vec<String>, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
