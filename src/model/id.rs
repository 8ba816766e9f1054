//! Entity identifiers.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Anything that can name a queryable entity.
///
/// Ordering is only used to make batching and tie-breaking deterministic;
/// it carries no meaning for the clustering itself.
pub trait EntityId: Clone + Eq + Hash + Ord + Debug + Display + Send + Sync + 'static {}

impl<T> EntityId for T where T: Clone + Eq + Hash + Ord + Debug + Display + Send + Sync + 'static {}

/// Cells per experiment in the composite id scheme.
pub const CELLS_PER_EXPERIMENT: u64 = 100_000;

/// Opaque cell identifier.
///
/// Ingested cells use a composite scheme: the leading digit(s) name the
/// experiment and the last five digits are the cell's index within it,
/// so cell 0 of experiment 1 is `100000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub u64);

impl CellId {
    /// Build an id from an experiment number and an index within it.
    /// Returns `None` when the index does not fit in five digits.
    pub fn compose(experiment: u64, index: u64) -> Option<Self> {
        if index >= CELLS_PER_EXPERIMENT {
            return None;
        }
        experiment
            .checked_mul(CELLS_PER_EXPERIMENT)
            .and_then(|base| base.checked_add(index))
            .map(CellId)
    }

    pub fn experiment(&self) -> u64 {
        self.0 / CELLS_PER_EXPERIMENT
    }

    pub fn index(&self) -> u64 {
        self.0 % CELLS_PER_EXPERIMENT
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CellId {
    fn from(v: u64) -> Self {
        CellId(v)
    }
}
