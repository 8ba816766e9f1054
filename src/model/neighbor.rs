//! Neighbor match returned by a similarity index.

use serde::{Deserialize, Serialize};

/// One entry of a k-NN answer: a neighbor id and how similar it is to the
/// queried entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborMatch<Id> {
    pub id: Id,
    pub score: f64,
    /// Where the neighbor came from (e.g. the source file or experiment).
    pub source: Option<String>,
}

impl<Id> NeighborMatch<Id> {
    pub fn new(id: Id, score: f64) -> Self {
        Self { id, score, source: None }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
