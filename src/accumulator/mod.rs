//! Hit counting across expansion rounds.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::model::{EntityId, NeighborMatch};

/// Entity id → number of times it came back as a neighbor.
///
/// One hit per occurrence: an entity returned for three different queried
/// ids in the same round gets three hits. Counts never decrease. The
/// controller is the only writer: it merges a round's batch results after
/// the round barrier, never while batches are still in flight.
#[derive(Debug, Clone)]
pub struct ClusterAccumulator<Id> {
    counts: HashMap<Id, u64>,
    total: u64,
}

impl<Id: EntityId> ClusterAccumulator<Id> {
    pub fn new() -> Self {
        Self { counts: HashMap::new(), total: 0 }
    }

    /// Record one hit per id in `neighbors`, duplicates included.
    pub fn record_hits<'a>(&mut self, neighbors: impl IntoIterator<Item = &'a Id>) {
        for id in neighbors {
            match self.counts.get_mut(id) {
                Some(n) => *n += 1,
                None => {
                    self.counts.insert(id.clone(), 1);
                }
            }
            self.total += 1;
        }
    }

    /// Record one hit per match of a neighbor list.
    pub fn record_matches(&mut self, matches: &[NeighborMatch<Id>]) {
        self.record_hits(matches.iter().map(|m| &m.id));
    }

    pub fn get(&self, id: &Id) -> u64 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Distinct entities seen so far.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of every count.
    pub fn total_hits(&self) -> u64 {
        self.total
    }

    /// Ordered copy of the counters.
    pub fn snapshot(&self) -> BTreeMap<Id, u64> {
        self.counts.iter().map(|(id, n)| (id.clone(), *n)).collect()
    }
}

impl<Id: EntityId> Default for ClusterAccumulator<Id> {
    fn default() -> Self {
        Self::new()
    }
}
