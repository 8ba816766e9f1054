//! Frontier batching and the visited set.
//!
//! The frontier is the set of ids waiting to be queried this round.
//! `FrontierBatcher` cuts it into index-sized batches; `VisitedSet`
//! guarantees no id is ever dispatched twice within a run.

use hashbrown::HashSet;
use parking_lot::Mutex;

use crate::model::EntityId;

// ============================================================================
// FrontierBatcher
// ============================================================================

/// Splits a pending id set into disjoint, duplicate-free batches.
///
/// Ids are sorted before chunking so the same input always yields the same
/// batches. The iterator is lazy and consumes the pending set; it never
/// yields an empty batch.
pub struct FrontierBatcher<Id> {
    pending: std::vec::IntoIter<Id>,
    batch_size: usize,
}

impl<Id: EntityId> FrontierBatcher<Id> {
    /// `batch_size` of 0 is treated as 1.
    pub fn new(pending: impl IntoIterator<Item = Id>, batch_size: usize) -> Self {
        let mut ids: Vec<Id> = pending.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self {
            pending: ids.into_iter(),
            batch_size: batch_size.max(1),
        }
    }

    /// Ids not yet handed out.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl<Id> Iterator for FrontierBatcher<Id> {
    type Item = Vec<Id>;

    fn next(&mut self) -> Option<Vec<Id>> {
        let batch: Vec<Id> = self.pending.by_ref().take(self.batch_size).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.pending.len().div_ceil(self.batch_size);
        (n, Some(n))
    }
}

impl<Id> ExactSizeIterator for FrontierBatcher<Id> {}

// ============================================================================
// VisitedSet
// ============================================================================

/// Ids already submitted as queries. Only ever grows.
///
/// Shared by concurrent batch workers within a round, so admission is
/// mutex-protected and idempotent.
#[derive(Debug)]
pub struct VisitedSet<Id> {
    ids: Mutex<HashSet<Id>>,
}

impl<Id: EntityId> VisitedSet<Id> {
    pub fn new() -> Self {
        Self { ids: Mutex::new(HashSet::new()) }
    }

    /// Mark `batch` as visited and return the ids that were not visited
    /// before. Only the returned ids may be dispatched.
    pub fn admit(&self, batch: Vec<Id>) -> Vec<Id> {
        let mut ids = self.ids.lock();
        batch.into_iter().filter(|id| ids.insert(id.clone())).collect()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.ids.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Drop every id of `candidates` that has been visited.
    pub fn retain_unvisited(&self, candidates: &mut HashSet<Id>) {
        let ids = self.ids.lock();
        candidates.retain(|id| !ids.contains(id));
    }
}

impl<Id: EntityId> Default for VisitedSet<Id> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_are_sorted_and_sized() {
        let batches: Vec<Vec<u64>> = FrontierBatcher::new([9u64, 3, 7, 1, 5], 2).collect();
        assert_eq!(batches, vec![vec![1, 3], vec![5, 7], vec![9]]);
    }

    #[test]
    fn test_empty_pending_yields_nothing() {
        let mut batcher = FrontierBatcher::<u64>::new([], 10);
        assert_eq!(batcher.len(), 0);
        assert!(batcher.next().is_none());
    }

    #[test]
    fn test_duplicates_collapse() {
        let batches: Vec<Vec<u64>> = FrontierBatcher::new([2u64, 2, 1, 1], 10).collect();
        assert_eq!(batches, vec![vec![1, 2]]);
    }

    #[test]
    fn test_zero_batch_size_is_one() {
        let batcher = FrontierBatcher::new([1u64, 2, 3], 0);
        assert_eq!(batcher.len(), 3);
        assert!(batcher.into_iter().all(|b| b.len() == 1));
    }

    #[test]
    fn test_not_restartable() {
        let mut batcher = FrontierBatcher::new([1u64, 2, 3], 2);
        assert_eq!(batcher.next(), Some(vec![1, 2]));
        assert_eq!(batcher.remaining(), 1);
        assert_eq!(batcher.next(), Some(vec![3]));
        assert_eq!(batcher.next(), None);
        assert_eq!(batcher.next(), None);
    }

    #[test]
    fn test_string_ids() {
        let batches: Vec<Vec<String>> =
            FrontierBatcher::new(["b".to_string(), "a".to_string()], 1).collect();
        assert_eq!(batches, vec![vec!["a".to_string()], vec!["b".to_string()]]);
    }

    #[test]
    fn test_visited_admission_is_idempotent() {
        let visited = VisitedSet::new();
        assert_eq!(visited.admit(vec![1u64, 2, 3]), vec![1, 2, 3]);
        assert_eq!(visited.admit(vec![3, 4]), vec![4]);
        assert!(visited.admit(vec![1, 2]).is_empty());
        assert_eq!(visited.len(), 4);
        assert!(visited.contains(&4));
    }

    #[test]
    fn test_retain_unvisited() {
        let visited = VisitedSet::new();
        visited.admit(vec![1u64, 2]);
        let mut next: HashSet<u64> = [1, 2, 3, 4].into_iter().collect();
        visited.retain_unvisited(&mut next);
        let mut left: Vec<u64> = next.into_iter().collect();
        left.sort();
        assert_eq!(left, vec![3, 4]);
    }
}
