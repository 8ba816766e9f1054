//! Cluster membership produced at the end of an expansion run.

use serde::{Deserialize, Serialize};

/// An accepted cluster member and how many times it was rediscovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember<Id> {
    pub id: Id,
    pub count: u64,
}

/// Ordered cluster membership: descending count, then ascending id.
///
/// Built once by [`crate::membership::MembershipFilter`] and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClusterResult<Id> {
    members: Vec<ClusterMember<Id>>,
}

impl<Id> ClusterResult<Id> {
    /// Wrap members that are already in result order.
    pub(crate) fn from_ordered(members: Vec<ClusterMember<Id>>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[ClusterMember<Id>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClusterMember<Id>> {
        self.members.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        self.members.iter().map(|m| &m.id)
    }

    pub fn count_of(&self, id: &Id) -> Option<u64>
    where
        Id: PartialEq,
    {
        self.members.iter().find(|m| &m.id == id).map(|m| m.count)
    }

    pub fn into_members(self) -> Vec<ClusterMember<Id>> {
        self.members
    }
}

impl<Id> Default for ClusterResult<Id> {
    fn default() -> Self {
        Self { members: Vec::new() }
    }
}

impl<'a, Id> IntoIterator for &'a ClusterResult<Id> {
    type Item = &'a ClusterMember<Id>;
    type IntoIter = std::slice::Iter<'a, ClusterMember<Id>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl<Id> IntoIterator for ClusterResult<Id> {
    type Item = ClusterMember<Id>;
    type IntoIter = std::vec::IntoIter<ClusterMember<Id>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}
