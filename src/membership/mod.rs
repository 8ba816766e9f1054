//! Membership filter: turns hit counts into a cluster.
//!
//! An entity is accepted when its hit count reaches the cutoff. The cutoff
//! is derived from the round budget by an explicit [`CutoffPolicy`]; the
//! default demands rediscovery in nearly every round, which filters out
//! one-off spurious neighbor edges.

use serde::{Deserialize, Serialize};

use crate::model::{ClusterMember, ClusterResult, EntityId};
use crate::{Error, Result};

// ============================================================================
// Cutoff policy
// ============================================================================

/// Slack subtracted before rounding a fractional cutoff up.
const FRACTION_EPSILON: f64 = 1e-9;

/// How the acceptance cutoff is derived from the round budget.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum CutoffPolicy {
    /// `round_budget - 1`, saturating at 0.
    #[default]
    RoundsMinusOne,
    /// `ceil(fraction * round_budget)`, fraction in `[0, 1]`.
    Fraction(f64),
    /// A fixed threshold, independent of the budget.
    Absolute(u64),
}

impl CutoffPolicy {
    pub fn validate(&self) -> Result<()> {
        match self {
            CutoffPolicy::Fraction(f) if !(0.0..=1.0).contains(f) => Err(Error::InvalidInput(
                format!("cutoff fraction must be within [0, 1], got {f}"),
            )),
            _ => Ok(()),
        }
    }

    /// Minimum hit count for a run with the given round budget.
    pub fn cutoff(&self, round_budget: u32) -> u64 {
        let budget = u64::from(round_budget);
        match *self {
            CutoffPolicy::RoundsMinusOne => budget.saturating_sub(1),
            // Products like 0.14 * 100 land a hair above the integer.
            CutoffPolicy::Fraction(f) => {
                ((f.clamp(0.0, 1.0) * budget as f64) - FRACTION_EPSILON).ceil().max(0.0) as u64
            }
            CutoffPolicy::Absolute(n) => n,
        }
    }
}

// ============================================================================
// MembershipFilter
// ============================================================================

/// Selects counts at or above a cutoff, in result order.
pub struct MembershipFilter;

impl MembershipFilter {
    /// Every `(id, count)` with `count >= cutoff`, sorted by descending
    /// count then ascending id.
    pub fn filter<'a, Id, I>(counts: I, cutoff: u64) -> ClusterResult<Id>
    where
        Id: EntityId,
        I: IntoIterator<Item = (&'a Id, &'a u64)>,
    {
        let mut members: Vec<ClusterMember<Id>> = counts
            .into_iter()
            .filter(|(_, n)| **n >= cutoff)
            .map(|(id, n)| ClusterMember { id: id.clone(), count: *n })
            .collect();
        members.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));
        ClusterResult::from_ordered(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_policy_is_rounds_minus_one() {
        let policy = CutoffPolicy::default();
        assert_eq!(policy.cutoff(5), 4);
        assert_eq!(policy.cutoff(3), 2);
        assert_eq!(policy.cutoff(1), 0);
        assert_eq!(policy.cutoff(0), 0);
    }

    #[test]
    fn test_fraction_and_absolute() {
        assert_eq!(CutoffPolicy::Fraction(0.8).cutoff(5), 4);
        assert_eq!(CutoffPolicy::Fraction(0.5).cutoff(5), 3);
        assert_eq!(CutoffPolicy::Fraction(1.0).cutoff(5), 5);
        assert_eq!(CutoffPolicy::Fraction(0.0).cutoff(5), 0);
        assert_eq!(CutoffPolicy::Absolute(5120).cutoff(5), 5120);
    }

    #[test]
    fn test_fraction_exact_products_do_not_round_up() {
        assert_eq!(CutoffPolicy::Fraction(0.14).cutoff(100), 14);
        assert_eq!(CutoffPolicy::Fraction(0.07).cutoff(100), 7);
        assert_eq!(CutoffPolicy::Fraction(0.7).cutoff(10), 7);
        assert_eq!(CutoffPolicy::Fraction(0.6).cutoff(5), 3);
        assert_eq!(CutoffPolicy::Fraction(0.141).cutoff(100), 15);
    }

    #[test]
    fn test_fraction_out_of_range_rejected() {
        assert!(CutoffPolicy::Fraction(1.5).validate().is_err());
        assert!(CutoffPolicy::Fraction(-0.1).validate().is_err());
        assert!(CutoffPolicy::Fraction(f64::NAN).validate().is_err());
        assert!(CutoffPolicy::Fraction(0.75).validate().is_ok());
    }

    #[test]
    fn test_filter_orders_by_count_then_id() {
        let counts: HashMap<u64, u64> = [(7, 2), (3, 4), (5, 2), (9, 1), (1, 4)].into_iter().collect();
        let result = MembershipFilter::filter(&counts, 2);
        let pairs: Vec<(u64, u64)> = result.iter().map(|m| (m.id, m.count)).collect();
        assert_eq!(pairs, vec![(1, 4), (3, 4), (5, 2), (7, 2)]);
    }

    #[test]
    fn test_filter_boundary_is_inclusive() {
        let counts: HashMap<u64, u64> = [(1, 3), (2, 2)].into_iter().collect();
        let result = MembershipFilter::filter(&counts, 3);
        assert_eq!(result.len(), 1);
        assert_eq!(result.count_of(&1), Some(3));
        assert_eq!(result.count_of(&2), None);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&CutoffPolicy::Fraction(0.8)).unwrap();
        assert_eq!(json, r#"{"kind":"fraction","value":0.8}"#);
        let back: CutoffPolicy = serde_json::from_str(r#"{"kind":"rounds_minus_one"}"#).unwrap();
        assert_eq!(back, CutoffPolicy::RoundsMinusOne);
    }
}
