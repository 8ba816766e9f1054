//! Expansion run configuration.

use serde::{Deserialize, Serialize};

use crate::membership::CutoffPolicy;
use crate::{Error, Result};

pub const DEFAULT_ROUND_BUDGET: u32 = 5;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_NEIGHBORS_PER_QUERY: usize = 1024;

/// Knobs for one expansion run.
///
/// Missing fields take their defaults when deserialized, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Number of expansion rounds.
    pub round_budget: u32,
    /// Ids per similarity query.
    pub batch_size: usize,
    /// `k` for every k-NN query.
    pub neighbors_per_query: usize,
    /// Batches in flight at once within a round. 1 = sequential.
    pub max_concurrent_batches: usize,
    pub cutoff: CutoffPolicy,
    /// Tally a queried entity returned as its own neighbor.
    pub count_self_matches: bool,
    /// Stop dispatching new batches this many milliseconds after run start.
    pub deadline_ms: Option<u64>,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            round_budget: DEFAULT_ROUND_BUDGET,
            batch_size: DEFAULT_BATCH_SIZE,
            neighbors_per_query: DEFAULT_NEIGHBORS_PER_QUERY,
            max_concurrent_batches: 1,
            cutoff: CutoffPolicy::default(),
            count_self_matches: true,
            deadline_ms: None,
        }
    }
}

impl ExpansionConfig {
    /// Parse a JSON config; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.round_budget == 0 {
            return Err(Error::InvalidInput("round_budget must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidInput("batch_size must be at least 1".into()));
        }
        if self.neighbors_per_query == 0 {
            return Err(Error::InvalidInput("neighbors_per_query must be at least 1".into()));
        }
        if self.max_concurrent_batches == 0 {
            return Err(Error::InvalidInput("max_concurrent_batches must be at least 1".into()));
        }
        self.cutoff.validate()
    }

    /// Acceptance threshold for this config's round budget.
    pub fn cutoff(&self) -> u64 {
        self.cutoff.cutoff(self.round_budget)
    }

    pub fn with_round_budget(mut self, rounds: u32) -> Self {
        self.round_budget = rounds;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_neighbors_per_query(mut self, k: usize) -> Self {
        self.neighbors_per_query = k;
        self
    }

    pub fn with_max_concurrent_batches(mut self, n: usize) -> Self {
        self.max_concurrent_batches = n;
        self
    }

    pub fn with_cutoff(mut self, cutoff: CutoffPolicy) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn with_self_matches(mut self, count: bool) -> Self {
        self.count_self_matches = count;
        self
    }

    pub fn with_deadline_ms(mut self, ms: u64) -> Self {
        self.deadline_ms = Some(ms);
        self
    }
}
