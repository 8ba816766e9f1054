//! Run outcome, diagnostics and progress events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{ClusterResult, EntityId};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunStatus {
    /// Every round of the budget ran.
    Completed,
    /// The frontier emptied after `rounds` rounds; the component is fully explored.
    FrontierExhausted { rounds: u32 },
    /// Cancelled or past its deadline after `completed_rounds` full rounds.
    /// The result reflects whatever had been counted at that point.
    CancelledPartial { completed_rounds: u32 },
}

/// A batch whose query failed. Its ids stay visited and contributed nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure<Id> {
    pub round: u32,
    pub ids: Vec<Id>,
    pub error: String,
}

/// Counters gathered over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionStats {
    pub rounds_completed: u32,
    pub batches_dispatched: usize,
    pub batches_failed: usize,
    /// Ids submitted to the index, failed batches included.
    pub queried: usize,
    /// Queried ids the index had no entry for.
    pub missing: usize,
    pub distinct_discovered: usize,
    pub total_hits: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct ExpansionOutcome<Id: EntityId> {
    pub result: ClusterResult<Id>,
    pub status: RunStatus,
    pub cutoff: u64,
    /// Final hit counter, every discovered id included.
    pub counts: BTreeMap<Id, u64>,
    pub failures: Vec<BatchFailure<Id>>,
    pub stats: ExpansionStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<Id: EntityId> ExpansionOutcome<Id> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, RunStatus::CancelledPartial { .. })
    }

    /// Cancelled, or at least one batch failed.
    pub fn is_partial(&self) -> bool {
        self.is_cancelled() || !self.failures.is_empty()
    }

    pub fn count_of(&self, id: &Id) -> u64 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Progress record emitted while a run is in flight. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ExpansionEvent {
    RunStarted {
        seeds: usize,
        round_budget: u32,
        cutoff: u64,
    },
    RoundStarted {
        round: u32,
        frontier_size: usize,
        visited: usize,
    },
    BatchFailed {
        round: u32,
        ids: Vec<String>,
        error: String,
    },
    RoundCompleted {
        round: u32,
        frontier_size: usize,
        visited: usize,
        next_frontier: usize,
        distinct_discovered: usize,
    },
    RunFinished {
        status: RunStatus,
        members: usize,
        visited: usize,
    },
}
