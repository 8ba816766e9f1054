//! # Expansion Controller
//!
//! Drives one clustering run: rounds of frontier expansion against a
//! [`SimilarityIndex`], hit counting, then the membership cut.
//!
//! ```text
//! seeds → round 1..=budget {
//!     FrontierBatcher → SimilarityIndex × N batches   (bounded concurrency)
//!     ── round barrier ──
//!     ClusterAccumulator += neighbors; next frontier = neighbors − visited
//! } → MembershipFilter(cutoff) → ClusterResult
//! ```
//!
//! Rounds are strictly sequential. Within a round, batches are independent
//! and may run concurrently; the next frontier is only built once every
//! batch of the round has answered.
//!
//! Failure semantics:
//! - an unreachable index at run start aborts the run (`IndexUnavailable`);
//! - a failed batch is logged, recorded as a [`BatchFailure`] and skipped;
//!   its ids stay visited and are never retried;
//! - cancellation (token or deadline) stops dispatch at batch granularity and
//!   returns the partial result tagged [`RunStatus::CancelledPartial`].

pub mod config;
pub mod events;

use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use hashbrown::HashSet;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accumulator::ClusterAccumulator;
use crate::frontier::{FrontierBatcher, VisitedSet};
use crate::index::{QueryResponse, SimilarityIndex};
use crate::membership::MembershipFilter;
use crate::model::EntityId;
use crate::{Error, Result};

pub use config::ExpansionConfig;
pub use events::{BatchFailure, ExpansionEvent, ExpansionOutcome, ExpansionStats, RunStatus};

// ============================================================================
// Stop signal
// ============================================================================

/// Cancellation token plus optional deadline, checked before each dispatch.
struct StopSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl StopSignal {
    fn is_triggered(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

// ============================================================================
// Batch outcome
// ============================================================================

enum BatchOutcome<Id: EntityId> {
    Answered { ids: Vec<Id>, response: QueryResponse<Id> },
    Failed { ids: Vec<Id>, error: Error },
    /// Not dispatched: the run was stopped first.
    Skipped,
}

// ============================================================================
// ExpansionController
// ============================================================================

/// Owns a similarity index handle and runs expansions against it.
///
/// Run state (frontier, visited set, counters) lives inside each call to
/// [`expand`](Self::expand); nothing carries over between runs.
pub struct ExpansionController<I: SimilarityIndex> {
    index: I,
    config: ExpansionConfig,
    progress: Option<UnboundedSender<ExpansionEvent>>,
    cancel: CancellationToken,
}

impl<I: SimilarityIndex> ExpansionController<I> {
    /// Create a controller. Fails with `InvalidInput` on a bad config.
    pub fn new(index: I, config: ExpansionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            index,
            config,
            progress: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Send progress events to `tx`. A dropped receiver is ignored.
    pub fn with_progress(mut self, tx: UnboundedSender<ExpansionEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Stop runs when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops this controller's runs when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Access the underlying index (for advanced use).
    pub fn index(&self) -> &I {
        &self.index
    }

    fn emit(&self, event: ExpansionEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }

    /// Run one expansion from `seeds`.
    ///
    /// Returns `InvalidInput` for an empty seed set and `IndexUnavailable`
    /// when the index fails its health check; every other condition ends in
    /// an [`ExpansionOutcome`].
    pub async fn expand(&self, seeds: impl IntoIterator<Item = I::Id>) -> Result<ExpansionOutcome<I::Id>> {
        let seeds: HashSet<I::Id> = seeds.into_iter().collect();
        if seeds.is_empty() {
            return Err(Error::InvalidInput("seed set is empty".into()));
        }

        self.index.health_check().await.map_err(|e| match e {
            Error::IndexUnavailable(msg) => Error::IndexUnavailable(msg),
            other => Error::IndexUnavailable(other.to_string()),
        })?;

        let started_at = Utc::now();
        let stop = StopSignal {
            token: self.cancel.child_token(),
            deadline: self.config.deadline_ms.map(|ms| Instant::now() + Duration::from_millis(ms)),
        };

        let caps = self.index.capabilities();
        let batch_size = caps.max_batch_size.map_or(self.config.batch_size, |m| self.config.batch_size.min(m.max(1)));
        let k = caps.max_neighbors.map_or(self.config.neighbors_per_query, |m| self.config.neighbors_per_query.min(m));
        let budget = self.config.round_budget;
        let cutoff = self.config.cutoff();

        if caps.includes_self && !self.config.count_self_matches {
            debug!("index returns queried ids as their own neighbors; dropping those matches");
        }
        info!(
            seeds = seeds.len(),
            round_budget = budget,
            batch_size,
            k,
            cutoff,
            includes_self = caps.includes_self,
            "expansion started"
        );
        self.emit(ExpansionEvent::RunStarted { seeds: seeds.len(), round_budget: budget, cutoff });

        let visited = VisitedSet::new();
        let mut counter = ClusterAccumulator::new();
        let mut failures = Vec::new();
        let mut stats = ExpansionStats::default();
        let mut frontier = seeds;
        let mut status = RunStatus::Completed;

        for round in 1..=budget {
            if frontier.is_empty() {
                debug!(round, "frontier empty, stopping early");
                status = RunStatus::FrontierExhausted { rounds: round - 1 };
                break;
            }
            if stop.is_triggered() {
                status = RunStatus::CancelledPartial { completed_rounds: round - 1 };
                break;
            }

            let frontier_size = frontier.len();
            debug!(round, frontier_size, visited = visited.len(), "round started");
            self.emit(ExpansionEvent::RoundStarted { round, frontier_size, visited: visited.len() });

            let batches = FrontierBatcher::new(frontier.drain(), batch_size);
            let outcomes: Vec<BatchOutcome<I::Id>> = stream::iter(batches)
                .map(|batch| self.dispatch(round, batch, k, &visited, &stop))
                .buffered(self.config.max_concurrent_batches)
                .collect()
                .await;

            // Round barrier: every batch has answered (or was skipped).
            let mut next = HashSet::new();
            let mut interrupted = false;
            for outcome in outcomes {
                match outcome {
                    BatchOutcome::Answered { ids, response } => {
                        stats.batches_dispatched += 1;
                        stats.queried += ids.len();
                        stats.missing += response.missing.len();
                        self.fold_response(&response, &mut counter, &mut next);
                    }
                    BatchOutcome::Failed { ids, error } => {
                        stats.batches_dispatched += 1;
                        stats.batches_failed += 1;
                        stats.queried += ids.len();
                        warn!(round, ids = ?ids, error = %error, "batch query failed, skipping");
                        self.emit(ExpansionEvent::BatchFailed {
                            round,
                            ids: ids.iter().map(ToString::to_string).collect(),
                            error: error.to_string(),
                        });
                        failures.push(BatchFailure { round, ids, error: error.to_string() });
                    }
                    BatchOutcome::Skipped => interrupted = true,
                }
            }

            visited.retain_unvisited(&mut next);
            frontier = next;

            if interrupted {
                info!(round, "expansion cancelled mid-round");
                status = RunStatus::CancelledPartial { completed_rounds: round - 1 };
                break;
            }

            stats.rounds_completed = round;
            debug!(
                round,
                next_frontier = frontier.len(),
                visited = visited.len(),
                distinct = counter.len(),
                "round completed"
            );
            self.emit(ExpansionEvent::RoundCompleted {
                round,
                frontier_size,
                visited: visited.len(),
                next_frontier: frontier.len(),
                distinct_discovered: counter.len(),
            });
        }

        stats.distinct_discovered = counter.len();
        stats.total_hits = counter.total_hits();

        let counts = counter.snapshot();
        let result = MembershipFilter::filter(&counts, cutoff);

        info!(
            status = ?status,
            members = result.len(),
            queried = stats.queried,
            failed_batches = stats.batches_failed,
            "expansion finished"
        );
        self.emit(ExpansionEvent::RunFinished { status, members: result.len(), visited: visited.len() });

        Ok(ExpansionOutcome {
            result,
            status,
            cutoff,
            counts,
            failures,
            stats,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Admit a batch into the visited set and query it.
    async fn dispatch(
        &self,
        round: u32,
        batch: Vec<I::Id>,
        k: usize,
        visited: &VisitedSet<I::Id>,
        stop: &StopSignal,
    ) -> BatchOutcome<I::Id> {
        if stop.is_triggered() {
            return BatchOutcome::Skipped;
        }
        // Visited from here on, whatever the query returns.
        let ids = visited.admit(batch);
        if ids.is_empty() {
            return BatchOutcome::Answered { ids, response: QueryResponse::new() };
        }

        debug!(round, size = ids.len(), "dispatching batch");
        match self.index.query(&ids, k).await {
            Ok(response) => {
                if response.is_partial() {
                    debug!(round, missing = response.missing.len(), "index returned no entry for some ids");
                }
                BatchOutcome::Answered { ids, response }
            }
            Err(error) => BatchOutcome::Failed { ids, error },
        }
    }

    /// Tally every neighbor occurrence and collect candidates for the next round.
    fn fold_response(
        &self,
        response: &QueryResponse<I::Id>,
        counter: &mut ClusterAccumulator<I::Id>,
        next: &mut HashSet<I::Id>,
    ) {
        for (queried, matches) in &response.matches {
            if self.config.count_self_matches {
                counter.record_matches(matches);
                for m in matches {
                    next.get_or_insert_with(&m.id, Clone::clone);
                }
            } else {
                for id in matches.iter().map(|m| &m.id).filter(|id| *id != queried) {
                    counter.record_hits([id]);
                    next.get_or_insert_with(id, Clone::clone);
                }
            }
        }
    }
}
