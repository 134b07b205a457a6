use std::sync::Arc;

use chrono::{DateTime, Utc};
use flightwatch_core::Bound;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::DEFAULT_WORKER_LIMIT;
use crate::dedup::{CycleAccumulator, DedupTracker};
use crate::worker::{CycleContext, RegionOutcome, RegionWorker};

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    /// Generation number in effect after this cycle.
    pub generation: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub regions: usize,
    pub failed_regions: usize,
    pub observed: usize,
    pub new_flights: usize,
    pub persisted: usize,
    pub abandoned: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

#[derive(Default)]
struct CycleTally {
    failed_regions: usize,
    new_flights: usize,
    persisted: usize,
    abandoned: usize,
    failed: usize,
    skipped: usize,
}

impl CycleTally {
    fn add(&mut self, outcome: &RegionOutcome) {
        if outcome.summary_failed {
            self.failed_regions += 1;
        }
        self.new_flights += outcome.new_flights;
        self.persisted += outcome.persisted;
        self.abandoned += outcome.abandoned;
        self.failed += outcome.failed;
        self.skipped += outcome.skipped;
    }
}

/// Fans one region worker out per bound, waits for all of them, then rotates the dedup
/// generation. Owns the tracker; workers only ever see the previous generation.
pub struct CycleOrchestrator {
    bounds: Vec<Bound>,
    worker: Arc<RegionWorker>,
    tracker: DedupTracker,
    worker_limit: usize,
}

impl CycleOrchestrator {
    pub fn new(bounds: Vec<Bound>, worker: Arc<RegionWorker>) -> Self {
        Self {
            bounds,
            worker,
            tracker: DedupTracker::new(),
            worker_limit: DEFAULT_WORKER_LIMIT,
        }
    }

    pub fn with_worker_limit(mut self, worker_limit: usize) -> Self {
        self.worker_limit = worker_limit.max(1);
        self
    }

    pub fn tracker(&self) -> &DedupTracker {
        &self.tracker
    }

    /// Polls cycle after cycle with no pause until `cancel` fires. Returns the number of cycles
    /// that completed and rotated.
    pub async fn run(&mut self, cancel: CancellationToken) -> u64 {
        let mut completed = 0;
        while !cancel.is_cancelled() {
            let summary = self.run_cycle(&cancel).await;
            if summary.cancelled {
                break;
            }
            completed += 1;
        }
        info!(completed, "poller stopped");
        completed
    }

    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleSummary {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", %cycle_id);
        self.cycle(cycle_id, cancel).instrument(span).await
    }

    async fn cycle(&mut self, cycle_id: Uuid, cancel: &CancellationToken) -> CycleSummary {
        let started_at = Utc::now();
        let context = Arc::new(CycleContext::new(
            self.tracker.current(),
            self.worker_limit,
            cancel.child_token(),
        ));

        let mut workers = JoinSet::new();
        for (index, bound) in self.bounds.iter().copied().enumerate() {
            let worker = Arc::clone(&self.worker);
            let context = Arc::clone(&context);
            workers.spawn(
                async move { worker.run(index, bound, context).await }
                    .instrument(info_span!("region", index, %bound)),
            );
        }

        let mut observed = CycleAccumulator::default();
        let mut tally = CycleTally::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => {
                    tally.add(&outcome);
                    observed.merge(outcome.observed);
                }
                Err(err) => {
                    error!(error = %err, "region worker did not finish");
                    tally.failed_regions += 1;
                }
            }
        }

        let observed_count = observed.len();
        let cancelled = cancel.is_cancelled();
        if !cancelled {
            self.tracker.rotate(observed);
        }

        let summary = CycleSummary {
            cycle_id,
            generation: self.tracker.rotations(),
            started_at,
            finished_at: Utc::now(),
            regions: self.bounds.len(),
            failed_regions: tally.failed_regions,
            observed: observed_count,
            new_flights: tally.new_flights,
            persisted: tally.persisted,
            abandoned: tally.abandoned,
            failed: tally.failed,
            skipped: tally.skipped,
            cancelled,
        };
        if cancelled {
            info!(observed = observed_count, "cycle cancelled, generation kept");
        } else {
            info!(
                generation = summary.generation,
                regions = summary.regions,
                failed_regions = summary.failed_regions,
                observed = summary.observed,
                new_flights = summary.new_flights,
                persisted = summary.persisted,
                abandoned = summary.abandoned,
                "cycle complete"
            );
        }
        summary
    }
}
