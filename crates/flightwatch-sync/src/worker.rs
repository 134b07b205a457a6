use std::sync::Arc;

use flightwatch_core::{Bound, SummaryRow};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AbandonPolicy;
use crate::dedup::{CycleAccumulator, CycleClaims, DedupGeneration};
use crate::detail::{DetailError, DetailFetcher};
use crate::summary::SummaryFetcher;

/// State shared by every region worker of one cycle. Built by the orchestrator at fan-out and
/// dropped at fan-in.
pub struct CycleContext {
    pub previous: Arc<DedupGeneration>,
    pub claims: CycleClaims,
    pub admission: Arc<Semaphore>,
    pub cancel: CancellationToken,
}

impl CycleContext {
    pub fn new(previous: Arc<DedupGeneration>, worker_limit: usize, cancel: CancellationToken) -> Self {
        Self {
            previous,
            claims: CycleClaims::default(),
            admission: Arc::new(Semaphore::new(worker_limit.max(1))),
            cancel,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionOutcome {
    pub index: usize,
    pub observed: CycleAccumulator,
    pub summary_failed: bool,
    pub new_flights: usize,
    pub persisted: usize,
    pub abandoned: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RegionOutcome {
    fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }
}

pub struct RegionWorker {
    summary: Arc<SummaryFetcher>,
    details: Arc<DetailFetcher>,
    abandon_policy: AbandonPolicy,
}

impl RegionWorker {
    pub fn new(
        summary: Arc<SummaryFetcher>,
        details: Arc<DetailFetcher>,
        abandon_policy: AbandonPolicy,
    ) -> Self {
        Self {
            summary,
            details,
            abandon_policy,
        }
    }

    /// Poll one bound and fetch details for the flights the previous generation has not seen.
    /// Detail fetches run one after another; parallelism is across regions only.
    pub async fn run(&self, index: usize, bound: Bound, cycle: Arc<CycleContext>) -> RegionOutcome {
        let mut outcome = RegionOutcome::new(index);

        let _permit = tokio::select! {
            biased;
            _ = cycle.cancel.cancelled() => return outcome,
            permit = cycle.admission.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    outcome.summary_failed = true;
                    return outcome;
                }
            },
        };

        let summary = tokio::select! {
            biased;
            _ = cycle.cancel.cancelled() => return outcome,
            summary = self.summary.fetch(&bound) => summary,
        };
        let flights = match summary {
            Ok(flights) => flights,
            Err(err) => {
                warn!(%bound, error = %err, "summary poll failed, region skipped this cycle");
                outcome.summary_failed = true;
                return outcome;
            }
        };

        for (flight_id, payload) in flights.iter() {
            if cycle.cancel.is_cancelled() {
                break;
            }
            if !cycle.previous.is_new(flight_id) {
                outcome.observed.record(flight_id);
                continue;
            }
            if !cycle.claims.try_claim(flight_id).await {
                debug!(flight_id, "already claimed by another region this cycle");
                outcome.skipped += 1;
                continue;
            }

            outcome.new_flights += 1;
            if let Some(row) = SummaryRow::from_payload(payload) {
                debug!(
                    flight_id,
                    registration = row.registration.as_deref().unwrap_or("-"),
                    callsign = row.callsign.as_deref().unwrap_or("-"),
                    "new flight"
                );
            }

            match self.details.fetch_detail(flight_id, &cycle.cancel).await {
                Ok(persisted) => {
                    info!(
                        flight_id,
                        registration = %persisted.registration,
                        departure = persisted.departure,
                        "flight persisted"
                    );
                    outcome.persisted += 1;
                    outcome.observed.record(flight_id);
                }
                Err(DetailError::Cancelled { .. }) => break,
                Err(err) if err.is_abandoned() => {
                    warn!(flight_id, error = %err, "detail fetch abandoned");
                    outcome.abandoned += 1;
                    if self.abandon_policy == AbandonPolicy::Record {
                        outcome.observed.record(flight_id);
                    }
                }
                Err(err) => {
                    warn!(flight_id, error = %err, "detail not persisted");
                    outcome.failed += 1;
                    outcome.observed.record(flight_id);
                }
            }
        }

        debug!(
            observed = outcome.observed.len(),
            new_flights = outcome.new_flights,
            persisted = outcome.persisted,
            "region done"
        );
        outcome
    }
}
