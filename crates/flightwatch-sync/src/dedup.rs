//! Generation-based deduplication of flight ids across polling cycles.
//!
//! Workers read the previous generation through a shared immutable handle and collect the
//! ids they observe into their own [`CycleAccumulator`]. The orchestrator merges those after
//! fan-in and swaps the merged set in as the next generation; nothing is mutated in place.

use std::collections::HashSet;
use std::sync::Arc;

use flightwatch_core::FlightId;
use tokio::sync::Mutex;

/// Flight ids known as of the end of a completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupGeneration {
    ids: HashSet<FlightId>,
}

impl DedupGeneration {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_new(&self, id: &str) -> bool {
        !self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<FlightId> for DedupGeneration {
    fn from_iter<I: IntoIterator<Item = FlightId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Ids observed during the in-progress cycle, in observation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleAccumulator {
    ids: Vec<FlightId>,
}

impl CycleAccumulator {
    pub fn record(&mut self, id: impl Into<FlightId>) {
        self.ids.push(id.into());
    }

    pub fn merge(&mut self, other: CycleAccumulator) {
        self.ids.extend(other.ids);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[FlightId] {
        &self.ids
    }

    pub fn into_generation(self) -> DedupGeneration {
        self.ids.into_iter().collect()
    }
}

#[derive(Debug, Default)]
pub struct DedupTracker {
    current: Arc<DedupGeneration>,
    rotations: u64,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only handle on the generation workers consult during a cycle.
    pub fn current(&self) -> Arc<DedupGeneration> {
        Arc::clone(&self.current)
    }

    /// Number of completed rotations, i.e. the ordinal of the current generation.
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Replace the current generation wholesale. Ids absent from `accumulation` drop out.
    pub fn rotate(&mut self, accumulation: CycleAccumulator) -> Arc<DedupGeneration> {
        self.current = Arc::new(accumulation.into_generation());
        self.rotations += 1;
        self.current()
    }
}

/// Ids already handed to a detail fetch in the running cycle, shared by all region workers
/// so overlapping bounds do not fetch the same flight twice. Only the claiming worker decides
/// whether a claimed id reaches the next generation.
#[derive(Debug, Default)]
pub struct CycleClaims {
    claimed: Mutex<HashSet<FlightId>>,
}

impl CycleClaims {
    /// `true` if the caller is the first to claim `id` this cycle.
    pub async fn try_claim(&self, id: &str) -> bool {
        let mut claimed = self.claimed.lock().await;
        if claimed.contains(id) {
            return false;
        }
        claimed.insert(id.to_string())
    }

    pub async fn len(&self) -> usize {
        self.claimed.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.claimed.lock().await.is_empty()
    }
}
