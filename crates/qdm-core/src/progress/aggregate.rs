//! Fuses per-task progress into one TOTAL.

use std::sync::{Arc, Mutex};

use crate::store::TaskId;

use super::snapshot::{ProgressPhase, ProgressSnapshot};
use super::state::ProgressState;

/// Queue id used for the aggregate TOTAL snapshot.
pub const TOTAL_QUEUE_ID: i64 = 0;

/// Thread-safe registry of active progress states, in insertion order.
pub struct ProgressAggregator {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    states: Vec<(TaskId, Arc<ProgressState>)>,
    /// Bytes from tasks already removed this session.
    session_downloaded: u64,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Register a task's state. Re-adding an id replaces its state.
    pub fn add_task(&self, task_id: &str, state: Arc<ProgressState>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.states.iter_mut().find(|(id, _)| id == task_id) {
            entry.1 = state;
        } else {
            inner.states.push((task_id.to_string(), state));
        }
    }

    /// Drop a finished task, folding its final byte count into the session
    /// total.
    pub fn remove_task(&self, task_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pos) = inner.states.iter().position(|(id, _)| id == task_id) {
            let (_, state) = inner.states.remove(pos);
            inner.session_downloaded += state.snapshot().downloaded;
        }
    }

    /// Bytes downloaded by tasks that have already been removed.
    pub fn session_downloaded(&self) -> u64 {
        self.inner.lock().unwrap().session_downloaded
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().unwrap().states.len()
    }

    /// Snapshots of all registered tasks, insertion order.
    pub fn active_snapshots(&self) -> Vec<ProgressSnapshot> {
        let inner = self.inner.lock().unwrap();
        inner.states.iter().map(|(_, s)| s.snapshot()).collect()
    }

    pub fn task_snapshot(&self, task_id: &str) -> Option<ProgressSnapshot> {
        let inner = self.inner.lock().unwrap();
        inner
            .states
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, s)| s.snapshot())
    }

    /// The TOTAL line: summed bytes, a summed total only when every active
    /// task knows its total, and a phase derived from the members
    /// (Connecting if any connects, Finalizing if all finalize, else
    /// Downloading).
    pub fn total_snapshot(&self) -> ProgressSnapshot {
        let snapshots = self.active_snapshots();
        if snapshots.is_empty() {
            return ProgressSnapshot::new(
                TOTAL_QUEUE_ID,
                0,
                None,
                ProgressPhase::Downloading,
                0.0,
                None,
            );
        }

        let downloaded: u64 = snapshots.iter().map(|s| s.downloaded).sum();
        let total = if snapshots.iter().all(|s| s.total.is_some()) {
            Some(snapshots.iter().filter_map(|s| s.total).sum::<u64>())
        } else {
            None
        };
        let speed: f64 = snapshots.iter().map(|s| s.speed_bps).sum();

        let eta = match (total, speed) {
            (Some(t), s) if s > 0.0 && t > downloaded => Some((t - downloaded) as f64 / s),
            _ => None,
        };

        let phase = if snapshots.iter().any(|s| s.phase == ProgressPhase::Connecting) {
            ProgressPhase::Connecting
        } else if snapshots.iter().all(|s| s.phase == ProgressPhase::Finalizing) {
            ProgressPhase::Finalizing
        } else {
            ProgressPhase::Downloading
        };

        ProgressSnapshot::new(TOTAL_QUEUE_ID, downloaded, total, phase, speed, eta)
    }
}
