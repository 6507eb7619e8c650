//! Mutable, lock-guarded per-task progress.

use std::sync::Mutex;
use std::time::Instant;

use super::snapshot::{ProgressPhase, ProgressSnapshot};

/// Speed is recomputed over windows at least this long so it reads smooth.
const SPEED_WINDOW_MS: u128 = 500;

/// Live progress for one task. Workers mutate it; renderers take
/// snapshots. Every access goes through the internal mutex.
pub struct ProgressState {
    inner: Mutex<Inner>,
}

struct Inner {
    queue_id: i64,
    downloaded: u64,
    total: Option<u64>,
    phase: ProgressPhase,
    speed_bps: f64,
    eta_seconds: Option<f64>,
    window_downloaded: u64,
    window_start: Instant,
}

impl ProgressState {
    pub fn new(queue_id: i64, total: Option<u64>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue_id,
                downloaded: 0,
                total,
                phase: ProgressPhase::Connecting,
                speed_bps: 0.0,
                eta_seconds: None,
                window_downloaded: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Record progress. Clamps `downloaded` to `total` when total is known,
    /// flips Connecting → Downloading on the first bytes, and refreshes the
    /// smoothed speed once per window.
    pub fn update(&self, downloaded: u64, total: Option<u64>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(t) = total {
            inner.total = Some(t);
        }
        inner.downloaded = match inner.total {
            Some(t) => downloaded.min(t),
            None => downloaded,
        };

        if inner.downloaded > 0 && inner.phase == ProgressPhase::Connecting {
            inner.phase = ProgressPhase::Downloading;
        }

        let elapsed = inner.window_start.elapsed();
        if elapsed.as_millis() >= SPEED_WINDOW_MS {
            let gained = inner.downloaded.saturating_sub(inner.window_downloaded);
            inner.speed_bps = (gained as f64 / elapsed.as_secs_f64()).max(0.0);
            inner.eta_seconds = match (inner.total, inner.speed_bps) {
                (Some(total), speed) if speed > 0.0 && total > inner.downloaded => {
                    Some((total - inner.downloaded) as f64 / speed)
                }
                _ => None,
            };
            inner.window_downloaded = inner.downloaded;
            inner.window_start = Instant::now();
        }
    }

    pub fn set_phase(&self, phase: ProgressPhase) {
        self.inner.lock().unwrap().phase = phase;
    }

    pub fn phase(&self) -> ProgressPhase {
        self.inner.lock().unwrap().phase
    }

    /// Atomic copy of the current state.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock().unwrap();
        ProgressSnapshot::new(
            inner.queue_id,
            inner.downloaded,
            inner.total,
            inner.phase,
            inner.speed_bps,
            inner.eta_seconds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn first_bytes_flip_connecting_to_downloading() {
        let state = ProgressState::new(1, Some(100));
        assert_eq!(state.snapshot().phase, ProgressPhase::Connecting);
        state.update(0, None);
        assert_eq!(state.snapshot().phase, ProgressPhase::Connecting);
        state.update(10, None);
        assert_eq!(state.snapshot().phase, ProgressPhase::Downloading);
    }

    #[test]
    fn downloaded_clamps_to_total() {
        let state = ProgressState::new(1, Some(100));
        state.update(250, None);
        let snap = state.snapshot();
        assert_eq!(snap.downloaded, 100);
        assert_eq!(snap.percentage(), 100);
    }

    #[test]
    fn total_can_arrive_late() {
        let state = ProgressState::new(1, None);
        state.update(10, None);
        assert_eq!(state.snapshot().total, None);
        state.update(20, Some(1000));
        assert_eq!(state.snapshot().total, Some(1000));
    }

    #[test]
    fn speed_updates_only_after_window() {
        let state = ProgressState::new(1, Some(1_000_000));
        state.update(1000, None);
        assert_eq!(state.snapshot().speed_bps, 0.0, "window not elapsed yet");

        thread::sleep(Duration::from_millis(550));
        state.update(101_000, None);
        let snap = state.snapshot();
        assert!(snap.speed_bps > 0.0);
        assert!(snap.eta_seconds.is_some());
    }

    #[test]
    fn explicit_phase_set() {
        let state = ProgressState::new(1, None);
        state.set_phase(ProgressPhase::Finalizing);
        assert_eq!(state.snapshot().phase, ProgressPhase::Finalizing);
    }
}
