//! Immutable progress values handed to renderers.

/// Where a task currently is in its transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Connecting,
    Downloading,
    Finalizing,
    Paused,
}

impl ProgressPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressPhase::Connecting => "connecting",
            ProgressPhase::Downloading => "downloading",
            ProgressPhase::Finalizing => "finalizing",
            ProgressPhase::Paused => "paused",
        }
    }
}

/// Point-in-time copy of one task's progress (or of the aggregate TOTAL,
/// which uses queue id 0).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub queue_id: i64,
    pub downloaded: u64,
    pub total: Option<u64>,
    pub phase: ProgressPhase,
    pub speed_bps: f64,
    pub eta_seconds: Option<f64>,
}

impl ProgressSnapshot {
    /// New snapshot with downloaded clamped into `[0, total]`.
    pub fn new(
        queue_id: i64,
        downloaded: u64,
        total: Option<u64>,
        phase: ProgressPhase,
        speed_bps: f64,
        eta_seconds: Option<f64>,
    ) -> Self {
        let downloaded = match total {
            Some(t) => downloaded.min(t),
            None => downloaded,
        };
        Self {
            queue_id,
            downloaded,
            total,
            phase,
            speed_bps: speed_bps.max(0.0),
            eta_seconds,
        }
    }

    /// Percent complete, clamped to [0, 100]. 0 while the total is unknown.
    pub fn percentage(&self) -> u8 {
        match self.total {
            Some(total) if total > 0 => {
                (((self.downloaded as f64 / total as f64) * 100.0) as u64).min(100) as u8
            }
            _ => 0,
        }
    }

    /// Speed in MiB/s.
    pub fn speed_mbps(&self) -> f64 {
        self.speed_bps / (1024.0 * 1024.0)
    }

    /// ETA as `MM:SS`; "00:00" when unknown.
    pub fn eta_formatted(&self) -> String {
        let Some(eta) = self.eta_seconds else {
            return "00:00".to_string();
        };
        let eta = eta.max(0.0) as u64;
        format!("{:02}:{:02}", eta / 60, eta % 60)
    }
}
