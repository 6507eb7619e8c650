//! Terminal progress painter.
//!
//! A single background task repaints at a fixed minimum interval: one TOTAL
//! line plus one line per active task in multi mode, a single line in
//! single mode. Workers never touch the terminal.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::aggregate::ProgressAggregator;
use super::snapshot::ProgressSnapshot;

/// Minimum repaint interval.
const PAINT_INTERVAL: Duration = Duration::from_millis(100);

/// Width used when stdout is not a terminal or COLUMNS is unset.
const DEFAULT_WIDTH: usize = 80;

pub struct ProgressRenderer {
    aggregator: Arc<ProgressAggregator>,
    multi: bool,
    stop: Arc<AtomicBool>,
}

impl ProgressRenderer {
    /// Multi mode paints a TOTAL line plus one line per task; single mode
    /// paints only the task line.
    pub fn new(aggregator: Arc<ProgressAggregator>, multi: bool) -> Self {
        Self {
            aggregator,
            multi,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle used to end the paint loop.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run the paint loop until the stop handle trips. Paints a final frame
    /// and a trailing newline on exit.
    pub async fn run(self) {
        let width = terminal_width();
        let mut painted_lines = 0usize;
        loop {
            painted_lines = self.paint(width, painted_lines);
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            tokio::time::sleep(PAINT_INTERVAL).await;
        }
        if painted_lines > 0 {
            println!();
        }
    }

    fn paint(&self, width: usize, previous_lines: usize) -> usize {
        let snapshots = self.aggregator.active_snapshots();
        let mut lines: Vec<String> = Vec::new();
        if self.multi {
            lines.push(format_line("TOTAL", &self.aggregator.total_snapshot(), width));
            for snap in &snapshots {
                lines.push(format_line(&format!("#{}", snap.queue_id), snap, width));
            }
        } else if let Some(snap) = snapshots.first() {
            lines.push(format_line(&format!("#{}", snap.queue_id), snap, width));
        }

        let mut out = io::stdout().lock();
        // Move back over the previous frame, clearing each line.
        if previous_lines > 0 {
            let _ = write!(out, "\x1b[{}A", previous_lines);
        }
        for line in &lines {
            let _ = write!(out, "\x1b[2K{}\r\n", line);
        }
        // Previous frame was taller: clear the leftover lines.
        for _ in lines.len()..previous_lines {
            let _ = write!(out, "\x1b[2K\r\n");
        }
        if previous_lines > lines.len() {
            let _ = write!(out, "\x1b[{}A", previous_lines - lines.len());
        }
        let _ = out.flush();
        lines.len()
    }
}

/// One painted line, truncated to the terminal width.
fn format_line(label: &str, snap: &ProgressSnapshot, width: usize) -> String {
    let size = match snap.total {
        Some(total) => format!(
            "{:.1}/{:.1} MiB",
            mib(snap.downloaded),
            mib(total)
        ),
        None => format!("{:.1} MiB", mib(snap.downloaded)),
    };
    let line = format!(
        "{:<6} [{:<10}] {:>3}%  {}  {:.2} MiB/s  ETA {}",
        label,
        snap.phase.as_str(),
        snap.percentage(),
        size,
        snap.speed_mbps(),
        snap.eta_formatted()
    );
    if line.len() > width {
        line.chars().take(width).collect()
    } else {
        line
    }
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn terminal_width() -> usize {
    if !io::stdout().is_terminal() {
        return DEFAULT_WIDTH;
    }
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.parse().ok())
        .unwrap_or(DEFAULT_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::snapshot::ProgressPhase;

    #[test]
    fn line_contains_label_percent_and_eta() {
        let snap = ProgressSnapshot::new(
            2,
            50 * 1024 * 1024,
            Some(100 * 1024 * 1024),
            ProgressPhase::Downloading,
            1024.0 * 1024.0,
            Some(50.0),
        );
        let line = format_line("#2", &snap, 120);
        assert!(line.starts_with("#2"));
        assert!(line.contains("50%"));
        assert!(line.contains("50.0/100.0 MiB"));
        assert!(line.contains("1.00 MiB/s"));
        assert!(line.contains("ETA 00:50"));
    }

    #[test]
    fn line_is_truncated_to_width() {
        let snap = ProgressSnapshot::new(
            1,
            0,
            None,
            ProgressPhase::Connecting,
            0.0,
            None,
        );
        let line = format_line("#1", &snap, 20);
        assert!(line.chars().count() <= 20);
    }

    #[test]
    fn unknown_total_renders_bytes_only() {
        let snap = ProgressSnapshot::new(
            1,
            3 * 1024 * 1024,
            None,
            ProgressPhase::Downloading,
            0.0,
            None,
        );
        let line = format_line("#1", &snap, 120);
        assert!(line.contains("3.0 MiB"));
        assert!(!line.contains("3.0/"));
    }
}
