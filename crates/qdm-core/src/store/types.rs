//! Types stored in the task database.

/// Task identifier (UUID v4, stored as text).
pub type TaskId = String;

/// Lifecycle status stored as a string in the database.
///
/// Transitions are owned by the engine: PENDING → DOWNLOADING →
/// {PAUSED, COMPLETED, FAILED}, and PAUSED → DOWNLOADING on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Downloading,
    Paused,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => TaskStatus::Pending,
            "downloading" => TaskStatus::Downloading,
            "paused" => TaskStatus::Paused,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Failed,
        }
    }

    /// COMPLETED and FAILED are terminal; only terminal tasks are archived.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One URL's work item and its persisted state.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub url: String,
    pub status: TaskStatus,
    /// Bytes written so far.
    pub downloaded: u64,
    /// Total bytes, once known. Stays `None` for chunked transfers.
    pub total: Option<u64>,
    /// True iff the server advertised byte ranges, a fixed length, and no
    /// chunked transfer encoding.
    pub resumable: bool,
    /// True after the first successful capability probe.
    pub capability_checked: bool,
    /// 1-based position in the active queue; 0 means "assign on add".
    pub queue_order: i64,
}

impl Task {
    /// New PENDING task for `url` with a fresh id. The store assigns the
    /// queue position when the task is added.
    pub fn create(url: &str) -> Task {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            status: TaskStatus::Pending,
            downloaded: 0,
            total: None,
            resumable: true,
            capability_checked: false,
            queue_order: 0,
        }
    }
}

/// Frozen snapshot of a task at the moment it was archived.
///
/// Never re-enters the active queue; `clone_from_archive` mints a new task
/// instead.
#[derive(Debug, Clone)]
pub struct ArchivedTask {
    pub task: Task,
    /// RFC 3339 UTC timestamp of archival.
    pub archived_at: String,
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::Downloading,
            TaskStatus::Paused,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::from_str(s.as_str()), s);
        }
    }

    #[test]
    fn unknown_status_maps_to_failed() {
        assert_eq!(TaskStatus::from_str("bogus"), TaskStatus::Failed);
    }

    #[test]
    fn create_yields_fresh_pending_task() {
        let a = Task::create("https://example.com/a.bin");
        let b = Task::create("https://example.com/a.bin");
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, TaskStatus::Pending);
        assert_eq!(a.downloaded, 0);
        assert_eq!(a.total, None);
        assert!(!a.capability_checked);
        assert_eq!(a.queue_order, 0);
    }
}
