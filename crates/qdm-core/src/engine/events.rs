//! Task lifecycle events and the archive listener.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::store::{Task, TaskStore};

/// Notified when a task reaches a terminal status (COMPLETED or FAILED).
#[async_trait]
pub trait TaskEventListener: Send + Sync {
    async fn on_task_finished(&self, task: &Task);
}

/// Listener registry owned by the engine. Listeners run in registration
/// order; a listener failure is its own problem and never unwinds the
/// engine.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Arc<dyn TaskEventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn TaskEventListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    pub async fn notify_task_finished(&self, task: &Task) {
        let listeners: Vec<_> = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_task_finished(task).await;
        }
    }
}

/// Moves terminal tasks into the archive table. This is the only archival
/// path during engine operation, so a task is archived exactly once; a
/// failure here is logged and the queue keeps running.
pub struct ArchiveListener {
    store: TaskStore,
}

impl ArchiveListener {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskEventListener for ArchiveListener {
    async fn on_task_finished(&self, task: &Task) {
        if !task.status.is_terminal() {
            return;
        }
        match self.store.archive_task(&task.id).await {
            Ok(archived) => {
                tracing::debug!(
                    task = %task.id,
                    at = %archived.archived_at,
                    "task archived"
                );
            }
            Err(e) => {
                tracing::warn!(task = %task.id, "could not archive task: {}", e);
            }
        }
    }
}
