//! Per-task pause tokens.
//!
//! Workers poll their token between chunks and segments; the engine sets it
//! on `pause_task` and clears it when a task (re)starts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::store::TaskId;

#[derive(Default)]
pub struct PauseFlags {
    flags: RwLock<HashMap<TaskId, Arc<AtomicBool>>>,
}

impl PauseFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a task, created unset on first use. The same Arc is handed
    /// to the worker so a later `set` is observed mid-transfer.
    pub fn token(&self, task_id: &str) -> Arc<AtomicBool> {
        if let Some(token) = self.flags.read().unwrap().get(task_id) {
            return Arc::clone(token);
        }
        let mut flags = self.flags.write().unwrap();
        Arc::clone(
            flags
                .entry(task_id.to_string())
                .or_insert_with(|| Arc::new(AtomicBool::new(false))),
        )
    }

    pub fn set(&self, task_id: &str, paused: bool) {
        self.token(task_id).store(paused, Ordering::Relaxed);
    }

    pub fn is_set(&self, task_id: &str) -> bool {
        self.flags
            .read()
            .unwrap()
            .get(task_id)
            .map(|t| t.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Drop the token once the task has left execution.
    pub fn remove(&self, task_id: &str) {
        self.flags.write().unwrap().remove(task_id);
    }
}
