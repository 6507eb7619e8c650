//! The download engine: scheduling loop, status authority, pause protocol,
//! and the task event bus.
//!
//! The engine is the only writer of task status. Workers report an outcome
//! (`Completed | Paused | Failed`) and the engine drives the transition,
//! fires events, and keeps the "one worker per task" invariant through a
//! mutex-guarded active set.

mod events;
mod pause;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;

use crate::config::QdmConfig;
use crate::error::{QdmError, QdmResult};
use crate::http::HttpClient;
use crate::progress::{ProgressAggregator, ProgressRenderer};
use crate::store::{Task, TaskStatus, TaskStore};
use crate::worker::{DownloadWorker, WorkerOutcome};

pub use events::{ArchiveListener, EventBus, TaskEventListener};
pub use pause::PauseFlags;

/// Delay between scheduler scans.
const SCAN_INTERVAL: Duration = Duration::from_millis(200);

/// Back-off after a scan error; the loop never dies.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct Engine {
    store: TaskStore,
    cfg: QdmConfig,
    worker: DownloadWorker,
    pause: Arc<PauseFlags>,
    active: Arc<Mutex<HashSet<String>>>,
    events: Arc<EventBus>,
    progress: Arc<ProgressAggregator>,
    stop: Arc<AtomicBool>,
}

impl Engine {
    /// Build an engine over `store`. The archive listener is registered by
    /// default; additional listeners can be added before starting.
    pub fn new(store: TaskStore, cfg: QdmConfig) -> Self {
        let http = Arc::new(HttpClient::new(&cfg));
        let progress = Arc::new(ProgressAggregator::new());
        let worker = DownloadWorker::new(
            store.clone(),
            Arc::clone(&http),
            cfg.download_dir.clone(),
            Arc::clone(&progress),
        );
        let events = EventBus::new();
        events.add_listener(Arc::new(ArchiveListener::new(store.clone())));
        Self {
            store,
            cfg,
            worker,
            pause: Arc::new(PauseFlags::new()),
            active: Arc::new(Mutex::new(HashSet::new())),
            events: Arc::new(events),
            progress,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn aggregator(&self) -> Arc<ProgressAggregator> {
        Arc::clone(&self.progress)
    }

    /// Renderer for this engine's progress; multi-line mode when more than
    /// one task may run at a time.
    pub fn renderer(&self) -> ProgressRenderer {
        ProgressRenderer::new(self.aggregator(), self.cfg.max_parallel > 1)
    }

    pub fn add_listener(&self, listener: Arc<dyn TaskEventListener>) {
        self.events.add_listener(listener);
    }

    /// Request pause for a downloading task: the pause token trips (the
    /// worker observes it within one chunk or segment) and the status
    /// becomes PAUSED.
    pub async fn pause_task(&self, task_id: &str) -> QdmResult<()> {
        let task = self.store.require(task_id).await?;
        if task.status != TaskStatus::Downloading {
            return Err(QdmError::IllegalState(format!(
                "task {} must be downloading to pause, is {}",
                task_id,
                task.status.as_str()
            )));
        }
        self.pause.set(task_id, true);
        self.store.set_status(task_id, TaskStatus::Paused).await?;
        tracing::info!(task = %task_id, "pause requested");
        Ok(())
    }

    /// Resume a paused task and execute it to its next outcome.
    pub async fn resume_task(&self, task_id: &str) -> Result<WorkerOutcome> {
        let task = self.store.require(task_id).await?;
        if task.status != TaskStatus::Paused {
            return Err(QdmError::IllegalState(format!(
                "task {} must be paused to resume, is {}",
                task_id,
                task.status.as_str()
            ))
            .into());
        }
        self.pause.set(task_id, false);
        self.execute_task(task_id).await
    }

    /// Execute one task (PENDING or PAUSED) to its next outcome.
    pub async fn execute_task(&self, task_id: &str) -> Result<WorkerOutcome> {
        let task = self.store.require(task_id).await?;
        if !matches!(task.status, TaskStatus::Pending | TaskStatus::Paused) {
            return Err(QdmError::IllegalState(format!(
                "task {} must be pending or paused to start, is {}",
                task_id,
                task.status.as_str()
            ))
            .into());
        }
        if !self.claim(task_id) {
            return Err(QdmError::IllegalState(format!(
                "task {} is already being executed",
                task_id
            ))
            .into());
        }
        let result = self.execute_claimed(task_id).await;
        self.release(task_id);
        result
    }

    /// Body of `execute_task` once the active-set slot is held.
    async fn execute_claimed(&self, task_id: &str) -> Result<WorkerOutcome> {
        self.pause.set(task_id, false);
        self.store
            .set_status(task_id, TaskStatus::Downloading)
            .await?;

        let token = self.pause.token(task_id);
        let outcome = self.worker.run(task_id, token).await;

        match &outcome {
            WorkerOutcome::Completed => {
                // A pause can land right as the worker finishes; the reread
                // decides, and a paused task stays paused.
                let task = self.store.require(task_id).await?;
                if task.status != TaskStatus::Paused {
                    self.finish(task, TaskStatus::Completed).await?;
                }
            }
            WorkerOutcome::Paused => {
                // pause_task already wrote PAUSED; nothing to transition.
            }
            WorkerOutcome::Failed(e) => {
                tracing::warn!(task = %task_id, "task failed: {:#}", e);
                let task = self.store.require(task_id).await?;
                self.finish(task, TaskStatus::Failed).await?;
            }
        }
        self.pause.remove(task_id);
        Ok(outcome)
    }

    /// Write a terminal status and notify listeners in registration order.
    async fn finish(&self, mut task: Task, status: TaskStatus) -> QdmResult<()> {
        self.store.set_status(&task.id, status).await?;
        task.status = status;
        self.events.notify_task_finished(&task).await;
        Ok(())
    }

    /// Signal the scheduling loop to exit. Active workers are not aborted;
    /// their pause tokens stay untouched.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Scheduling loop: scan the queue, top workers up to `max_parallel`,
    /// sleep, repeat. Runs until `stop` is signalled.
    pub async fn run(&self) {
        self.run_inner(false).await;
    }

    /// Like `run`, but exits once no task is PENDING or DOWNLOADING and no
    /// worker is active. Stranded DOWNLOADING rows from a dead process are
    /// recovered to PENDING first.
    pub async fn run_until_drained(&self) -> Result<()> {
        let recovered = self.store.recover_downloading_tasks().await?;
        if recovered > 0 {
            tracing::info!("recovered {} task(s) from a previous run", recovered);
        }
        self.run_inner(true).await;
        Ok(())
    }

    async fn run_inner(&self, drain: bool) {
        self.stop.store(false, Ordering::Relaxed);
        loop {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            match self.scan_once().await {
                Ok(idle) => {
                    if drain && idle {
                        break;
                    }
                    tokio::time::sleep(SCAN_INTERVAL).await;
                }
                Err(e) => {
                    tracing::error!("engine scan failed: {:#}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// One scheduler pass. Returns true when the queue is fully idle (no
    /// pending or downloading work and no active workers).
    async fn scan_once(&self) -> Result<bool> {
        let tasks = self.store.list_by_queue_order().await?;

        let active_count = self.active.lock().unwrap().len();
        let mut capacity = self.cfg.max_parallel.max(1).saturating_sub(active_count);

        for task in tasks.iter().filter(|t| t.status == TaskStatus::Pending) {
            if capacity == 0 {
                break;
            }
            if !self.claim(&task.id) {
                continue;
            }
            capacity -= 1;
            let engine = self.clone();
            let id = task.id.clone();
            tokio::spawn(async move {
                let result = engine.execute_claimed(&id).await;
                engine.release(&id);
                if let Err(e) = result {
                    tracing::error!(task = %id, "execution error: {:#}", e);
                }
            });
        }

        let busy = tasks
            .iter()
            .any(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Downloading));
        let idle = !busy && self.active.lock().unwrap().is_empty();
        Ok(idle)
    }

    fn claim(&self, task_id: &str) -> bool {
        self.active.lock().unwrap().insert(task_id.to_string())
    }

    fn release(&self, task_id: &str) {
        self.active.lock().unwrap().remove(task_id);
    }

    /// Ids of tasks currently held by a worker.
    pub fn active_ids(&self) -> Vec<String> {
        self.active.lock().unwrap().iter().cloned().collect()
    }
}
