//! Per-task download execution.
//!
//! A worker never touches task status; it reports how the attempt ended
//! through `WorkerOutcome` and the engine drives the status transition from
//! that discriminator.

mod hls;
mod http;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::QdmError;
use crate::http::HttpClient;
use crate::progress::{ProgressAggregator, ProgressState};
use crate::store::{TaskStatus, TaskStore};

/// How one download attempt ended.
#[derive(Debug)]
pub enum WorkerOutcome {
    /// The transfer ran to the end and the file was finalized.
    Completed,
    /// The pause token tripped; progress is persisted, status untouched.
    Paused,
    /// The attempt failed; the engine marks the task FAILED.
    Failed(anyhow::Error),
}

/// Executes one task at a time: probe, choose the HTTP or HLS path, stream
/// through the sink, and persist progress.
#[derive(Clone)]
pub struct DownloadWorker {
    store: TaskStore,
    http: Arc<HttpClient>,
    download_dir: PathBuf,
    aggregator: Arc<ProgressAggregator>,
}

impl DownloadWorker {
    pub fn new(
        store: TaskStore,
        http: Arc<HttpClient>,
        download_dir: PathBuf,
        aggregator: Arc<ProgressAggregator>,
    ) -> Self {
        Self {
            store,
            http,
            download_dir,
            aggregator,
        }
    }

    /// Run the task to completion, pause, or failure. The task must already
    /// be in DOWNLOADING (the engine owns that transition).
    pub async fn run(&self, task_id: &str, pause: Arc<AtomicBool>) -> WorkerOutcome {
        let task = match self.store.require(task_id).await {
            Ok(t) => t,
            Err(e) => return WorkerOutcome::Failed(e.into()),
        };
        if task.status != TaskStatus::Downloading {
            return WorkerOutcome::Failed(
                QdmError::IllegalState(format!(
                    "task {} must be downloading to execute, is {}",
                    task_id,
                    task.status.as_str()
                ))
                .into(),
            );
        }

        let state = Arc::new(ProgressState::new(task.queue_order, task.total));
        self.aggregator.add_task(&task.id, Arc::clone(&state));

        let result = if is_hls_url(&task.url) {
            hls::run(self, &task, pause, &state).await
        } else {
            http::run(self, task.clone(), pause, &state).await
        };

        self.aggregator.remove_task(&task.id);

        match result {
            Ok(outcome) => outcome,
            Err(e) => WorkerOutcome::Failed(e),
        }
    }

    pub(crate) fn store(&self) -> &TaskStore {
        &self.store
    }

    pub(crate) fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    pub(crate) fn download_dir(&self) -> &PathBuf {
        &self.download_dir
    }
}

/// HLS is dispatched on the URL path suffix.
fn is_hls_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".m3u8"))
        .unwrap_or_else(|_| raw.to_ascii_lowercase().ends_with(".m3u8"))
}
