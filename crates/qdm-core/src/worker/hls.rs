//! HLS branch: variant download with per-segment progress persistence.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::hls::HlsDownloader;
use crate::naming;
use crate::progress::{ProgressPhase, ProgressState};
use crate::store::{Task, TaskStore};

use super::{DownloadWorker, WorkerOutcome};

pub(super) async fn run(
    worker: &DownloadWorker,
    task: &Task,
    pause: Arc<AtomicBool>,
    state: &Arc<ProgressState>,
) -> Result<WorkerOutcome> {
    let store = worker.store();

    // Segment sets are not resumable across attempts: every run starts from
    // the first segment.
    if task.downloaded > 0 {
        store.update_progress(&task.id, 0, None).await?;
    }

    let name = output_name(&task.url, &task.id);
    let output_path = worker.download_dir().join(&name);

    // Persist segment progress off the download path, like a progress
    // writer: the callback stays synchronous and cheap.
    let (tx, mut rx) = mpsc::channel::<u64>(8);
    let persist = {
        let store: TaskStore = store.clone();
        let task_id = task.id.clone();
        tokio::spawn(async move {
            while let Some(downloaded) = rx.recv().await {
                if store.update_progress(&task_id, downloaded, None).await.is_err() {
                    tracing::warn!(task = %task_id, "segment progress update failed");
                }
            }
        })
    };

    let downloader = HlsDownloader::new(Arc::clone(worker.http()));
    let result = downloader
        .download_variant(&task.url, &output_path, pause, |downloaded, total| {
            state.update(downloaded, total);
            let _ = tx.try_send(downloaded);
        })
        .await;

    drop(tx);
    let _ = persist.await;

    match result {
        Ok(true) => {
            state.set_phase(ProgressPhase::Finalizing);
            let final_downloaded = state.snapshot().downloaded;
            store
                .update_progress(&task.id, final_downloaded, Some(final_downloaded))
                .await?;
            tracing::info!(task = %task.id, path = %output_path.display(), "HLS download completed");
            Ok(WorkerOutcome::Completed)
        }
        Ok(false) => {
            state.set_phase(ProgressPhase::Paused);
            Ok(WorkerOutcome::Paused)
        }
        Err(e) => Err(e),
    }
}

/// Merged output name: the playlist name with an `.mp4` extension, or a
/// task-tagged default when the URL has no usable name.
fn output_name(url: &str, task_id: &str) -> String {
    let base = naming::filename_from_url_path(url)
        .unwrap_or_else(|| format!("hls_{}", naming::task_tag(task_id)));
    let stem = base.strip_suffix(".m3u8").unwrap_or(&base);
    format!("{}.mp4", stem)
}
