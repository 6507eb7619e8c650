//! HTTP branch: probe, resume negotiation, chunk loop, finalize.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::error::QdmError;
use crate::http::{StreamEnd, StreamEvent};
use crate::naming;
use crate::progress::{ProgressPhase, ProgressState};
use crate::storage::{self, FileSink};
use crate::store::Task;

use super::{DownloadWorker, WorkerOutcome};

/// Persist `downloaded` at least this often (bytes between writes).
const PERSIST_INTERVAL: u64 = 64 * 1024;

pub(super) async fn run(
    worker: &DownloadWorker,
    mut task: Task,
    pause: Arc<AtomicBool>,
    state: &Arc<ProgressState>,
) -> Result<WorkerOutcome> {
    let store = worker.store();

    // First run: probe capabilities and persist them. A probe failure is a
    // transport failure for the whole attempt.
    if !task.capability_checked {
        let http = Arc::clone(worker.http());
        let url = task.url.clone();
        let probe = tokio::task::spawn_blocking(move || http.probe(&url))
            .await
            .context("probe task join")??;
        task.resumable = probe.resumable;
        task.capability_checked = true;
        if task.total.is_none() {
            task.total = probe.length;
        }
        store
            .update_capability(&task.id, probe.resumable, probe.length)
            .await?;
    }

    // The local name must be stable across attempts, so it derives from the
    // URL alone.
    let name = naming::derive_filename(&task.url, None);
    let base = worker.download_dir().clone();

    // Resume decision: resume only when the server still honors ranges, the
    // task is resumable, and a staging file exists. The staging file is the
    // authority on the start offset; the persisted counter follows it.
    let mut start_byte: u64 = 0;
    let mut resume = false;
    if task.downloaded > 0 {
        let http = Arc::clone(worker.http());
        let url = task.url.clone();
        let range_supported = tokio::task::spawn_blocking(move || http.check_range(&url))
            .await
            .context("range check join")?;

        if range_supported && task.resumable {
            match storage::staging_size(&base, &name, &task.id) {
                Some(size) if size > 0 => {
                    start_byte = size;
                    resume = true;
                    if size != task.downloaded {
                        tracing::debug!(
                            task = %task.id,
                            persisted = task.downloaded,
                            on_disk = size,
                            "staging size differs from persisted progress; trusting the file"
                        );
                        store.update_progress(&task.id, size, None).await?;
                        task.downloaded = size;
                    }
                }
                _ => {
                    store.update_progress(&task.id, 0, None).await?;
                    task.downloaded = 0;
                }
            }
        } else {
            // A previous partial transfer cannot be continued: drop it.
            if let Some(path) = existing_staging(&base, &name, &task.id) {
                let _ = std::fs::remove_file(path);
            }
            store.update_progress(&task.id, 0, None).await?;
            task.downloaded = 0;
        }
    }

    // Resuming a finished transfer: nothing to stream, just finalize.
    if resume && task.total == Some(start_byte) {
        let sink = FileSink::open(&base, &name, &task.id, true)?;
        state.update(start_byte, task.total);
        state.set_phase(ProgressPhase::Finalizing);
        sink.finalize()?;
        store.update_progress(&task.id, start_byte, task.total).await?;
        return Ok(WorkerOutcome::Completed);
    }

    let mut sink = FileSink::open(&base, &name, &task.id, resume)?;
    state.update(start_byte, task.total);

    let _lease = worker.http().lease(&task.url).await;
    let mut stream = worker.http().download(&task.url, start_byte, Arc::clone(&pause));

    let mut downloaded = start_byte;
    let mut total = task.total;
    let mut last_persist = downloaded;

    let end = loop {
        match stream.next().await {
            Some(StreamEvent::Meta { total: hint }) => {
                if total.is_none() && hint.is_some() {
                    total = hint;
                    store.update_progress(&task.id, downloaded, total).await?;
                }
            }
            Some(StreamEvent::Data(chunk)) => {
                sink.write(&chunk)?;
                downloaded += chunk.len() as u64;
                state.update(downloaded, total);
                if downloaded - last_persist >= PERSIST_INTERVAL {
                    store.update_progress(&task.id, downloaded, total).await?;
                    last_persist = downloaded;
                }
            }
            Some(StreamEvent::Ended(end)) => break end,
            None => break StreamEnd::Failed("stream closed without an end event".to_string()),
        }
    };

    match end {
        StreamEnd::Complete => {
            // The pause could land between the last chunk and finalize;
            // honor it rather than completing under the caller's feet.
            if pause.load(Ordering::Relaxed) {
                return pause_exit(worker, &task, sink, downloaded, total, state).await;
            }
            if let Some(t) = total {
                if downloaded != t {
                    store.update_progress(&task.id, downloaded, total).await?;
                    sink.close();
                    return Err(QdmError::Transport(format!(
                        "partial transfer: got {} of {} bytes",
                        downloaded, t
                    ))
                    .into());
                }
            }
            state.set_phase(ProgressPhase::Finalizing);
            let final_path = sink.finalize()?;
            store.update_progress(&task.id, downloaded, total).await?;
            tracing::info!(task = %task.id, path = %final_path.display(), "download completed");
            Ok(WorkerOutcome::Completed)
        }
        StreamEnd::Paused => pause_exit(worker, &task, sink, downloaded, total, state).await,
        StreamEnd::Failed(msg) => {
            // Keep the staging file; a restart may be able to resume it.
            store.update_progress(&task.id, downloaded, total).await?;
            sink.close();
            Err(QdmError::Transport(msg).into())
        }
    }
}

/// Clean stop on pause: close the sink without finalizing and persist the
/// counter. Non-resumable transfers cannot continue mid-file, so their
/// staging is dropped and the counter reset to zero.
async fn pause_exit(
    worker: &DownloadWorker,
    task: &Task,
    sink: FileSink,
    downloaded: u64,
    total: Option<u64>,
    state: &Arc<ProgressState>,
) -> Result<WorkerOutcome> {
    state.set_phase(ProgressPhase::Paused);
    if task.resumable {
        sink.close();
        worker
            .store()
            .update_progress(&task.id, downloaded, total)
            .await?;
        tracing::info!(task = %task.id, downloaded, "paused; staging kept for resume");
    } else {
        sink.discard()?;
        worker.store().update_progress(&task.id, 0, total).await?;
        tracing::info!(task = %task.id, "paused; non-resumable staging dropped");
    }
    Ok(WorkerOutcome::Paused)
}

fn existing_staging(
    base: &std::path::Path,
    name: &str,
    task_id: &str,
) -> Option<std::path::PathBuf> {
    let path = storage::staging_path(base, name, task_id);
    path.exists().then_some(path)
}
