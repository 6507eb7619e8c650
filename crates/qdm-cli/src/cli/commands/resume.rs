//! `qdm resume <queue_id>` – resume a paused task and run it.

use std::sync::atomic::Ordering;

use anyhow::Result;
use qdm_core::config::QdmConfig;
use qdm_core::engine::Engine;
use qdm_core::store::{queue_id_to_task_id, TaskStore};
use qdm_core::worker::WorkerOutcome;

pub async fn run_resume(store: &TaskStore, cfg: &QdmConfig, queue_id: i64) -> Result<()> {
    let task_id = queue_id_to_task_id(store, queue_id).await?;
    let engine = Engine::new(store.clone(), cfg.clone());

    let renderer = engine.renderer();
    let stop_paint = renderer.stop_handle();
    let painter = tokio::spawn(renderer.run());

    let result = engine.resume_task(&task_id).await;

    stop_paint.store(true, Ordering::Relaxed);
    let _ = painter.await;

    match result? {
        WorkerOutcome::Completed => println!("Task #{} completed.", queue_id),
        WorkerOutcome::Paused => println!("Task #{} paused again.", queue_id),
        WorkerOutcome::Failed(e) => println!("Task #{} failed: {:#}", queue_id, e),
    }
    Ok(())
}
