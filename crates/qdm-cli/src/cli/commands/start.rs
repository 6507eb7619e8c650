//! `qdm start` – run the engine over the queue (or one task).

use std::sync::atomic::Ordering;

use anyhow::Result;
use qdm_core::config::QdmConfig;
use qdm_core::engine::Engine;
use qdm_core::store::{queue_id_to_task_id, TaskStore};
use qdm_core::worker::WorkerOutcome;

pub async fn run_start(
    store: &TaskStore,
    cfg: &QdmConfig,
    queue_id: Option<i64>,
    all: bool,
    jobs: Option<usize>,
) -> Result<()> {
    if all && queue_id.is_some() {
        anyhow::bail!("pass either a queue position or --all, not both");
    }
    if !all && queue_id.is_none() {
        anyhow::bail!("pass a queue position or --all");
    }

    let mut cfg = cfg.clone();
    if let Some(jobs) = jobs {
        cfg.max_parallel = jobs.max(1);
    }
    let engine = Engine::new(store.clone(), cfg);

    let renderer = engine.renderer();
    let stop_paint = renderer.stop_handle();
    let painter = tokio::spawn(renderer.run());

    let result = match queue_id {
        Some(queue_id) => {
            let task_id = queue_id_to_task_id(store, queue_id).await?;
            match engine.execute_task(&task_id).await {
                Ok(outcome) => {
                    report_outcome(queue_id, &outcome);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        None => engine.run_until_drained().await,
    };

    stop_paint.store(true, Ordering::Relaxed);
    let _ = painter.await;
    result?;

    if all && store.list_by_queue_order().await?.is_empty() {
        println!("Queue drained.");
    }
    Ok(())
}

fn report_outcome(queue_id: i64, outcome: &WorkerOutcome) {
    match outcome {
        WorkerOutcome::Completed => println!("Task #{} completed.", queue_id),
        WorkerOutcome::Paused => println!("Task #{} paused.", queue_id),
        WorkerOutcome::Failed(e) => println!("Task #{} failed: {:#}", queue_id, e),
    }
}
