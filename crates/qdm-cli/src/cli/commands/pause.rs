//! `qdm pause` – pause one downloading task or all of them.

use anyhow::Result;
use qdm_core::config::QdmConfig;
use qdm_core::engine::Engine;
use qdm_core::store::{queue_id_to_task_id, TaskStatus, TaskStore};

pub async fn run_pause(
    store: &TaskStore,
    cfg: &QdmConfig,
    queue_id: Option<i64>,
    all: bool,
) -> Result<()> {
    let engine = Engine::new(store.clone(), cfg.clone());

    if all {
        let downloading = store.list(Some(TaskStatus::Downloading)).await?;
        if downloading.is_empty() {
            println!("Nothing is downloading.");
            return Ok(());
        }
        for task in downloading {
            engine.pause_task(&task.id).await?;
            println!("Paused task #{}", task.queue_order);
        }
        return Ok(());
    }

    let Some(queue_id) = queue_id else {
        anyhow::bail!("pass a queue position or --all");
    };
    let task_id = queue_id_to_task_id(store, queue_id).await?;
    engine.pause_task(&task_id).await?;
    println!("Paused task #{}", queue_id);
    Ok(())
}
