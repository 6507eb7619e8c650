//! `qdm remove <queue_id>` – drop a task from the queue.

use anyhow::Result;
use qdm_core::store::{queue_id_to_task_id, TaskStore};

pub async fn run_remove(store: &TaskStore, queue_id: i64) -> Result<()> {
    let task_id = queue_id_to_task_id(store, queue_id).await?;
    store.delete(&task_id).await?;
    store.normalize_queue_order().await?;
    println!("Removed task #{}", queue_id);
    Ok(())
}
