//! `qdm add <url>` – enqueue a new download task.

use anyhow::Result;
use qdm_core::store::{Task, TaskStore};

pub async fn run_add(store: &TaskStore, url: &str) -> Result<()> {
    let task = store.add(&Task::create(url)).await?;
    println!("Added task #{} for URL: {}", task.queue_order, task.url);
    Ok(())
}
