//! `qdm list` – show the active queue or the archive.

use anyhow::Result;
use qdm_core::store::TaskStore;

pub async fn run_list(store: &TaskStore, archive: bool) -> Result<()> {
    if archive {
        return super::archive::print_archive(store).await;
    }

    let tasks = store.list_by_queue_order().await?;
    if tasks.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!("{:<6} {:<12} {:<20} {}", "POS", "STATUS", "PROGRESS", "URL");
    for t in tasks {
        let progress = match t.total {
            Some(total) => format!("{}/{}", t.downloaded, total),
            None => format!("{}/?", t.downloaded),
        };
        println!(
            "{:<6} {:<12} {:<20} {}",
            t.queue_order,
            t.status.as_str(),
            progress,
            t.url
        );
    }
    Ok(())
}
