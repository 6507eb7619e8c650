//! `qdm archive list|clone` – history of finished tasks.

use anyhow::Result;
use qdm_core::store::TaskStore;

use crate::cli::ArchiveAction;

pub async fn run_archive(store: &TaskStore, action: ArchiveAction) -> Result<()> {
    match action {
        ArchiveAction::List => print_archive(store).await?,
        ArchiveAction::Clone { id } => {
            let task = store.clone_from_archive(&id).await?;
            println!(
                "Re-queued {} as task #{} ({})",
                id, task.queue_order, task.url
            );
        }
    }
    Ok(())
}

pub(super) async fn print_archive(store: &TaskStore) -> Result<()> {
    let archived = store.list_archive().await?;
    if archived.is_empty() {
        println!("Archive is empty.");
        return Ok(());
    }
    println!(
        "{:<38} {:<11} {:<26} {}",
        "ID", "STATUS", "ARCHIVED AT", "URL"
    );
    for entry in archived {
        println!(
            "{:<38} {:<11} {:<26} {}",
            entry.task.id,
            entry.task.status.as_str(),
            entry.archived_at,
            entry.task.url
        );
    }
    Ok(())
}
