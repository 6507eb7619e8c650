//! `qdm queue move|swap` – reorder the active queue.

use anyhow::Result;
use clap::ValueEnum;
use qdm_core::store::TaskStore;

use crate::cli::QueueAction;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MoveDirection {
    Up,
    Down,
}

pub async fn run_queue(store: &TaskStore, action: QueueAction) -> Result<()> {
    match action {
        QueueAction::Move { queue_id, direction } => {
            let neighbor = match direction {
                MoveDirection::Up => queue_id - 1,
                MoveDirection::Down => queue_id + 1,
            };
            let count = store.list_by_queue_order().await?.len() as i64;
            if neighbor < 1 || neighbor > count {
                anyhow::bail!("cannot move task #{} {:?}", queue_id, direction);
            }
            store.swap_queue_orders(queue_id, neighbor).await?;
            store.normalize_queue_order().await?;
            println!("Moved task #{} to position {}", queue_id, neighbor);
        }
        QueueAction::Swap { a, b } => {
            store.swap_queue_orders(a, b).await?;
            store.normalize_queue_order().await?;
            println!("Swapped queue positions {} and {}", a, b);
        }
    }
    Ok(())
}
