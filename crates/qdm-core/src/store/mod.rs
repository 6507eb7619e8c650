//! Persistent task queue + archive (SQLite via sqlx).
//!
//! Two tables: `tasks` holds the active ordered queue, `archive` holds a
//! frozen copy of every task that reached a terminal status. All writes are
//! transactional; queue order is kept a dense 1..K permutation by
//! `normalize_queue_order`.

mod archive;
mod db;
mod queue;
mod types;


pub use db::{queue_id_to_task_id, TaskStore};
pub use types::*;
