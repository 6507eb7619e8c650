//! SQLite-backed task store: open, migrate, and row-level operations.

use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

use crate::error::{QdmError, QdmResult};

use super::types::{Task, TaskId, TaskStatus};

/// Handle to the SQLite-backed task database.
///
/// The default database file lives under the XDG state directory:
/// `~/.local/state/qdm/tasks.db`.
#[derive(Clone)]
pub struct TaskStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl TaskStore {
    /// Open (or create) the default task database and run migrations.
    pub async fn open_default() -> anyhow::Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("qdm")?;
        let state_dir = xdg_dirs.get_state_home();
        tokio::fs::create_dir_all(&state_dir).await?;
        Ok(Self::open_at(&state_dir.join("tasks.db")).await?)
    }

    /// Open (or create) a task database at an explicit path.
    pub async fn open_at(path: &Path) -> QdmResult<Self> {
        let uri = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let store = TaskStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store for tests. A single connection so the pool cannot
    /// hand back a different empty database.
    pub async fn open_memory() -> QdmResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = TaskStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> QdmResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                status TEXT NOT NULL,
                downloaded INTEGER NOT NULL DEFAULT 0,
                total INTEGER,
                resumable INTEGER NOT NULL DEFAULT 1,
                capability_checked INTEGER NOT NULL DEFAULT 0,
                queue_order INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS archive (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                status TEXT NOT NULL,
                downloaded INTEGER NOT NULL DEFAULT 0,
                total INTEGER,
                resumable INTEGER NOT NULL DEFAULT 1,
                capability_checked INTEGER NOT NULL DEFAULT 0,
                queue_order INTEGER NOT NULL DEFAULT 0,
                archived_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Secondary index for queue-position lookups and ordered listing.
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_queue_order ON tasks(queue_order);")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a new task. When `queue_order` is 0 the next position
    /// (max + 1) is assigned inside the same transaction.
    pub async fn add(&self, task: &Task) -> QdmResult<Task> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM tasks WHERE id = ?1")
            .bind(&task.id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_some() {
            return Err(QdmError::InvalidInput(format!(
                "task id already present: {}",
                task.id
            )));
        }

        let queue_order = if task.queue_order == 0 {
            let row = sqlx::query("SELECT COALESCE(MAX(queue_order), 0) AS max_order FROM tasks")
                .fetch_one(&mut *tx)
                .await?;
            row.get::<i64, _>("max_order") + 1
        } else {
            task.queue_order
        };

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, url, status, downloaded, total,
                resumable, capability_checked, queue_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&task.id)
        .bind(&task.url)
        .bind(task.status.as_str())
        .bind(task.downloaded as i64)
        .bind(task.total.map(|t| t as i64))
        .bind(task.resumable as i64)
        .bind(task.capability_checked as i64)
        .bind(queue_order)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut stored = task.clone();
        stored.queue_order = queue_order;
        Ok(stored)
    }

    /// Whole-row update by id.
    pub async fn update(&self, task: &Task) -> QdmResult<()> {
        let r = sqlx::query(
            r#"
            UPDATE tasks
            SET url = ?1, status = ?2, downloaded = ?3, total = ?4,
                resumable = ?5, capability_checked = ?6, queue_order = ?7
            WHERE id = ?8
            "#,
        )
        .bind(&task.url)
        .bind(task.status.as_str())
        .bind(task.downloaded as i64)
        .bind(task.total.map(|t| t as i64))
        .bind(task.resumable as i64)
        .bind(task.capability_checked as i64)
        .bind(task.queue_order)
        .bind(&task.id)
        .execute(&self.pool)
        .await?;

        if r.rows_affected() == 0 {
            return Err(QdmError::NotFound(format!("task {}", task.id)));
        }
        Ok(())
    }

    /// Point lookup by id.
    pub async fn get(&self, id: &str) -> QdmResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| task_from_row(&r)))
    }

    /// Enumerate tasks, optionally filtered by status. No order guarantee;
    /// use `list_by_queue_order` for the queue view.
    pub async fn list(&self, status: Option<TaskStatus>) -> QdmResult<Vec<Task>> {
        let rows = match status {
            Some(s) => {
                sqlx::query("SELECT * FROM tasks WHERE status = ?1")
                    .bind(s.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM tasks")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.iter().map(task_from_row).collect())
    }

    /// Remove a task row. The caller is responsible for normalizing queue
    /// order afterwards.
    pub async fn delete(&self, id: &str) -> QdmResult<()> {
        let r = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if r.rows_affected() == 0 {
            return Err(QdmError::NotFound(format!("task {}", id)));
        }
        Ok(())
    }

    /// Engine-only status transition. Workers never touch status.
    pub async fn set_status(&self, id: &str, status: TaskStatus) -> QdmResult<()> {
        let r = sqlx::query("UPDATE tasks SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if r.rows_affected() == 0 {
            return Err(QdmError::NotFound(format!("task {}", id)));
        }
        Ok(())
    }

    /// Worker-side progress write: `downloaded` (clamped to `total` when
    /// total is known) and optionally a newly discovered `total`.
    pub async fn update_progress(
        &self,
        id: &str,
        downloaded: u64,
        total: Option<u64>,
    ) -> QdmResult<()> {
        let r = sqlx::query(
            r#"
            UPDATE tasks
            SET total = COALESCE(?1, total),
                downloaded = CASE
                    WHEN COALESCE(?1, total) IS NOT NULL AND ?2 > COALESCE(?1, total)
                        THEN COALESCE(?1, total)
                    ELSE ?2
                END
            WHERE id = ?3
            "#,
        )
        .bind(total.map(|t| t as i64))
        .bind(downloaded as i64)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if r.rows_affected() == 0 {
            return Err(QdmError::NotFound(format!("task {}", id)));
        }
        Ok(())
    }

    /// Worker-side capability write after the first successful probe.
    pub async fn update_capability(
        &self,
        id: &str,
        resumable: bool,
        total: Option<u64>,
    ) -> QdmResult<()> {
        let r = sqlx::query(
            r#"
            UPDATE tasks
            SET resumable = ?1,
                capability_checked = 1,
                total = COALESCE(?2, total)
            WHERE id = ?3
            "#,
        )
        .bind(resumable as i64)
        .bind(total.map(|t| t as i64))
        .bind(id)
        .execute(&self.pool)
        .await?;
        if r.rows_affected() == 0 {
            return Err(QdmError::NotFound(format!("task {}", id)));
        }
        Ok(())
    }

    /// Reset any task stranded in DOWNLOADING (e.g. after a crash) back to
    /// PENDING so the scheduler picks it up again. Returns the count reset.
    pub async fn recover_downloading_tasks(&self) -> QdmResult<u64> {
        let r = sqlx::query("UPDATE tasks SET status = 'pending' WHERE status = 'downloading'")
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Look up a task by id, erroring with NotFound when absent.
    pub async fn require(&self, id: &str) -> QdmResult<Task> {
        self.get(id)
            .await?
            .ok_or_else(|| QdmError::NotFound(format!("task {}", id)))
    }
}

pub(super) fn task_from_row(row: &SqliteRow) -> Task {
    let status: String = row.get("status");
    let downloaded: i64 = row.get("downloaded");
    let total: Option<i64> = row.get("total");
    let resumable: i64 = row.get("resumable");
    let capability_checked: i64 = row.get("capability_checked");
    Task {
        id: row.get::<String, _>("id"),
        url: row.get("url"),
        status: TaskStatus::from_str(&status),
        downloaded: downloaded.max(0) as u64,
        total: total.map(|t| t.max(0) as u64),
        resumable: resumable != 0,
        capability_checked: capability_checked != 0,
        queue_order: row.get("queue_order"),
    }
}

/// Resolve a user-facing queue position to a task id.
pub async fn queue_id_to_task_id(store: &TaskStore, queue_order: i64) -> QdmResult<TaskId> {
    store
        .get_by_queue_order(queue_order)
        .await?
        .map(|t| t.id)
        .ok_or_else(|| QdmError::NotFound(format!("queue position {}", queue_order)))
}
