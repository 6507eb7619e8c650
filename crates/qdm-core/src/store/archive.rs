//! Archive operations: move terminal tasks out of the queue, list history,
//! and clone archived entries back as fresh tasks.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{QdmError, QdmResult};

use super::db::{task_from_row, TaskStore};
use super::types::{ArchivedTask, Task};

impl TaskStore {
    /// Copy a task row into the archive with the current timestamp, then
    /// delete it from the active queue, in one transaction.
    pub async fn archive_task(&self, id: &str) -> QdmResult<ArchivedTask> {
        let archived_at = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(QdmError::NotFound(format!("task {}", id)));
        };
        let task = task_from_row(&row);

        sqlx::query(
            r#"
            INSERT INTO archive (
                id, url, status, downloaded, total,
                resumable, capability_checked, queue_order, archived_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&task.id)
        .bind(&task.url)
        .bind(task.status.as_str())
        .bind(task.downloaded as i64)
        .bind(task.total.map(|t| t as i64))
        .bind(task.resumable as i64)
        .bind(task.capability_checked as i64)
        .bind(task.queue_order)
        .bind(&archived_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ArchivedTask { task, archived_at })
    }

    /// Archived tasks, newest first.
    pub async fn list_archive(&self) -> QdmResult<Vec<ArchivedTask>> {
        let rows = sqlx::query("SELECT * FROM archive ORDER BY archived_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(archived_from_row).collect())
    }

    /// Point lookup in the archive.
    pub async fn get_from_archive(&self, id: &str) -> QdmResult<Option<ArchivedTask>> {
        let row = sqlx::query("SELECT * FROM archive WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| archived_from_row(&r)))
    }

    /// Create a new PENDING task from an archived one: fresh id, zero
    /// progress, capability re-checked on next run. The archive row stays.
    pub async fn clone_from_archive(&self, id: &str) -> QdmResult<Task> {
        let archived = self
            .get_from_archive(id)
            .await?
            .ok_or_else(|| QdmError::NotFound(format!("archived task {}", id)))?;
        let task = Task::create(&archived.task.url);
        self.add(&task).await
    }
}

fn archived_from_row(row: &SqliteRow) -> ArchivedTask {
    ArchivedTask {
        task: task_from_row(row),
        archived_at: row.get("archived_at"),
    }
}
