//! Queue-position operations: ordered listing, swap, and normalization.

use sqlx::Row;

use crate::error::{QdmError, QdmResult};

use super::db::{task_from_row, TaskStore};
use super::types::Task;

impl TaskStore {
    /// Point lookup by queue position.
    pub async fn get_by_queue_order(&self, queue_order: i64) -> QdmResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE queue_order = ?1")
            .bind(queue_order)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| task_from_row(&r)))
    }

    /// All active tasks ordered ascending by queue position.
    pub async fn list_by_queue_order(&self) -> QdmResult<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY queue_order, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(task_from_row).collect())
    }

    /// Swap the queue positions of two tasks in a single transaction.
    pub async fn swap_queue_orders(&self, a: i64, b: i64) -> QdmResult<()> {
        let mut tx = self.pool.begin().await?;

        let id_at = |order: i64| {
            sqlx::query("SELECT id FROM tasks WHERE queue_order = ?1").bind(order)
        };
        let row_a = id_at(a).fetch_optional(&mut *tx).await?;
        let row_b = id_at(b).fetch_optional(&mut *tx).await?;
        let (Some(row_a), Some(row_b)) = (row_a, row_b) else {
            return Err(QdmError::NotFound(format!(
                "queue position {} or {}",
                a, b
            )));
        };
        let id_a: String = row_a.get("id");
        let id_b: String = row_b.get("id");

        sqlx::query("UPDATE tasks SET queue_order = ?1 WHERE id = ?2")
            .bind(b)
            .bind(&id_a)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE tasks SET queue_order = ?1 WHERE id = ?2")
            .bind(a)
            .bind(&id_b)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Reassign dense positions 1..K preserving the current relative order.
    /// Tasks with position 0 or NULL sort last, in id order.
    pub async fn normalize_queue_order(&self) -> QdmResult<()> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT id FROM tasks
            ORDER BY
                CASE WHEN queue_order IS NULL OR queue_order <= 0 THEN 1 ELSE 0 END,
                queue_order,
                id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        for (i, row) in rows.iter().enumerate() {
            let id: String = row.get("id");
            sqlx::query("UPDATE tasks SET queue_order = ?1 WHERE id = ?2")
                .bind((i + 1) as i64)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
