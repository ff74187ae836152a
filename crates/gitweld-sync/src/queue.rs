//! Postgres-backed task queue with dedupe and delayed retry.

use crate::error::{SyncError, SyncResult};
use crate::task::{task_fingerprint, NewTask, SyncTask};
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Queue of pending sync tasks.
///
/// A partial unique index over the open states (`pending`, `retrying`)
/// enforces dedupe: enqueueing a key that already has an open task replaces
/// that task's payload instead of inserting a second row. Finished rows are
/// kept as processing history and never block new work.
const CLAIM_SQL: &str = r#"
    UPDATE sync_tasks
    SET state = 'active', updated_at = now()
    WHERE id IN (
        SELECT id FROM sync_tasks
        WHERE state IN ('pending', 'retrying')
          AND run_after <= now()
          AND key_fingerprint NOT IN (
              SELECT key_fingerprint FROM sync_tasks WHERE state = 'active'
          )
        ORDER BY run_after, created_at
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    )
    RETURNING *
    "#;

#[derive(Debug, Clone)]
pub struct SyncQueue {
    pool: PgPool,
}

impl SyncQueue {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a submission, collapsing onto an open task with the same key.
    ///
    /// On replacement the newest desired role and log id win, the attempt
    /// count resets, and the task becomes runnable immediately.
    pub async fn enqueue(&self, task: &NewTask) -> SyncResult<Uuid> {
        let key = task.key();
        let fingerprint = task_fingerprint(&key);

        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO sync_tasks
                (id, kind, scope_kind, entity_id, subject_user_id, desired_role,
                 sync_log_id, task_key, key_fingerprint, state, run_after)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', now())
            ON CONFLICT (key_fingerprint) WHERE state IN ('pending', 'retrying')
            DO UPDATE SET
                desired_role = EXCLUDED.desired_role,
                sync_log_id = EXCLUDED.sync_log_id,
                state = 'pending',
                attempt_count = 0,
                last_error = NULL,
                run_after = now(),
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(task.kind)
        .bind(task.scope.kind_str())
        .bind(task.scope.entity_uuid())
        .bind(task.subject_user_id.map(gitweld_core::UserId::into_uuid))
        .bind(&task.desired_role)
        .bind(task.sync_log_id.into_uuid())
        .bind(&key)
        .bind(&fingerprint)
        .fetch_one(&self.pool)
        .await?;

        debug!(task_id = %id, key, "enqueued sync task");
        Ok(id)
    }

    /// Claim up to `batch` runnable tasks, marking them active.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
    /// same task. A key whose previous task is still active is deferred:
    /// the dedupe index only spans open states, so a submission that lands
    /// while its predecessor is mid-flight inserts a fresh pending row, and
    /// claiming it early would run two tasks for one key concurrently.
    pub async fn dequeue(&self, batch: i64) -> SyncResult<Vec<SyncTask>> {
        let tasks = sqlx::query_as::<_, SyncTask>(CLAIM_SQL)
            .bind(batch)
            .fetch_all(&self.pool)
            .await?;

        Ok(tasks)
    }

    /// Finalize an active task as succeeded.
    pub async fn complete(&self, id: Uuid) -> SyncResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_tasks
            SET state = 'succeeded', updated_at = now()
            WHERE id = $1 AND state = 'active'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::invalid_state_transition("non-active", "succeeded"));
        }
        Ok(())
    }

    /// Schedule an active task for another attempt after `delay`.
    pub async fn retry(&self, id: Uuid, error: &str, delay: Duration) -> SyncResult<()> {
        let run_after =
            Utc::now() + ChronoDuration::from_std(delay).unwrap_or(ChronoDuration::zero());
        let result = sqlx::query(
            r#"
            UPDATE sync_tasks
            SET state = 'retrying',
                attempt_count = attempt_count + 1,
                last_error = $2,
                run_after = $3,
                updated_at = now()
            WHERE id = $1 AND state = 'active'
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(run_after)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::invalid_state_transition("non-active", "retrying"));
        }
        Ok(())
    }

    /// Finalize an active task as terminally failed.
    pub async fn fail(&self, id: Uuid, error: &str) -> SyncResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_tasks
            SET state = 'failed',
                attempt_count = attempt_count + 1,
                last_error = $2,
                updated_at = now()
            WHERE id = $1 AND state = 'active'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::invalid_state_transition("non-active", "failed"));
        }
        Ok(())
    }

    /// Put a just-claimed task back without consuming an attempt.
    pub async fn release(&self, id: Uuid) -> SyncResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_tasks
            SET state = 'pending', updated_at = now()
            WHERE id = $1 AND state = 'active'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Release active tasks that have been held longer than `older_than`.
    ///
    /// Covers workers that died mid-task; delivery is at-least-once.
    pub async fn release_stale(&self, older_than: Duration) -> SyncResult<u64> {
        let cutoff =
            Utc::now() - ChronoDuration::from_std(older_than).unwrap_or(ChronoDuration::zero());
        let result = sqlx::query(
            r#"
            UPDATE sync_tasks
            SET state = 'pending', updated_at = now()
            WHERE state = 'active' AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Number of open tasks, for status surfaces.
    pub async fn open_count(&self) -> SyncResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sync_tasks WHERE state IN ('pending', 'retrying')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    // Queue behavior is exercised against a live database in deployment
    // integration tests; the dedupe key semantics it relies on are covered
    // in task::tests.

    use super::CLAIM_SQL;

    #[test]
    fn test_claim_defers_keys_with_an_active_task() {
        // A successor submitted while its predecessor runs must wait for it
        // to settle; only one task per dedupe key may ever be in flight.
        assert!(CLAIM_SQL.contains("key_fingerprint NOT IN"));
        assert!(CLAIM_SQL.contains("WHERE state = 'active'"));
        assert!(CLAIM_SQL.contains("FOR UPDATE SKIP LOCKED"));
    }
}
