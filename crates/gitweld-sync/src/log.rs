//! Sync audit log.
//!
//! Every accepted operation gets exactly one `SyncLogRecord` that tracks it
//! from `pending` to `success` or `failed`. Retries mutate the existing
//! record's attempt metadata; they never create new rows.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// What kind of membership the record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Member,
    Project,
    Organization,
}

impl SyncType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Project => "project",
            Self::Organization => "organization",
        }
    }
}

impl Display for SyncType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation the record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Add,
    Update,
    Remove,
    Sync,
    BatchSync,
    ConflictResolution,
}

impl SyncAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Sync => "sync",
            Self::BatchSync => "batch_sync",
            Self::ConflictResolution => "conflict_resolution",
        }
    }
}

impl Display for SyncAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Success,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid sync status: {s}")),
        }
    }
}

/// One audit record per accepted sync operation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyncLogRecord {
    pub id: Uuid,
    pub sync_type: SyncType,
    pub action: SyncAction,
    pub provider: String,
    pub resource_type: String,
    pub resource_id: String,
    pub entity_id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: SyncStatus,
    pub error: Option<String>,
    pub error_type: Option<String>,
    pub error_stack: Option<String>,
    pub requires_resolution: bool,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields for a new pending record.
#[derive(Debug, Clone)]
pub struct NewSyncLog {
    pub sync_type: SyncType,
    pub action: SyncAction,
    pub provider: String,
    pub resource_type: String,
    pub resource_id: String,
    pub entity_id: Uuid,
    pub user_id: Option<Uuid>,
    pub metadata: Value,
}

/// Aggregated counts for a resource's sync history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SyncStats {
    pub total: i64,
    pub pending: i64,
    pub success: i64,
    pub failed: i64,
    pub requires_resolution: i64,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl SyncLogRecord {
    /// Insert a new pending record.
    pub async fn create(pool: &PgPool, new: NewSyncLog) -> SyncResult<Self> {
        let record = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO sync_logs
                (id, sync_type, action, provider, resource_type, resource_id,
                 entity_id, user_id, status, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.sync_type)
        .bind(new.action)
        .bind(&new.provider)
        .bind(&new.resource_type)
        .bind(&new.resource_id)
        .bind(new.entity_id)
        .bind(new.user_id)
        .bind(&new.metadata)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> SyncResult<Option<Self>> {
        let record = sqlx::query_as::<_, Self>("SELECT * FROM sync_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(record)
    }

    /// Finalize a record as successful, merging `metadata_patch` into its
    /// metadata.
    pub async fn mark_success(pool: &PgPool, id: Uuid, metadata_patch: Value) -> SyncResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_logs
            SET status = 'success',
                error = NULL,
                error_type = NULL,
                error_stack = NULL,
                metadata = metadata || $2,
                completed_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&metadata_patch)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Finalize a record as failed.
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        error: &str,
        error_type: &str,
        error_stack: Option<&str>,
        requires_resolution: bool,
    ) -> SyncResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_logs
            SET status = 'failed',
                error = $2,
                error_type = $3,
                error_stack = $4,
                requires_resolution = $5,
                completed_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(error_type)
        .bind(error_stack)
        .bind(requires_resolution)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Merge a patch into the record's metadata without touching its status.
    pub async fn merge_metadata(pool: &PgPool, id: Uuid, patch: Value) -> SyncResult<()> {
        sqlx::query("UPDATE sync_logs SET metadata = metadata || $2 WHERE id = $1")
            .bind(id)
            .bind(&patch)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Bump the record's attempt counter in place.
    pub async fn record_attempt(pool: &PgPool, id: Uuid) -> SyncResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_logs
            SET metadata = jsonb_set(
                metadata,
                '{attempt_count}',
                to_jsonb(COALESCE((metadata->>'attempt_count')::int, 0) + 1)
            )
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Reset a failed record to pending for a manual resubmission.
    pub async fn reset_pending(pool: &PgPool, id: Uuid) -> SyncResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_logs
            SET status = 'pending',
                error = NULL,
                error_type = NULL,
                error_stack = NULL,
                requires_resolution = FALSE,
                completed_at = NULL
            WHERE id = $1 AND status = 'failed'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::invalid_state_transition("non-failed", "pending"));
        }
        Ok(())
    }

    /// Recent records for an entity, newest first.
    pub async fn list_for_entity(pool: &PgPool, entity_id: Uuid, limit: i64) -> SyncResult<Vec<Self>> {
        let records = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM sync_logs
            WHERE entity_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(entity_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }

    /// Failed records, optionally filtered to one entity.
    pub async fn list_failed(
        pool: &PgPool,
        entity_id: Option<Uuid>,
        limit: i64,
    ) -> SyncResult<Vec<Self>> {
        let records = match entity_id {
            Some(entity_id) => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM sync_logs
                    WHERE status = 'failed' AND entity_id = $1
                    ORDER BY created_at DESC
                    LIMIT $2
                    "#,
                )
                .bind(entity_id)
                .bind(limit)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM sync_logs
                    WHERE status = 'failed'
                    ORDER BY created_at DESC
                    LIMIT $1
                    "#,
                )
                .bind(limit)
                .fetch_all(pool)
                .await?
            }
        };
        Ok(records)
    }

    /// Aggregate counts for an entity's history.
    pub async fn stats(pool: &PgPool, entity_id: Uuid) -> SyncResult<SyncStats> {
        let stats = sqlx::query_as::<_, SyncStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'success') AS success,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE requires_resolution) AS requires_resolution,
                MAX(completed_at) AS last_completed_at
            FROM sync_logs
            WHERE entity_id = $1
            "#,
        )
        .bind(entity_id)
        .fetch_one(pool)
        .await?;
        Ok(stats)
    }
}
