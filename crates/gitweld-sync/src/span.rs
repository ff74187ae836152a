//! Explicit tracing span wrappers.
//!
//! Task and resolution work is wrapped in spans built here, so every log
//! line inside a handler carries the task correlation fields without
//! attribute-decorated functions.

use crate::task::TaskKind;
use gitweld_core::SyncScope;
use std::future::Future;
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// Run `fut` inside the span for one queue task.
pub async fn run_task_span<F, T>(kind: TaskKind, task_id: Uuid, sync_log_id: Uuid, fut: F) -> T
where
    F: Future<Output = T>,
{
    let span = info_span!(
        "sync_task",
        task.kind = %kind,
        task.id = %task_id,
        sync_log.id = %sync_log_id,
    );
    fut.instrument(span).await
}

/// Run `fut` inside the span for a conflict detection or resolution pass.
pub async fn run_resolution_span<F, T>(scope: &SyncScope, fut: F) -> T
where
    F: Future<Output = T>,
{
    let span = info_span!(
        "conflict_resolution",
        scope.kind = scope.kind_str(),
        scope.entity = %scope.entity_uuid(),
    );
    fut.instrument(span).await
}
