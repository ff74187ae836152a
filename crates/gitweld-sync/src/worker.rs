//! The queue-draining worker.
//!
//! Polls the task queue on an interval, executes claimed tasks under a
//! semaphore-bounded concurrency limit, and turns each [`TaskOutcome`] into
//! queue state transitions, audit log updates and events.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::executor::{TaskExecutor, TaskOutcome};
use crate::log::SyncLogRecord;
use crate::queue::SyncQueue;
use crate::span;
use crate::task::{SyncTask, TaskKind};
use gitweld_core::{EventBus, PermissionTier, SyncEvent, SyncLogId, UserId};
use gitweld_provider::BackoffPolicy;
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// How often abandoned active tasks are swept back to pending.
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// What to do with a task after one execution.
#[derive(Debug, PartialEq)]
pub enum Disposition {
    /// Finalize the record and the task as successful.
    Complete,
    /// Put the task back with a delay.
    Retry(Duration),
    /// Finalize both as failed.
    Fail,
}

/// Pure outcome-to-disposition rule.
///
/// `attempt` is the number of attempts already consumed before this one.
#[must_use]
pub fn decide(outcome: &TaskOutcome, attempt: u32, policy: &BackoffPolicy) -> Disposition {
    match outcome {
        TaskOutcome::Completed { .. } | TaskOutcome::Skipped { .. } => Disposition::Complete,
        TaskOutcome::Failed { error, .. } => {
            if !error.is_retryable() || attempt >= policy.max_attempts {
                return Disposition::Fail;
            }
            let delay = match error.as_provider() {
                Some(provider_error) => policy.delay_for(attempt, provider_error),
                None => policy.exponential(attempt),
            };
            Disposition::Retry(delay)
        }
    }
}

/// Drains the sync task queue.
pub struct SyncWorker {
    pool: PgPool,
    queue: SyncQueue,
    executor: Arc<TaskExecutor>,
    events: EventBus,
    config: SyncConfig,
    semaphore: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
}

impl SyncWorker {
    #[must_use]
    pub fn new(
        pool: PgPool,
        executor: Arc<TaskExecutor>,
        events: EventBus,
        config: SyncConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        Self {
            queue: SyncQueue::new(pool.clone()),
            pool,
            executor,
            events,
            config,
            semaphore,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for requesting a graceful shutdown.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run until shutdown is requested, then drain in-flight tasks.
    pub async fn run(&self) -> SyncResult<()> {
        info!(
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "sync worker started"
        );

        let mut poll = tokio::time::interval(self.config.poll_interval);
        let mut stale = tokio::time::interval(STALE_SWEEP_INTERVAL);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            tokio::select! {
                _ = poll.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "queue poll failed");
                    }
                }
                _ = stale.tick() => {
                    match self.queue.release_stale(self.config.stale_after).await {
                        Ok(released) if released > 0 => {
                            warn!(released, "released stale active tasks");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "stale sweep failed"),
                    }
                }
            }
        }

        // Drain: wait for every in-flight task to hand its permit back.
        let _drained = self
            .semaphore
            .acquire_many(self.config.concurrency as u32)
            .await;
        info!("sync worker stopped");
        Ok(())
    }

    async fn poll_once(&self) -> SyncResult<()> {
        let available = self.semaphore.available_permits();
        if available == 0 {
            return Ok(());
        }

        let batch = (available as i64).min(self.config.batch_size);
        let tasks = self.queue.dequeue(batch).await?;

        for task in tasks {
            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    self.queue.release(task.id).await?;
                    continue;
                }
            };

            let pool = self.pool.clone();
            let queue = self.queue.clone();
            let executor = self.executor.clone();
            let events = self.events.clone();
            let policy = self.config.backoff.clone();

            tokio::spawn(async move {
                let _permit = permit;
                Self::process_task(&pool, &queue, &executor, &events, &policy, task).await;
            });
        }
        Ok(())
    }

    async fn process_task(
        pool: &PgPool,
        queue: &SyncQueue,
        executor: &TaskExecutor,
        events: &EventBus,
        policy: &BackoffPolicy,
        task: SyncTask,
    ) {
        span::run_task_span(task.kind, task.id, task.sync_log_id, async {
            if let Err(e) = SyncLogRecord::record_attempt(pool, task.sync_log_id).await {
                warn!(error = %e, "failed to bump attempt counter");
            }

            let outcome = executor.execute(&task).await;
            let disposition = decide(&outcome, task.attempt_count as u32, policy);

            if let Err(e) = Self::settle(pool, queue, events, &task, &outcome, disposition).await {
                error!(error = %e, "failed to record task outcome");
            }
        })
        .await;
    }

    async fn settle(
        pool: &PgPool,
        queue: &SyncQueue,
        events: &EventBus,
        task: &SyncTask,
        outcome: &TaskOutcome,
        disposition: Disposition,
    ) -> SyncResult<()> {
        match disposition {
            Disposition::Complete => {
                SyncLogRecord::mark_success(pool, task.sync_log_id, success_metadata(outcome))
                    .await?;
                queue.complete(task.id).await?;
                if let Some(event) = success_event(task, outcome) {
                    events.publish(event);
                }
                info!("task completed");
            }
            Disposition::Retry(delay) => {
                let message = failure_message(outcome);
                queue.retry(task.id, &message, delay).await?;
                warn!(
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "task scheduled for retry"
                );
            }
            Disposition::Fail => {
                let TaskOutcome::Failed { error, manifest } = outcome else {
                    return Err(crate::error::SyncError::internal(
                        "fail disposition for a non-failed outcome",
                    ));
                };

                if let Some(manifest) = manifest {
                    let patch = serde_json::json!({ "batch_result": manifest });
                    SyncLogRecord::merge_metadata(pool, task.sync_log_id, patch).await?;
                }

                SyncLogRecord::mark_failed(
                    pool,
                    task.sync_log_id,
                    &error.to_string(),
                    error.error_code(),
                    Some(&format!("{error:?}")),
                    error.requires_resolution(),
                )
                .await?;
                queue.fail(task.id, &error.to_string()).await?;

                if let Some(scope) = task.scope() {
                    if let Some(manifest) = manifest {
                        events.publish(SyncEvent::BatchCompleted {
                            scope,
                            total: manifest.total,
                            succeeded: manifest.succeeded,
                            failed: manifest.failed,
                        });
                    }
                    events.publish(SyncEvent::SyncFailed {
                        scope,
                        user_id: task.subject_user_id.map(UserId::from_uuid),
                        sync_log_id: SyncLogId::from_uuid(task.sync_log_id),
                        error_kind: error.error_code().to_string(),
                    });
                }
                error!(error = %error, "task failed terminally");
            }
        }
        Ok(())
    }
}

/// Metadata patch recorded on a successful or skipped task.
fn success_metadata(outcome: &TaskOutcome) -> Value {
    let mut patch = Map::new();
    match outcome {
        TaskOutcome::Completed {
            note,
            applied,
            manifest,
        } => {
            patch.insert("result".into(), Value::String("success".into()));
            if let Some(note) = note {
                patch.insert("note".into(), Value::String(note.clone()));
            }
            if let Some(applied) = applied {
                if let Ok(value) = serde_json::to_value(applied) {
                    patch.insert("applied".into(), value);
                }
            }
            if let Some(manifest) = manifest {
                if let Ok(value) = serde_json::to_value(manifest) {
                    patch.insert("batch_result".into(), value);
                }
            }
        }
        TaskOutcome::Skipped { reason } => {
            patch.insert("result".into(), Value::String("skipped".into()));
            patch.insert("reason".into(), Value::String(reason.clone()));
        }
        TaskOutcome::Failed { .. } => {}
    }
    Value::Object(patch)
}

fn failure_message(outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::Failed { error, .. } => error.to_string(),
        _ => String::new(),
    }
}

/// The tier a task's desired role grants, for event payloads.
fn task_tier(task: &SyncTask) -> PermissionTier {
    let role = task.desired_role.as_deref().unwrap_or("");
    if task.kind.is_org() {
        PermissionTier::from_org_role(role)
    } else {
        PermissionTier::from_project_role(role)
    }
}

fn success_event(task: &SyncTask, outcome: &TaskOutcome) -> Option<SyncEvent> {
    let scope = task.scope()?;
    match outcome {
        TaskOutcome::Completed { manifest, .. } => match task.kind {
            TaskKind::BatchEntitySync => manifest.as_ref().map(|m| SyncEvent::BatchCompleted {
                scope,
                total: m.total,
                succeeded: m.succeeded,
                failed: m.failed,
            }),
            TaskKind::MemberAdd
            | TaskKind::MemberUpdate
            | TaskKind::OrgMemberAdd
            | TaskKind::OrgRoleUpdate => {
                task.subject_user_id.map(|user| SyncEvent::MemberSynced {
                    scope,
                    user_id: UserId::from_uuid(user),
                    tier: task_tier(task),
                })
            }
            TaskKind::MemberRemove | TaskKind::OrgMemberRemove => {
                task.subject_user_id.map(|user| SyncEvent::MemberRemoved {
                    scope,
                    user_id: UserId::from_uuid(user),
                })
            }
        },
        _ => None,
    }
}
