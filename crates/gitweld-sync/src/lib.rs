//! The gitweld reconciliation engine.
//!
//! Keeps membership and permission state consistent between an internal
//! system of record and external Git hosting providers. Membership changes
//! are accepted by the [`intake::IntakeService`], persisted as audit records
//! and deduplicated queue tasks, and drained by the [`worker::SyncWorker`]
//! under bounded concurrency. Drift between the two sides is surfaced and
//! repaired by the conflict machinery in [`conflict`].
//!
//! A sync failure never fails the membership operation that triggered it;
//! the failure lands in the audit log and, when retryable, back on the
//! queue.

pub mod config;
pub mod conflict;
pub mod directory;
pub mod error;
pub mod executor;
pub mod intake;
pub mod log;
pub mod migrations;
pub mod org;
pub mod queue;
pub mod span;
pub mod task;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::SyncConfig;
pub use conflict::{Conflict, ConflictKind, ConflictService, ResolveOptions};
pub use directory::{GitIntegration, LinkedAccount, MemberRecord, MembershipDirectory};
pub use error::{SyncError, SyncResult};
pub use executor::{BatchManifest, TaskExecutor, TaskOutcome};
pub use intake::IntakeService;
pub use log::{SyncLogRecord, SyncStatus};
pub use org::OrgSyncService;
pub use queue::SyncQueue;
pub use task::{SyncTask, TaskKind, TaskState};
pub use worker::SyncWorker;
