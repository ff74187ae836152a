//! Core types for the gitweld reconciliation engine.
//!
//! This crate carries the vocabulary shared by every other gitweld crate:
//! strongly typed identifiers, internal roles and permission tiers, the
//! sync scope (project or organization), and the closed set of events the
//! engine publishes.

pub mod error;
pub mod events;
pub mod ids;
pub mod roles;
pub mod scope;

pub use error::ParseValueError;
pub use events::{EventBus, SyncEvent};
pub use ids::{OrgId, ParseIdError, ProjectId, SyncLogId, TaskId, UserId};
pub use roles::{OrgRole, PermissionTier, ProjectRole};
pub use scope::SyncScope;
