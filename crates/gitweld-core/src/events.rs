//! Typed sync events.
//!
//! The engine publishes a closed set of events over a broadcast channel.
//! Consumers subscribe for a typed receiver; publishing never blocks and a
//! missing subscriber is not an error.

use crate::ids::{SyncLogId, UserId};
use crate::roles::PermissionTier;
use crate::scope::SyncScope;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default buffer for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Events emitted by the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A member's external access was created or updated.
    MemberSynced {
        scope: SyncScope,
        user_id: UserId,
        tier: PermissionTier,
    },

    /// A member's external access was removed.
    MemberRemoved { scope: SyncScope, user_id: UserId },

    /// A sync task failed terminally.
    SyncFailed {
        scope: SyncScope,
        user_id: Option<UserId>,
        sync_log_id: SyncLogId,
        error_kind: String,
    },

    /// A batch sync finished, successfully or not.
    BatchCompleted {
        scope: SyncScope,
        total: usize,
        succeeded: usize,
        failed: usize,
    },

    /// A conflict resolution run finished.
    ConflictResolved {
        scope: SyncScope,
        resolved: usize,
        failed: usize,
        skipped: usize,
    },
}

/// Broadcast bus for [`SyncEvent`].
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. A bus with no subscribers drops the event silently.
    pub fn publish(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe for a typed receiver.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
