//! Account events published to in-process listeners.
//!
//! These are sent over a tokio broadcast channel by the `BroadcastHook`
//! and by the outbox mailer; nothing here is persisted.

use serde::Serialize;

use super::UserId;

/// Status changes observed by the lifecycle hook bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum AccountEvent {
    UserActivating {
        user_id: UserId,
        username: Option<String>,
    },
    UserActivated {
        user_id: UserId,
        username: Option<String>,
    },
    UserDeactivated {
        user_id: UserId,
        username: Option<String>,
    },
}

impl AccountEvent {
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        match self {
            Self::UserActivating { user_id, .. }
            | Self::UserActivated { user_id, .. }
            | Self::UserDeactivated { user_id, .. } => user_id,
        }
    }
}
