//! Domain service for switching accounts between active and inactive.
//!
//! Deactivation is guarded (last admin, last owner), reconciles room
//! ownership, archives subscriptions, drops login tokens and locks direct
//! conversations. Activation undoes the reversible parts.

use serde::Serialize;
use thiserror::Error;

use crate::domain::UserId;
use crate::services::hooks::HookEvent;
use crate::services::ownership::SingleOwnedRoom;

/// Errors raised by a status transition.
#[derive(Debug, Error)]
pub enum StatusError {
    /// Deactivating would leave no active administrator.
    #[error("Leaving the app without an active admin is not allowed")]
    LastAdmin {
        method: &'static str,
        action: &'static str,
    },

    /// The user is the only owner of these rooms; retry with the relinquish override.
    #[error("User is the last owner of {} room(s)", .0.len())]
    LastOwner(Vec<SingleOwnedRoom>),

    #[error("Room ownership relinquishment failed: {0}")]
    Relinquish(#[source] anyhow::Error),

    #[error("Closing livechat conversations failed: {0}")]
    Close(#[source] anyhow::Error),

    #[error("Hook '{event}' failed: {source}")]
    Hook {
        event: HookEvent,
        #[source]
        source: anyhow::Error,
    },

    #[error("Database error: {0}")]
    Database(String),
}

impl StatusError {
    pub(crate) const fn last_admin() -> Self {
        Self::LastAdmin {
            method: "setUserActiveStatus",
            action: "Remove_last_admin",
        }
    }

    /// Stable machine-readable code for callers that map errors to responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::LastAdmin { .. } => "error-action-not-allowed",
            Self::LastOwner(_) => "user-last-owner",
            Self::Relinquish(_) => "error-relinquish-failed",
            Self::Close(_) => "error-close-failed",
            Self::Hook { .. } => "error-hook-failed",
            Self::Database(_) => "error-database",
        }
    }

    /// Rooms blocking the deactivation, if this is a last-owner error.
    #[must_use]
    pub fn blocking_rooms(&self) -> &[SingleOwnedRoom] {
        match self {
            Self::LastOwner(rooms) => rooms,
            _ => &[],
        }
    }
}

impl From<sea_orm::DbErr> for StatusError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for StatusError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Result of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StatusOutcome {
    /// No user with the given id; nothing was changed.
    NotFound,
    /// The transition ran to completion.
    Transitioned {
        /// Whether a status-change email was requested.
        notified: bool,
    },
}

impl StatusOutcome {
    /// Boolean form kept for existing callers.
    ///
    /// `true` means the transition ran and no email was due. `false` covers
    /// both "user not found" and "email requested".
    #[must_use]
    pub const fn as_legacy_flag(&self) -> bool {
        matches!(self, Self::Transitioned { notified: false })
    }
}

/// Domain service trait for account status transitions.
#[async_trait::async_trait]
pub trait UserStatusService: Send + Sync {
    /// Moves the user to `active`, running every side effect of the change.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::LastAdmin`] when deactivating the only active
    /// admin, and [`StatusError::LastOwner`] when the user solely owns rooms
    /// and `confirm_relinquish` is false. Collaborator and storage failures
    /// propagate unchanged.
    async fn transition_user_status(
        &self,
        user_id: &UserId,
        active: bool,
        confirm_relinquish: bool,
    ) -> Result<StatusOutcome, StatusError>;

    /// Same as [`transition_user_status`](Self::transition_user_status), with
    /// the outcome folded into the legacy boolean.
    async fn set_user_active_status(
        &self,
        user_id: &UserId,
        active: bool,
        confirm_relinquish: bool,
    ) -> Result<bool, StatusError> {
        let outcome = self
            .transition_user_status(user_id, active, confirm_relinquish)
            .await?;
        Ok(outcome.as_legacy_flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoomId, RoomType};
    use crate::services::ownership::OwnershipAction;

    #[test]
    fn legacy_flag_mapping() {
        assert!(!StatusOutcome::NotFound.as_legacy_flag());
        assert!(StatusOutcome::Transitioned { notified: false }.as_legacy_flag());
        assert!(!StatusOutcome::Transitioned { notified: true }.as_legacy_flag());
    }

    #[test]
    fn status_error_display() {
        let err = StatusError::last_admin();
        assert_eq!(
            err.to_string(),
            "Leaving the app without an active admin is not allowed"
        );
        assert_eq!(err.code(), "error-action-not-allowed");

        let err = StatusError::LastOwner(vec![SingleOwnedRoom {
            room_id: RoomId::new("r1"),
            room_name: Some("general".to_string()),
            room_type: RoomType::Channel,
            action: OwnershipAction::ChangeOwner,
        }]);
        assert_eq!(err.to_string(), "User is the last owner of 1 room(s)");
        assert_eq!(err.code(), "user-last-owner");
        assert_eq!(err.blocking_rooms().len(), 1);
    }

    #[test]
    fn error_conversions_work() {
        let db_err = sea_orm::DbErr::Custom("test".to_string());
        let err: StatusError = db_err.into();
        assert!(matches!(err, StatusError::Database(_)));

        let err: StatusError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, StatusError::Database(ref m) if m == "boom"));
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_value(StatusOutcome::Transitioned { notified: true }).unwrap();
        assert_eq!(json["outcome"], "transitioned");
        assert_eq!(json["notified"], true);
    }
}
