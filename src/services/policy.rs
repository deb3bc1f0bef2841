//! Deactivation safety checks.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ADMIN_ROLE;
use crate::models::user::User;
use crate::services::gateway::{RoomGateway, UserGateway};
use crate::services::ownership::{
    DeactivationPlan, SingleOwnedRoom, should_remove_or_change_owner, subscribed_rooms_with_details,
};
use crate::services::user_status_service::StatusError;

/// Why a deactivation is not allowed as requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    LastAdmin,
    LastOwner,
}

/// Raw guard verdict, computed without the relinquish override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardVerdict {
    pub allowed: bool,
    pub reason: Option<BlockReason>,
    pub blocking_rooms: Vec<SingleOwnedRoom>,
    pub plan: DeactivationPlan,
}

pub struct PolicyGuard {
    users: Arc<dyn UserGateway>,
    rooms: Arc<dyn RoomGateway>,
}

impl PolicyGuard {
    #[must_use]
    pub fn new(users: Arc<dyn UserGateway>, rooms: Arc<dyn RoomGateway>) -> Self {
        Self { users, rooms }
    }

    /// True when `user` is the only active administrator left.
    async fn is_last_active_admin(&self, user: &User) -> Result<bool, StatusError> {
        if !user.active {
            return Ok(false);
        }
        if self.users.find_admin_by_id(&user.id).await?.is_none() {
            return Ok(false);
        }
        let active_admins = self.users.count_active_users_in_role(ADMIN_ROLE).await?;
        Ok(active_admins == 1)
    }

    /// Evaluates the deactivation of `user` without side effects.
    ///
    /// Users without a username own nothing and are always allowed.
    pub async fn evaluate(&self, user: &User) -> Result<GuardVerdict, StatusError> {
        if user.username.is_none() {
            return Ok(GuardVerdict {
                allowed: true,
                reason: None,
                blocking_rooms: Vec::new(),
                plan: DeactivationPlan::default(),
            });
        }

        if self.is_last_active_admin(user).await? {
            return Ok(GuardVerdict {
                allowed: false,
                reason: Some(BlockReason::LastAdmin),
                blocking_rooms: Vec::new(),
                plan: DeactivationPlan::default(),
            });
        }

        let rooms = subscribed_rooms_with_details(self.rooms.as_ref(), &user.id).await?;
        let plan = DeactivationPlan::partition(rooms);

        if should_remove_or_change_owner(&plan.chat_rooms) {
            return Ok(GuardVerdict {
                allowed: false,
                reason: Some(BlockReason::LastOwner),
                blocking_rooms: plan.blocking_rooms(),
                plan,
            });
        }

        Ok(GuardVerdict {
            allowed: true,
            reason: None,
            blocking_rooms: Vec::new(),
            plan,
        })
    }

    /// Checks that `user` may be deactivated and returns the rooms to reconcile.
    ///
    /// # Errors
    ///
    /// [`StatusError::LastAdmin`] always blocks. [`StatusError::LastOwner`]
    /// blocks unless `confirm_relinquish` is set.
    pub async fn can_deactivate(
        &self,
        user: &User,
        confirm_relinquish: bool,
    ) -> Result<DeactivationPlan, StatusError> {
        let verdict = self.evaluate(user).await?;
        debug!(
            user_id = %user.id,
            allowed = verdict.allowed,
            reason = ?verdict.reason,
            blocking = verdict.blocking_rooms.len(),
            "Evaluated deactivation guard"
        );

        match verdict.reason {
            None => Ok(verdict.plan),
            Some(BlockReason::LastAdmin) => Err(StatusError::last_admin()),
            Some(BlockReason::LastOwner) if confirm_relinquish => Ok(verdict.plan),
            Some(BlockReason::LastOwner) => Err(StatusError::LastOwner(verdict.blocking_rooms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::domain::RoomType;
    use crate::models::room::NewRoom;
    use crate::models::user::NewUser;

    async fn guard() -> (Store, PolicyGuard) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let shared = Arc::new(store.clone());
        (store, PolicyGuard::new(shared.clone(), shared))
    }

    async fn create(store: &Store, username: Option<&str>, active: bool, roles: &[&str]) -> User {
        store
            .create_user(NewUser {
                username: username.map(str::to_string),
                name: None,
                active,
                emails: Vec::new(),
                roles: roles.iter().map(|r| (*r).to_string()).collect(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sole_active_admin_is_blocked() {
        let (store, guard) = guard().await;
        let admin = create(&store, Some("root"), true, &[ADMIN_ROLE]).await;

        let verdict = guard.evaluate(&admin).await.unwrap();
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, Some(BlockReason::LastAdmin));

        let err = guard.can_deactivate(&admin, true).await.unwrap_err();
        assert!(matches!(err, StatusError::LastAdmin { .. }));
    }

    #[tokio::test]
    async fn inactive_admin_is_not_the_last_admin() {
        let (store, guard) = guard().await;
        let _active = create(&store, Some("root"), true, &[ADMIN_ROLE]).await;
        let dormant = create(&store, Some("old-root"), false, &[ADMIN_ROLE]).await;

        let verdict = guard.evaluate(&dormant).await.unwrap();
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn sole_ownership_needs_override() {
        let (store, guard) = guard().await;
        let owner = create(&store, Some("alice"), true, &[]).await;
        let room = store
            .create_room(NewRoom::new(Some("solo"), RoomType::Channel).owner(&owner.id))
            .await
            .unwrap();

        let verdict = guard.evaluate(&owner).await.unwrap();
        assert_eq!(verdict.reason, Some(BlockReason::LastOwner));
        assert_eq!(verdict.blocking_rooms.len(), 1);
        assert_eq!(verdict.blocking_rooms[0].room_id, room.id);

        let err = guard.can_deactivate(&owner, false).await.unwrap_err();
        assert_eq!(err.blocking_rooms().len(), 1);

        let plan = guard.can_deactivate(&owner, true).await.unwrap();
        assert_eq!(plan.chat_rooms.len(), 1);

        // Evaluation never writes.
        assert!(store.get_room(&room.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn users_without_username_are_always_allowed() {
        let (store, guard) = guard().await;
        let bot = create(&store, None, true, &[ADMIN_ROLE]).await;

        let verdict = guard.evaluate(&bot).await.unwrap();
        assert!(verdict.allowed);
        assert!(verdict.plan.chat_rooms.is_empty());
    }
}
