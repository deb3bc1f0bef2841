//! Storage seams used by the status workflow.
//!
//! The workflow only talks to these traits. [`Store`] implements all three by
//! delegating to its sea-orm repositories; tests can substitute their own.

use async_trait::async_trait;
use anyhow::Result;

use crate::db::Store;
use crate::domain::{RoomId, UserId};
use crate::models::room::{DirectRoom, SubscribedRoom};
use crate::models::user::User;

#[async_trait]
pub trait UserGateway: Send + Sync {
    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>>;

    /// Returns the user if it holds the admin role, active or not.
    async fn find_admin_by_id(&self, id: &UserId) -> Result<Option<User>>;

    async fn count_active_users_in_role(&self, role: &str) -> Result<u64>;

    async fn set_user_active(&self, id: &UserId, active: bool) -> Result<()>;

    async fn unset_login_tokens(&self, id: &UserId) -> Result<u64>;

    async fn set_deactivation_reason(&self, id: &UserId, reason: &str) -> Result<()>;

    async fn unset_deactivation_reason(&self, id: &UserId) -> Result<()>;

    async fn find_active_user_ids(&self, ids: &[UserId]) -> Result<Vec<UserId>>;
}

#[async_trait]
pub trait RoomGateway: Send + Sync {
    async fn find_direct_rooms_by_user_id(&self, user_id: &UserId) -> Result<Vec<DirectRoom>>;

    /// Bulk update of the read-only flag on the user's direct rooms.
    ///
    /// `only = None` forces every direct room of the user.
    async fn set_direct_read_only_by_user_id(
        &self,
        user_id: &UserId,
        only: Option<&[RoomId]>,
        read_only: bool,
        react_when_read_only: bool,
    ) -> Result<u64>;

    /// Rooms the user is subscribed to, direct rooms excluded.
    async fn find_subscribed_rooms(&self, user_id: &UserId) -> Result<Vec<SubscribedRoom>>;

    async fn count_room_owners(&self, room_id: &RoomId) -> Result<u64>;

    async fn count_room_members(&self, room_id: &RoomId) -> Result<u64>;

    async fn find_oldest_member_except(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<UserId>>;

    async fn add_room_owner(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool>;

    async fn remove_rooms(&self, ids: &[RoomId]) -> Result<u64>;

    async fn close_livechat_room(&self, room_id: &RoomId, agent: &UserId) -> Result<bool>;
}

#[async_trait]
pub trait SubscriptionGateway: Send + Sync {
    async fn set_archived_by_username(&self, username: &str, archived: bool) -> Result<u64>;
}

#[async_trait]
impl UserGateway for Store {
    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>> {
        self.get_user(id).await
    }

    async fn find_admin_by_id(&self, id: &UserId) -> Result<Option<User>> {
        self.find_user_in_role(id, crate::domain::ADMIN_ROLE).await
    }

    async fn count_active_users_in_role(&self, role: &str) -> Result<u64> {
        Self::count_active_users_in_role(self, role).await
    }

    async fn set_user_active(&self, id: &UserId, active: bool) -> Result<()> {
        if !Self::set_user_active(self, id, active).await? {
            anyhow::bail!("User {id} disappeared before its active flag could be written");
        }
        Ok(())
    }

    async fn unset_login_tokens(&self, id: &UserId) -> Result<u64> {
        self.remove_login_tokens(id).await
    }

    async fn set_deactivation_reason(&self, id: &UserId, reason: &str) -> Result<()> {
        self.set_user_deactivation_reason(id, Some(reason)).await
    }

    async fn unset_deactivation_reason(&self, id: &UserId) -> Result<()> {
        self.set_user_deactivation_reason(id, None).await
    }

    async fn find_active_user_ids(&self, ids: &[UserId]) -> Result<Vec<UserId>> {
        Self::find_active_user_ids(self, ids).await
    }
}

#[async_trait]
impl RoomGateway for Store {
    async fn find_direct_rooms_by_user_id(&self, user_id: &UserId) -> Result<Vec<DirectRoom>> {
        self.get_direct_rooms_for_user(user_id).await
    }

    async fn set_direct_read_only_by_user_id(
        &self,
        user_id: &UserId,
        only: Option<&[RoomId]>,
        read_only: bool,
        react_when_read_only: bool,
    ) -> Result<u64> {
        self.set_direct_read_only_for_user(user_id, only, read_only, react_when_read_only)
            .await
    }

    async fn find_subscribed_rooms(&self, user_id: &UserId) -> Result<Vec<SubscribedRoom>> {
        self.get_subscribed_rooms(user_id).await
    }

    async fn count_room_owners(&self, room_id: &RoomId) -> Result<u64> {
        Self::count_room_owners(self, room_id).await
    }

    async fn count_room_members(&self, room_id: &RoomId) -> Result<u64> {
        Self::count_room_members(self, room_id).await
    }

    async fn find_oldest_member_except(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<UserId>> {
        self.get_oldest_member_except(room_id, user_id).await
    }

    async fn add_room_owner(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool> {
        Self::add_room_owner(self, room_id, user_id).await
    }

    async fn remove_rooms(&self, ids: &[RoomId]) -> Result<u64> {
        Self::remove_rooms(self, ids).await
    }

    async fn close_livechat_room(&self, room_id: &RoomId, agent: &UserId) -> Result<bool> {
        Self::close_livechat_room(self, room_id, agent).await
    }
}

#[async_trait]
impl SubscriptionGateway for Store {
    async fn set_archived_by_username(&self, username: &str, archived: bool) -> Result<u64> {
        self.set_subscriptions_archived(username, archived).await
    }
}
