//! Sole-ownership detection and reconciliation.
//!
//! A room "needs attention" when the user being deactivated is its only
//! owner. If nobody else is subscribed the room is removed, otherwise the
//! longest-standing member becomes owner. Livechat rooms are closed instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{RoomId, RoomType, UserId};
use crate::models::room::SubscribedRoom;
use crate::models::user::User;
use crate::services::gateway::RoomGateway;
use crate::services::user_status_service::StatusError;

/// What relinquishment will do to a solely owned room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipAction {
    ChangeOwner,
    Remove,
}

/// A room the user owns alone, reported back to the caller on `LastOwner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleOwnedRoom {
    pub room_id: RoomId,
    pub room_name: Option<String>,
    pub room_type: RoomType,
    pub action: OwnershipAction,
}

/// A subscribed room with the ownership facts needed to deactivate its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOwnershipDetails {
    pub room: SubscribedRoom,
    pub should_change_owner: bool,
    pub should_be_removed: bool,
    pub member_count: u64,
    pub new_owner: Option<UserId>,
}

impl RoomOwnershipDetails {
    #[must_use]
    pub const fn needs_attention(&self) -> bool {
        self.should_change_owner || self.should_be_removed
    }

    #[must_use]
    pub fn to_single_owned(&self) -> Option<SingleOwnedRoom> {
        let action = if self.should_be_removed {
            OwnershipAction::Remove
        } else if self.should_change_owner {
            OwnershipAction::ChangeOwner
        } else {
            return None;
        };

        Some(SingleOwnedRoom {
            room_id: self.room.room_id.clone(),
            room_name: self.room.room_name.clone(),
            room_type: self.room.room_type,
            action,
        })
    }
}

/// Loads the user's non-direct subscriptions and works out which ones the user owns alone.
pub async fn subscribed_rooms_with_details(
    rooms: &dyn RoomGateway,
    user_id: &UserId,
) -> anyhow::Result<Vec<RoomOwnershipDetails>> {
    let subscribed = rooms.find_subscribed_rooms(user_id).await?;
    let mut details = Vec::with_capacity(subscribed.len());

    for room in subscribed {
        let mut entry = RoomOwnershipDetails {
            room,
            should_change_owner: false,
            should_be_removed: false,
            member_count: 0,
            new_owner: None,
        };

        if entry.room.is_owner && !entry.room.room_type.is_livechat() {
            let owners = rooms.count_room_owners(&entry.room.room_id).await?;
            if owners == 1 {
                entry.member_count = rooms.count_room_members(&entry.room.room_id).await?;
                if entry.member_count <= 1 {
                    entry.should_be_removed = true;
                } else {
                    entry.should_change_owner = true;
                    entry.new_owner = rooms
                        .find_oldest_member_except(&entry.room.room_id, user_id)
                        .await?;
                }
            }
        }

        details.push(entry);
    }

    Ok(details)
}

#[must_use]
pub fn should_remove_or_change_owner(rooms: &[RoomOwnershipDetails]) -> bool {
    rooms.iter().any(RoomOwnershipDetails::needs_attention)
}

#[must_use]
pub fn single_owned_rooms(rooms: &[RoomOwnershipDetails]) -> Vec<SingleOwnedRoom> {
    rooms
        .iter()
        .filter_map(RoomOwnershipDetails::to_single_owned)
        .collect()
}

/// Rooms the reconciler must process, as cleared by the policy guard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeactivationPlan {
    pub chat_rooms: Vec<RoomOwnershipDetails>,
    pub livechat_rooms: Vec<RoomOwnershipDetails>,
}

impl DeactivationPlan {
    /// Splits subscribed rooms into chat rooms and livechat rooms.
    #[must_use]
    pub fn partition(rooms: Vec<RoomOwnershipDetails>) -> Self {
        let (livechat_rooms, chat_rooms) = rooms
            .into_iter()
            .partition(|r| r.room.room_type.is_livechat());
        Self {
            chat_rooms,
            livechat_rooms,
        }
    }

    #[must_use]
    pub fn blocking_rooms(&self) -> Vec<SingleOwnedRoom> {
        single_owned_rooms(&self.chat_rooms)
    }
}

/// Transfers or removes rooms the user owns alone.
#[async_trait]
pub trait OwnershipRelinquisher: Send + Sync {
    /// `remove_direct_rooms` also deletes the user's direct conversations.
    async fn relinquish(
        &self,
        user: &User,
        rooms: &[RoomOwnershipDetails],
        remove_direct_rooms: bool,
    ) -> anyhow::Result<()>;
}

/// Closes open livechat conversations served by the user.
#[async_trait]
pub trait ConversationCloser: Send + Sync {
    async fn close(&self, user: &User, rooms: &[RoomOwnershipDetails]) -> anyhow::Result<()>;
}

/// Default relinquisher writing through the room gateway.
pub struct StoreRelinquisher {
    rooms: Arc<dyn RoomGateway>,
}

impl StoreRelinquisher {
    #[must_use]
    pub fn new(rooms: Arc<dyn RoomGateway>) -> Self {
        Self { rooms }
    }
}

#[async_trait]
impl OwnershipRelinquisher for StoreRelinquisher {
    async fn relinquish(
        &self,
        user: &User,
        rooms: &[RoomOwnershipDetails],
        remove_direct_rooms: bool,
    ) -> anyhow::Result<()> {
        for room in rooms.iter().filter(|r| r.should_change_owner) {
            match &room.new_owner {
                Some(new_owner) => {
                    self.rooms
                        .add_room_owner(&room.room.room_id, new_owner)
                        .await?;
                    info!(
                        room_id = %room.room.room_id,
                        new_owner = %new_owner,
                        previous_owner = %user.id,
                        "Transferred room ownership"
                    );
                }
                None => anyhow::bail!(
                    "Room {} needs a new owner but has no other member",
                    room.room.room_id
                ),
            }
        }

        let mut to_remove: Vec<RoomId> = rooms
            .iter()
            .filter(|r| r.should_be_removed)
            .map(|r| r.room.room_id.clone())
            .collect();

        if remove_direct_rooms {
            to_remove.extend(
                self.rooms
                    .find_direct_rooms_by_user_id(&user.id)
                    .await?
                    .into_iter()
                    .map(|r| r.id),
            );
        }

        if !to_remove.is_empty() {
            let removed = self.rooms.remove_rooms(&to_remove).await?;
            info!(user_id = %user.id, removed, "Removed rooms left without owner");
        }

        Ok(())
    }
}

/// Default closer writing through the room gateway.
pub struct StoreConversationCloser {
    rooms: Arc<dyn RoomGateway>,
}

impl StoreConversationCloser {
    #[must_use]
    pub fn new(rooms: Arc<dyn RoomGateway>) -> Self {
        Self { rooms }
    }
}

#[async_trait]
impl ConversationCloser for StoreConversationCloser {
    async fn close(&self, user: &User, rooms: &[RoomOwnershipDetails]) -> anyhow::Result<()> {
        for room in rooms.iter().filter(|r| r.room.open) {
            if self.rooms.close_livechat_room(&room.room.room_id, &user.id).await? {
                info!(room_id = %room.room.room_id, agent = %user.id, "Closed livechat conversation");
            }
        }
        Ok(())
    }
}

/// Runs closure and relinquishment for a user cleared for deactivation.
pub struct OwnershipReconciler {
    relinquisher: Arc<dyn OwnershipRelinquisher>,
    closer: Arc<dyn ConversationCloser>,
}

impl OwnershipReconciler {
    #[must_use]
    pub fn new(
        relinquisher: Arc<dyn OwnershipRelinquisher>,
        closer: Arc<dyn ConversationCloser>,
    ) -> Self {
        Self {
            relinquisher,
            closer,
        }
    }

    pub async fn reconcile(&self, user: &User, plan: &DeactivationPlan) -> Result<(), StatusError> {
        debug!(
            user_id = %user.id,
            chat_rooms = plan.chat_rooms.len(),
            livechat_rooms = plan.livechat_rooms.len(),
            "Reconciling room ownership"
        );

        self.closer
            .close(user, &plan.livechat_rooms)
            .await
            .map_err(StatusError::Close)?;

        self.relinquisher
            .relinquish(user, &plan.chat_rooms, false)
            .await
            .map_err(StatusError::Relinquish)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(
        id: &str,
        room_type: RoomType,
        should_change_owner: bool,
        should_be_removed: bool,
    ) -> RoomOwnershipDetails {
        RoomOwnershipDetails {
            room: SubscribedRoom {
                room_id: RoomId::new(id),
                room_name: Some(id.to_string()),
                room_type,
                is_owner: should_change_owner || should_be_removed,
                open: room_type.is_livechat(),
            },
            should_change_owner,
            should_be_removed,
            member_count: 0,
            new_owner: None,
        }
    }

    #[test]
    fn plan_partitions_livechat() {
        let plan = DeactivationPlan::partition(vec![
            details("c1", RoomType::Channel, false, false),
            details("l1", RoomType::Livechat, false, false),
            details("p1", RoomType::Private, true, false),
        ]);
        assert_eq!(plan.chat_rooms.len(), 2);
        assert_eq!(plan.livechat_rooms.len(), 1);
        assert_eq!(plan.livechat_rooms[0].room.room_id, RoomId::new("l1"));
    }

    #[test]
    fn single_owned_rooms_lists_only_rooms_needing_attention() {
        let rooms = vec![
            details("c1", RoomType::Channel, false, false),
            details("c2", RoomType::Channel, true, false),
            details("p1", RoomType::Private, false, true),
        ];
        assert!(should_remove_or_change_owner(&rooms));

        let single = single_owned_rooms(&rooms);
        assert_eq!(single.len(), 2);
        assert_eq!(single[0].room_id, RoomId::new("c2"));
        assert_eq!(single[0].action, OwnershipAction::ChangeOwner);
        assert_eq!(single[1].room_id, RoomId::new("p1"));
        assert_eq!(single[1].action, OwnershipAction::Remove);
    }

    #[test]
    fn no_rooms_need_attention() {
        let rooms = vec![details("c1", RoomType::Channel, false, false)];
        assert!(!should_remove_or_change_owner(&rooms));
        assert!(single_owned_rooms(&rooms).is_empty());
        assert!(!should_remove_or_change_owner(&[]));
    }

    #[tokio::test]
    async fn handover_without_candidate_aborts() {
        use crate::db::Store;
        use crate::models::room::NewRoom;
        use crate::models::user::NewUser;

        let store = Store::new("sqlite::memory:").await.unwrap();
        let owner = store
            .create_user(NewUser {
                username: Some("olga".to_string()),
                active: true,
                ..NewUser::default()
            })
            .await
            .unwrap();
        let room = store
            .create_room(NewRoom::new(Some("orphan"), RoomType::Channel).owner(&owner.id))
            .await
            .unwrap();

        let mut entry = details(room.id.as_str(), RoomType::Channel, true, false);
        entry.member_count = 2;
        let relinquisher = StoreRelinquisher::new(Arc::new(store.clone()));

        let err = relinquisher
            .relinquish(&owner, &[entry], false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("needs a new owner"));
        assert!(store.get_room(&room.id).await.unwrap().is_some());
    }
}
