//! Lifts read-only mode from direct conversations when a user comes back.
//!
//! Both sides of a direct conversation may be deactivated at the same time,
//! so a room only leaves read-only mode once its other participant is active
//! as well.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::domain::{RoomId, UserId};
use crate::models::room::DirectRoom;
use crate::services::gateway::{RoomGateway, UserGateway};
use crate::services::user_status_service::StatusError;

/// Picks the rooms whose counterpart of `user_id` is in `active`.
#[must_use]
pub fn rooms_to_reactivate(
    user_id: &UserId,
    rooms: &[DirectRoom],
    active: &HashSet<UserId>,
) -> Vec<RoomId> {
    rooms
        .iter()
        .filter(|room| {
            room.other_participant(user_id)
                .is_some_and(|other| active.contains(other))
        })
        .map(|room| room.id.clone())
        .collect()
}

pub struct ConversationReactivator {
    users: Arc<dyn UserGateway>,
    rooms: Arc<dyn RoomGateway>,
}

impl ConversationReactivator {
    #[must_use]
    pub fn new(users: Arc<dyn UserGateway>, rooms: Arc<dyn RoomGateway>) -> Self {
        Self { users, rooms }
    }

    /// Clears read-only on the user's direct rooms whose peer is active.
    ///
    /// Returns the ids of the rooms that were cleared.
    pub async fn reactivate(&self, user_id: &UserId) -> Result<Vec<RoomId>, StatusError> {
        let direct = self.rooms.find_direct_rooms_by_user_id(user_id).await?;

        let mut participants: Vec<UserId> = direct
            .iter()
            .flat_map(|room| room.uids.iter().cloned())
            .collect();
        participants.sort();
        participants.dedup();

        let active: HashSet<UserId> = self
            .users
            .find_active_user_ids(&participants)
            .await?
            .into_iter()
            .collect();

        let room_ids = rooms_to_reactivate(user_id, &direct, &active);
        debug!(
            user_id = %user_id,
            direct_rooms = direct.len(),
            reactivated = room_ids.len(),
            "Reactivating direct conversations"
        );

        self.rooms
            .set_direct_read_only_by_user_id(user_id, Some(&room_ids), false, false)
            .await?;

        Ok(room_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dm(id: &str, a: &str, b: &str) -> DirectRoom {
        DirectRoom {
            id: RoomId::new(id),
            uids: vec![UserId::new(a), UserId::new(b)],
        }
    }

    #[test]
    fn only_rooms_with_active_peer_are_selected() {
        let me = UserId::new("me");
        let rooms = vec![dm("d1", "me", "alice"), dm("d2", "bob", "me"), dm("d3", "me", "carol")];
        let active: HashSet<UserId> = ["me", "alice", "carol"].into_iter().map(UserId::from).collect();

        assert_eq!(
            rooms_to_reactivate(&me, &rooms, &active),
            vec![RoomId::new("d1"), RoomId::new("d3")]
        );
    }

    #[test]
    fn self_conversation_is_left_alone() {
        let me = UserId::new("me");
        let rooms = vec![dm("d1", "me", "me")];
        let active: HashSet<UserId> = [UserId::new("me")].into_iter().collect();
        assert!(rooms_to_reactivate(&me, &rooms, &active).is_empty());
    }

    #[test]
    fn nothing_active_nothing_selected() {
        let me = UserId::new("me");
        let rooms = vec![dm("d1", "me", "alice")];
        assert!(rooms_to_reactivate(&me, &rooms, &HashSet::new()).is_empty());
    }
}
