use serde::{Deserialize, Serialize};

use crate::domain::{RoomId, RoomType, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: Option<String>,
    pub room_type: RoomType,
    pub read_only: bool,
    pub react_when_read_only: bool,
    pub open: bool,
    pub served_by: Option<UserId>,
    pub closed_at: Option<String>,
    pub closed_by: Option<UserId>,
}

/// Projection of a direct conversation: its id and its two participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectRoom {
    pub id: RoomId,
    pub uids: Vec<UserId>,
}

impl DirectRoom {
    /// Returns the participant that is not `user_id`, if any.
    #[must_use]
    pub fn other_participant(&self, user_id: &UserId) -> Option<&UserId> {
        self.uids.iter().find(|u| *u != user_id)
    }
}

/// A user's subscription joined with the room it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribedRoom {
    pub room_id: RoomId,
    pub room_name: Option<String>,
    pub room_type: RoomType,
    pub is_owner: bool,
    pub open: bool,
}

/// One (user, room) membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub is_owner: bool,
    pub archived: bool,
}

/// Input for creating a room.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: Option<String>,
    pub room_type: RoomType,
    pub owners: Vec<UserId>,
    pub members: Vec<UserId>,
    pub read_only: bool,
    pub served_by: Option<UserId>,
}

impl NewRoom {
    #[must_use]
    pub fn new(name: Option<&str>, room_type: RoomType) -> Self {
        Self {
            name: name.map(str::to_string),
            room_type,
            owners: Vec::new(),
            members: Vec::new(),
            read_only: false,
            served_by: None,
        }
    }

    #[must_use]
    pub fn owner(mut self, user_id: &UserId) -> Self {
        self.owners.push(user_id.clone());
        self
    }

    #[must_use]
    pub fn member(mut self, user_id: &UserId) -> Self {
        self.members.push(user_id.clone());
        self
    }

    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn served_by(mut self, user_id: &UserId) -> Self {
        self.served_by = Some(user_id.clone());
        self
    }

    /// Owners first, then plain members, without duplicates.
    #[must_use]
    pub fn participants(&self) -> Vec<UserId> {
        let mut all: Vec<UserId> = Vec::with_capacity(self.owners.len() + self.members.len());
        for id in self.owners.iter().chain(&self.members) {
            if !all.contains(id) {
                all.push(id.clone());
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_participant_skips_self() {
        let room = DirectRoom {
            id: RoomId::new("d1"),
            uids: vec![UserId::new("a"), UserId::new("b")],
        };
        assert_eq!(room.other_participant(&UserId::new("a")), Some(&UserId::new("b")));
        assert_eq!(room.other_participant(&UserId::new("b")), Some(&UserId::new("a")));
    }

    #[test]
    fn self_conversation_has_no_other_participant() {
        let room = DirectRoom {
            id: RoomId::new("d1"),
            uids: vec![UserId::new("a"), UserId::new("a")],
        };
        assert_eq!(room.other_participant(&UserId::new("a")), None);
    }

    #[test]
    fn participants_are_deduplicated() {
        let a = UserId::new("a");
        let b = UserId::new("b");
        let room = NewRoom::new(Some("general"), RoomType::Channel)
            .owner(&a)
            .member(&a)
            .member(&b);
        assert_eq!(room.participants(), vec![a, b]);
    }
}
