use std::collections::HashMap;

use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::domain::{RoomId, RoomType, UserId};
use crate::entities::{prelude::*, room_members, rooms, subscriptions, users};
use crate::models::room::{DirectRoom, NewRoom, Room, SubscribedRoom};

fn parse_room_type(code: &str) -> Result<RoomType> {
    RoomType::from_code(code).ok_or_else(|| anyhow::anyhow!("Unknown room type code: {code}"))
}

fn to_room(model: rooms::Model) -> Result<Room> {
    Ok(Room {
        id: RoomId::new(model.id),
        name: model.name,
        room_type: parse_room_type(&model.room_type)?,
        read_only: model.read_only,
        react_when_read_only: model.react_when_read_only,
        open: model.open,
        served_by: model.served_by.map(UserId::new),
        closed_at: model.closed_at,
        closed_by: model.closed_by.map(UserId::new),
    })
}

pub struct RoomRepository {
    conn: DatabaseConnection,
}

impl RoomRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: &RoomId) -> Result<Option<Room>> {
        let room = Rooms::find_by_id(id.as_str())
            .one(&self.conn)
            .await
            .context("Failed to query room by ID")?;

        room.map(to_room).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<Room>> {
        let rooms = Rooms::find()
            .order_by_asc(rooms::Column::CreatedAt)
            .order_by_asc(rooms::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list rooms")?;

        rooms.into_iter().map(to_room).collect()
    }

    /// Creates a room with a membership row and a subscription for every participant.
    ///
    /// Subscriptions are inserted in participant order, which makes the first
    /// listed member the longest-standing one.
    pub async fn create(&self, input: NewRoom) -> Result<Room> {
        let id = RoomId::generate();
        let now = chrono::Utc::now().to_rfc3339();
        let participants = input.participants();

        let participant_ids: Vec<&str> = participants.iter().map(UserId::as_str).collect();
        let usernames: HashMap<String, Option<String>> = Users::find()
            .filter(users::Column::Id.is_in(participant_ids))
            .all(&self.conn)
            .await
            .context("Failed to load room participants")?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        let txn = self.conn.begin().await?;

        Rooms::insert(rooms::ActiveModel {
            id: Set(id.as_str().to_string()),
            name: Set(input.name),
            room_type: Set(input.room_type.code().to_string()),
            read_only: Set(input.read_only),
            react_when_read_only: Set(false),
            open: Set(input.room_type.is_livechat()),
            served_by: Set(input.served_by.map(UserId::into_inner)),
            closed_at: Set(None),
            closed_by: Set(None),
            created_at: Set(now.clone()),
        })
        .exec_without_returning(&txn)
        .await
        .context("Failed to insert room")?;

        for user_id in &participants {
            let username = usernames.get(user_id.as_str()).cloned().ok_or_else(|| {
                anyhow::anyhow!("Cannot add unknown user {user_id} to room {id}")
            })?;

            RoomMembers::insert(room_members::ActiveModel {
                room_id: Set(id.as_str().to_string()),
                user_id: Set(user_id.as_str().to_string()),
                ..Default::default()
            })
            .exec(&txn)
            .await?;

            Subscriptions::insert(subscriptions::ActiveModel {
                room_id: Set(id.as_str().to_string()),
                user_id: Set(user_id.as_str().to_string()),
                username: Set(username),
                is_owner: Set(input.owners.contains(user_id)),
                archived: Set(false),
                created_at: Set(now.clone()),
                ..Default::default()
            })
            .exec(&txn)
            .await?;
        }

        txn.commit().await?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created room {id}"))
    }

    /// Direct rooms that contain `user_id` and exactly one other participant slot.
    pub async fn find_direct_by_user(&self, user_id: &UserId) -> Result<Vec<DirectRoom>> {
        let room_ids: Vec<String> = RoomMembers::find()
            .filter(room_members::Column::UserId.eq(user_id.as_str()))
            .all(&self.conn)
            .await
            .context("Failed to query room memberships")?
            .into_iter()
            .map(|m| m.room_id)
            .collect();

        if room_ids.is_empty() {
            return Ok(Vec::new());
        }

        let direct = Rooms::find()
            .filter(rooms::Column::Id.is_in(room_ids))
            .filter(rooms::Column::RoomType.eq(RoomType::Direct.code()))
            .order_by_asc(rooms::Column::CreatedAt)
            .order_by_asc(rooms::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query direct rooms")?;

        if direct.is_empty() {
            return Ok(Vec::new());
        }

        let direct_ids: Vec<String> = direct.iter().map(|r| r.id.clone()).collect();
        let mut members: HashMap<String, Vec<UserId>> = HashMap::new();
        for member in RoomMembers::find()
            .filter(room_members::Column::RoomId.is_in(direct_ids))
            .order_by_asc(room_members::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to load direct room members")?
        {
            members
                .entry(member.room_id)
                .or_default()
                .push(UserId::new(member.user_id));
        }

        Ok(direct
            .into_iter()
            .filter_map(|room| {
                let uids = members.remove(&room.id).unwrap_or_default();
                (uids.len() == 2).then(|| DirectRoom {
                    id: RoomId::new(room.id),
                    uids,
                })
            })
            .collect())
    }

    /// Sets the read-only flag on the user's direct rooms.
    ///
    /// `only` restricts the update to the listed rooms; `None` targets all of them.
    pub async fn set_direct_read_only_by_user(
        &self,
        user_id: &UserId,
        only: Option<&[RoomId]>,
        read_only: bool,
        react_when_read_only: bool,
    ) -> Result<u64> {
        let mut targets: Vec<String> = self
            .find_direct_by_user(user_id)
            .await?
            .into_iter()
            .map(|r| r.id.into_inner())
            .collect();

        if let Some(only) = only {
            targets.retain(|id| only.iter().any(|o| o.as_str() == id));
        }

        if targets.is_empty() {
            return Ok(0);
        }

        let result = Rooms::update_many()
            .col_expr(rooms::Column::ReadOnly, Expr::value(read_only))
            .col_expr(
                rooms::Column::ReactWhenReadOnly,
                Expr::value(react_when_read_only),
            )
            .filter(rooms::Column::Id.is_in(targets))
            .exec(&self.conn)
            .await
            .context("Failed to update direct room read-only flag")?;

        Ok(result.rows_affected)
    }

    /// Subscriptions of the user joined with their rooms, skipping direct rooms.
    pub async fn find_subscribed_rooms(&self, user_id: &UserId) -> Result<Vec<SubscribedRoom>> {
        let rows = Subscriptions::find()
            .filter(subscriptions::Column::UserId.eq(user_id.as_str()))
            .order_by_asc(subscriptions::Column::Id)
            .find_also_related(Rooms)
            .all(&self.conn)
            .await
            .context("Failed to query subscribed rooms")?;

        let mut rooms = Vec::with_capacity(rows.len());
        for (subscription, room) in rows {
            let Some(room) = room else {
                continue;
            };
            let room_type = parse_room_type(&room.room_type)?;
            if room_type == RoomType::Direct {
                continue;
            }
            rooms.push(SubscribedRoom {
                room_id: RoomId::new(room.id),
                room_name: room.name,
                room_type,
                is_owner: subscription.is_owner,
                open: room.open,
            });
        }

        Ok(rooms)
    }

    pub async fn count_owners(&self, room_id: &RoomId) -> Result<u64> {
        Subscriptions::find()
            .filter(subscriptions::Column::RoomId.eq(room_id.as_str()))
            .filter(subscriptions::Column::IsOwner.eq(true))
            .count(&self.conn)
            .await
            .context("Failed to count room owners")
    }

    pub async fn count_members(&self, room_id: &RoomId) -> Result<u64> {
        Subscriptions::find()
            .filter(subscriptions::Column::RoomId.eq(room_id.as_str()))
            .count(&self.conn)
            .await
            .context("Failed to count room subscriptions")
    }

    /// Longest-standing member of the room other than `user_id`.
    pub async fn find_oldest_member_except(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<UserId>> {
        let subscription = Subscriptions::find()
            .filter(subscriptions::Column::RoomId.eq(room_id.as_str()))
            .filter(subscriptions::Column::UserId.ne(user_id.as_str()))
            .order_by_asc(subscriptions::Column::CreatedAt)
            .order_by_asc(subscriptions::Column::Id)
            .one(&self.conn)
            .await
            .context("Failed to query oldest room member")?;

        Ok(subscription.map(|s| UserId::new(s.user_id)))
    }

    pub async fn add_owner(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool> {
        let result = Subscriptions::update_many()
            .col_expr(subscriptions::Column::IsOwner, Expr::value(true))
            .filter(subscriptions::Column::RoomId.eq(room_id.as_str()))
            .filter(subscriptions::Column::UserId.eq(user_id.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to grant room ownership")?;

        Ok(result.rows_affected > 0)
    }

    /// Deletes rooms along with their memberships and subscriptions.
    pub async fn remove_many(&self, ids: &[RoomId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<&str> = ids.iter().map(RoomId::as_str).collect();
        let txn = self.conn.begin().await?;

        Subscriptions::delete_many()
            .filter(subscriptions::Column::RoomId.is_in(ids.clone()))
            .exec(&txn)
            .await?;

        RoomMembers::delete_many()
            .filter(room_members::Column::RoomId.is_in(ids.clone()))
            .exec(&txn)
            .await?;

        let result = Rooms::delete_many()
            .filter(rooms::Column::Id.is_in(ids))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(result.rows_affected)
    }

    /// Closes an open livechat room served by `agent`, recording the agent as closer.
    ///
    /// Returns false when the room is already closed or served by someone else.
    pub async fn close_livechat(&self, room_id: &RoomId, agent: &UserId) -> Result<bool> {
        let result = Rooms::update_many()
            .col_expr(rooms::Column::Open, Expr::value(false))
            .col_expr(
                rooms::Column::ClosedAt,
                Expr::value(Some(chrono::Utc::now().to_rfc3339())),
            )
            .col_expr(
                rooms::Column::ClosedBy,
                Expr::value(Some(agent.as_str().to_string())),
            )
            .filter(rooms::Column::Id.eq(room_id.as_str()))
            .filter(rooms::Column::ServedBy.eq(agent.as_str()))
            .filter(rooms::Column::RoomType.eq(RoomType::Livechat.code()))
            .filter(rooms::Column::Open.eq(true))
            .exec(&self.conn)
            .await
            .context("Failed to close livechat room")?;

        Ok(result.rows_affected > 0)
    }
}
