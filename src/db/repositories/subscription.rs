use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::domain::{RoomId, UserId};
use crate::entities::{prelude::*, subscriptions};
use crate::models::room::Subscription;

impl From<subscriptions::Model> for Subscription {
    fn from(model: subscriptions::Model) -> Self {
        Self {
            room_id: RoomId::new(model.room_id),
            user_id: UserId::new(model.user_id),
            username: model.username,
            is_owner: model.is_owner,
            archived: model.archived,
        }
    }
}

pub struct SubscriptionRepository {
    conn: DatabaseConnection,
}

impl SubscriptionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        let rows = Subscriptions::find()
            .filter(subscriptions::Column::UserId.eq(user_id.as_str()))
            .order_by_asc(subscriptions::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query subscriptions for user")?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    pub async fn get(&self, room_id: &RoomId, user_id: &UserId) -> Result<Option<Subscription>> {
        let row = Subscriptions::find()
            .filter(subscriptions::Column::RoomId.eq(room_id.as_str()))
            .filter(subscriptions::Column::UserId.eq(user_id.as_str()))
            .one(&self.conn)
            .await
            .context("Failed to query subscription")?;

        Ok(row.map(Subscription::from))
    }

    /// Sets `archived` on every subscription held under `username`.
    pub async fn set_archived_by_username(&self, username: &str, archived: bool) -> Result<u64> {
        let result = Subscriptions::update_many()
            .col_expr(subscriptions::Column::Archived, Expr::value(archived))
            .filter(subscriptions::Column::Username.eq(username))
            .exec(&self.conn)
            .await
            .context("Failed to update subscription archived flag")?;

        Ok(result.rows_affected)
    }
}
