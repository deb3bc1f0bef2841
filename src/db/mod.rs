use crate::domain::{RoomId, UserId};
use crate::models::room::{DirectRoom, NewRoom, Room, SubscribedRoom, Subscription};
use crate::models::user::{NewUser, User};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");
        // Every pooled connection to an in-memory SQLite database sees its own database.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn room_repo(&self) -> repositories::room::RoomRepository {
        repositories::room::RoomRepository::new(self.conn.clone())
    }

    fn subscription_repo(&self) -> repositories::subscription::SubscriptionRepository {
        repositories::subscription::SubscriptionRepository::new(self.conn.clone())
    }

    // Users

    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        self.user_repo().create(user).await
    }

    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list_all().await
    }

    pub async fn find_user_in_role(&self, id: &UserId, role: &str) -> Result<Option<User>> {
        self.user_repo().find_in_role_by_id(id, role).await
    }

    pub async fn count_active_users_in_role(&self, role: &str) -> Result<u64> {
        self.user_repo().count_active_in_role(role).await
    }

    pub async fn set_user_active(&self, id: &UserId, active: bool) -> Result<bool> {
        self.user_repo().set_active(id, active).await
    }

    pub async fn set_user_deactivation_reason(
        &self,
        id: &UserId,
        reason: Option<&str>,
    ) -> Result<()> {
        self.user_repo().set_deactivation_reason(id, reason).await
    }

    pub async fn find_active_user_ids(&self, ids: &[UserId]) -> Result<Vec<UserId>> {
        self.user_repo().find_active_ids(ids).await
    }

    pub async fn add_login_token(&self, id: &UserId, hashed_token: &str) -> Result<()> {
        self.user_repo().add_login_token(id, hashed_token).await
    }

    pub async fn count_login_tokens(&self, id: &UserId) -> Result<u64> {
        self.user_repo().count_login_tokens(id).await
    }

    pub async fn remove_login_tokens(&self, id: &UserId) -> Result<u64> {
        self.user_repo().remove_login_tokens(id).await
    }

    // Rooms

    pub async fn create_room(&self, room: NewRoom) -> Result<Room> {
        self.room_repo().create(room).await
    }

    pub async fn get_room(&self, id: &RoomId) -> Result<Option<Room>> {
        self.room_repo().get(id).await
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.room_repo().list_all().await
    }

    pub async fn get_direct_rooms_for_user(&self, user_id: &UserId) -> Result<Vec<DirectRoom>> {
        self.room_repo().find_direct_by_user(user_id).await
    }

    pub async fn set_direct_read_only_for_user(
        &self,
        user_id: &UserId,
        only: Option<&[RoomId]>,
        read_only: bool,
        react_when_read_only: bool,
    ) -> Result<u64> {
        self.room_repo()
            .set_direct_read_only_by_user(user_id, only, read_only, react_when_read_only)
            .await
    }

    pub async fn get_subscribed_rooms(&self, user_id: &UserId) -> Result<Vec<SubscribedRoom>> {
        self.room_repo().find_subscribed_rooms(user_id).await
    }

    pub async fn count_room_owners(&self, room_id: &RoomId) -> Result<u64> {
        self.room_repo().count_owners(room_id).await
    }

    pub async fn count_room_members(&self, room_id: &RoomId) -> Result<u64> {
        self.room_repo().count_members(room_id).await
    }

    pub async fn get_oldest_member_except(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<UserId>> {
        self.room_repo()
            .find_oldest_member_except(room_id, user_id)
            .await
    }

    pub async fn add_room_owner(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool> {
        self.room_repo().add_owner(room_id, user_id).await
    }

    pub async fn remove_rooms(&self, ids: &[RoomId]) -> Result<u64> {
        self.room_repo().remove_many(ids).await
    }

    pub async fn close_livechat_room(&self, room_id: &RoomId, agent: &UserId) -> Result<bool> {
        self.room_repo().close_livechat(room_id, agent).await
    }

    // Subscriptions

    pub async fn get_subscription(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<Subscription>> {
        self.subscription_repo().get(room_id, user_id).await
    }

    pub async fn get_subscriptions_for_user(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        self.subscription_repo().list_for_user(user_id).await
    }

    pub async fn set_subscriptions_archived(&self, username: &str, archived: bool) -> Result<u64> {
        self.subscription_repo()
            .set_archived_by_username(username, archived)
            .await
    }
}
