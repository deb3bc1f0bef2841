use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};

use crate::domain::UserId;
use crate::entities::{login_tokens, prelude::*, user_emails, user_roles, users};
use crate::models::user::{NewUser, User, UserEmail};

fn to_user(
    model: users::Model,
    emails: Vec<user_emails::Model>,
    roles: Vec<user_roles::Model>,
) -> User {
    User {
        id: UserId::new(model.id),
        username: model.username,
        name: model.name,
        active: model.active,
        emails: emails
            .into_iter()
            .map(|e| UserEmail {
                address: e.address,
                verified: e.verified,
            })
            .collect(),
        roles: roles.into_iter().map(|r| r.role).collect(),
        deactivation_reason: model.deactivation_reason,
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn hydrate(&self, models: Vec<users::Model>) -> Result<Vec<User>> {
        let emails = models
            .load_many(UserEmails, &self.conn)
            .await
            .context("Failed to load user emails")?;
        let roles = models
            .load_many(UserRoles, &self.conn)
            .await
            .context("Failed to load user roles")?;

        Ok(models
            .into_iter()
            .zip(emails)
            .zip(roles)
            .map(|((model, emails), roles)| to_user(model, emails, roles))
            .collect())
    }

    /// Get user by ID, with emails and roles
    pub async fn get_by_id(&self, id: &UserId) -> Result<Option<User>> {
        let user = Users::find_by_id(id.as_str())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        let Some(user) = user else {
            return Ok(None);
        };

        Ok(self.hydrate(vec![user]).await?.pop())
    }

    /// Get user by username, with emails and roles
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        let Some(user) = user else {
            return Ok(None);
        };

        Ok(self.hydrate(vec![user]).await?.pop())
    }

    pub async fn list_all(&self) -> Result<Vec<User>> {
        let models = Users::find()
            .order_by_asc(users::Column::CreatedAt)
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        self.hydrate(models).await
    }

    pub async fn create(&self, input: NewUser) -> Result<User> {
        let id = UserId::generate();
        let now = chrono::Utc::now().to_rfc3339();
        let txn = self.conn.begin().await?;

        Users::insert(users::ActiveModel {
            id: Set(id.as_str().to_string()),
            username: Set(input.username),
            name: Set(input.name),
            active: Set(input.active),
            deactivation_reason: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        })
        .exec_without_returning(&txn)
        .await
        .context("Failed to insert user")?;

        if !input.emails.is_empty() {
            let emails: Vec<user_emails::ActiveModel> = input
                .emails
                .into_iter()
                .map(|address| user_emails::ActiveModel {
                    user_id: Set(id.as_str().to_string()),
                    address: Set(address),
                    verified: Set(false),
                    ..Default::default()
                })
                .collect();
            UserEmails::insert_many(emails).exec(&txn).await?;
        }

        let mut roles = input.roles;
        roles.sort();
        roles.dedup();
        if !roles.is_empty() {
            let roles: Vec<user_roles::ActiveModel> = roles
                .into_iter()
                .map(|role| user_roles::ActiveModel {
                    user_id: Set(id.as_str().to_string()),
                    role: Set(role),
                    ..Default::default()
                })
                .collect();
            UserRoles::insert_many(roles).exec(&txn).await?;
        }

        txn.commit().await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created user {id}"))
    }

    /// Returns the user only if it holds the `role` role.
    pub async fn find_in_role_by_id(&self, id: &UserId, role: &str) -> Result<Option<User>> {
        let has_role = UserRoles::find()
            .filter(user_roles::Column::UserId.eq(id.as_str()))
            .filter(user_roles::Column::Role.eq(role))
            .count(&self.conn)
            .await
            .context("Failed to query user roles")?
            > 0;

        if !has_role {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    pub async fn count_active_in_role(&self, role: &str) -> Result<u64> {
        UserRoles::find()
            .join(JoinType::InnerJoin, user_roles::Relation::User.def())
            .filter(user_roles::Column::Role.eq(role))
            .filter(users::Column::Active.eq(true))
            .count(&self.conn)
            .await
            .context("Failed to count active users in role")
    }

    pub async fn set_active(&self, id: &UserId, active: bool) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(users::Column::Active, Expr::value(active))
            .col_expr(
                users::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(users::Column::Id.eq(id.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to update user active flag")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn set_deactivation_reason(&self, id: &UserId, reason: Option<&str>) -> Result<()> {
        Users::update_many()
            .col_expr(
                users::Column::DeactivationReason,
                Expr::value(reason.map(str::to_string)),
            )
            .filter(users::Column::Id.eq(id.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to update deactivation reason")?;

        Ok(())
    }

    /// Returns the subset of `ids` that belong to active users.
    pub async fn find_active_ids(&self, ids: &[UserId]) -> Result<Vec<UserId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = ids.iter().map(UserId::as_str).collect();
        let rows: Vec<String> = Users::find()
            .select_only()
            .column(users::Column::Id)
            .filter(users::Column::Id.is_in(ids))
            .filter(users::Column::Active.eq(true))
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query active users")?;

        Ok(rows.into_iter().map(UserId::new).collect())
    }

    pub async fn add_login_token(&self, id: &UserId, hashed_token: &str) -> Result<()> {
        LoginTokens::insert(login_tokens::ActiveModel {
            user_id: Set(id.as_str().to_string()),
            hashed_token: Set(hashed_token.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        })
        .exec(&self.conn)
        .await
        .context("Failed to insert login token")?;

        Ok(())
    }

    pub async fn count_login_tokens(&self, id: &UserId) -> Result<u64> {
        LoginTokens::find()
            .filter(login_tokens::Column::UserId.eq(id.as_str()))
            .count(&self.conn)
            .await
            .context("Failed to count login tokens")
    }

    /// Deletes every login token of the user, returning how many were removed.
    pub async fn remove_login_tokens(&self, id: &UserId) -> Result<u64> {
        let result = LoginTokens::delete_many()
            .filter(login_tokens::Column::UserId.eq(id.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to delete login tokens")?;

        Ok(result.rows_affected)
    }
}
