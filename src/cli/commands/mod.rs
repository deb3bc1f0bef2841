mod init;
mod room;
mod user;

pub use init::cmd_init;
pub use room::{cmd_room_add, cmd_room_list};
pub use user::{
    cmd_user_activate, cmd_user_add, cmd_user_deactivate, cmd_user_list, cmd_user_show,
};

use crate::db::Store;
use crate::domain::UserId;
use crate::models::user::User;

/// Looks a user up by id first, then by username.
async fn resolve_user(store: &Store, key: &str) -> anyhow::Result<User> {
    if let Some(user) = store.get_user(&UserId::new(key)).await? {
        return Ok(user);
    }

    store
        .get_user_by_username(key)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found: {key}"))
}
