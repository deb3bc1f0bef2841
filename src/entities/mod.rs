pub mod prelude;

pub mod login_tokens;
pub mod room_members;
pub mod rooms;
pub mod subscriptions;
pub mod user_emails;
pub mod user_roles;
pub mod users;
