pub use super::login_tokens::Entity as LoginTokens;
pub use super::room_members::Entity as RoomMembers;
pub use super::rooms::Entity as Rooms;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::user_emails::Entity as UserEmails;
pub use super::user_roles::Entity as UserRoles;
pub use super::users::Entity as Users;
