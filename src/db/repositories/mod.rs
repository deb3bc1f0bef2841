pub mod room;
pub mod subscription;
pub mod user;
