//! Domain primitives for accounts and rooms.
//!
//! Ids are opaque strings in storage. The newtypes below keep user ids and
//! room ids from being mixed up in gateway calls.

pub mod events;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role name granting administrative rights.
pub const ADMIN_ROLE: &str = "admin";

/// Unique identifier for a user.
///
/// # Examples
///
/// ```rust
/// use warden::domain::UserId;
///
/// let id = UserId::new("u1");
/// assert_eq!(id.as_str(), "u1");
/// assert_eq!(id.to_string(), "u1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Unique identifier for a room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Kind of conversation a room holds.
///
/// Stored as the single-letter codes `c`, `p`, `d` and `l`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    /// Public channel.
    Channel,
    /// Private group.
    Private,
    /// Two-party direct conversation.
    Direct,
    /// Omnichannel conversation served by an agent.
    Livechat,
}

impl RoomType {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Channel => "c",
            Self::Private => "p",
            Self::Direct => "d",
            Self::Livechat => "l",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(Self::Channel),
            "p" => Some(Self::Private),
            "d" => Some(Self::Direct),
            "l" => Some(Self::Livechat),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_livechat(&self) -> bool {
        matches!(self, Self::Livechat)
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Channel => "channel",
            Self::Private => "private",
            Self::Direct => "direct",
            Self::Livechat => "livechat",
        };
        f.write_str(name)
    }
}

impl FromStr for RoomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" | "channel" => Ok(Self::Channel),
            "p" | "private" => Ok(Self::Private),
            "d" | "direct" => Ok(Self::Direct),
            "l" | "livechat" => Ok(Self::Livechat),
            other => Err(format!("Unknown room type: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_conversions() {
        let id = UserId::new("abc");
        assert_eq!(id.as_str(), "abc");
        assert_eq!(id.to_string(), "abc");
        assert_eq!(UserId::from("abc"), id);
        assert_eq!(id.into_inner(), "abc".to_string());
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(UserId::generate(), UserId::generate());
        assert_ne!(RoomId::generate(), RoomId::generate());
    }

    #[test]
    fn room_type_codes() {
        for t in [
            RoomType::Channel,
            RoomType::Private,
            RoomType::Direct,
            RoomType::Livechat,
        ] {
            assert_eq!(RoomType::from_code(t.code()), Some(t));
        }
        assert_eq!(RoomType::from_code("x"), None);
        assert!(RoomType::Livechat.is_livechat());
        assert!(!RoomType::Direct.is_livechat());
    }

    #[test]
    fn room_type_parses_names_and_codes() {
        assert_eq!("direct".parse::<RoomType>(), Ok(RoomType::Direct));
        assert_eq!("P".parse::<RoomType>(), Ok(RoomType::Private));
        assert!("team".parse::<RoomType>().is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = RoomId::new("r1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"r1\"");
        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
