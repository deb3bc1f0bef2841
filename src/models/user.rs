use serde::{Deserialize, Serialize};

use crate::domain::{ADMIN_ROLE, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEmail {
    pub address: String,
    #[serde(default)]
    pub verified: bool,
}

/// Snapshot of a user record as loaded at the start of a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Option<String>,
    pub name: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub emails: Vec<UserEmail>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub deactivation_reason: Option<String>,
}

impl User {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Name shown next to the user's address in outgoing mail.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref())
            .unwrap_or_default()
    }
}

/// Input for creating a user through the CLI or test fixtures.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: Option<String>,
    pub name: Option<String>,
    pub active: bool,
    pub emails: Vec<String>,
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>, name: Option<&str>) -> User {
        User {
            id: UserId::new("u1"),
            username: username.map(str::to_string),
            name: name.map(str::to_string),
            active: true,
            emails: vec![],
            roles: vec!["user".to_string()],
            deactivation_reason: None,
        }
    }

    #[test]
    fn display_name_prefers_name() {
        assert_eq!(user(Some("bob"), Some("Bob Smith")).display_name(), "Bob Smith");
        assert_eq!(user(Some("bob"), Some("")).display_name(), "bob");
        assert_eq!(user(Some("bob"), None).display_name(), "bob");
        assert_eq!(user(None, None).display_name(), "");
    }

    #[test]
    fn admin_role_detection() {
        let mut u = user(Some("alice"), None);
        assert!(!u.is_admin());
        u.roles.push(ADMIN_ROLE.to_string());
        assert!(u.is_admin());
    }
}
