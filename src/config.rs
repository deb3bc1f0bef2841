use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub accounts: AccountsConfig,

    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,

    /// Broadcast buffer for account events (default: 100)
    pub event_bus_buffer_size: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/warden.db".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
            event_bus_buffer_size: 100,
        }
    }
}

/// Account status-change notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub send_email_when_activating: bool,

    pub send_email_when_deactivating: bool,

    /// Sender address of status-change emails.
    pub from_email: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            send_email_when_activating: true,
            send_email_when_deactivating: true,
            from_email: "no-reply@localhost".to_string(),
        }
    }
}

impl AccountsConfig {
    #[must_use]
    pub const fn notify_on(&self, active: bool) -> bool {
        if active {
            self.send_email_when_activating
        } else {
            self.send_email_when_deactivating
        }
    }
}

/// Status-change email templates.
///
/// `{name}` and `{username}` are substituted; values are HTML-escaped in bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub activated_subject: String,

    pub deactivated_subject: String,

    pub activated_body: String,

    pub deactivated_body: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            activated_subject: "Account activated".to_string(),
            deactivated_subject: "Account deactivated".to_string(),
            activated_body:
                "<p>Hello {name},</p><p>Your account <strong>{username}</strong> was activated.</p>"
                    .to_string(),
            deactivated_body:
                "<p>Hello {name},</p><p>Your account <strong>{username}</strong> was deactivated.</p>"
                    .to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("warden").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".warden").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_path.is_empty() {
            anyhow::bail!("Database path cannot be empty");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("min_db_connections cannot exceed max_db_connections");
        }

        if (self.accounts.send_email_when_activating || self.accounts.send_email_when_deactivating)
            && !self.accounts.from_email.contains('@')
        {
            anyhow::bail!(
                "accounts.from_email must be an email address when status emails are enabled"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.accounts.send_email_when_activating);
        assert!(config.accounts.send_email_when_deactivating);
        assert_eq!(config.general.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[accounts]"));
        assert!(toml_str.contains("[email]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [accounts]
            send_email_when_deactivating = false
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert!(!config.accounts.send_email_when_deactivating);

        assert!(config.accounts.send_email_when_activating);
        assert_eq!(config.email.activated_subject, "Account activated");
    }

    #[test]
    fn notify_on_follows_direction() {
        let accounts = AccountsConfig {
            send_email_when_activating: true,
            send_email_when_deactivating: false,
            ..AccountsConfig::default()
        };
        assert!(accounts.notify_on(true));
        assert!(!accounts.notify_on(false));
    }

    #[test]
    fn validate_rejects_bad_sender() {
        let mut config = Config::default();
        config.accounts.from_email = "nobody".to_string();
        assert!(config.validate().is_err());

        config.accounts.send_email_when_activating = false;
        config.accounts.send_email_when_deactivating = false;
        assert!(config.validate().is_ok());
    }
}
