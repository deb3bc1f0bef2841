//! Status-change email decisions.
//!
//! The dispatcher only decides whether an email is due and builds it.
//! Delivery belongs to a [`MailSender`].

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::{AccountsConfig, EmailConfig};
use crate::models::user::User;

/// Values available to email templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub active: bool,
    pub name: Option<&'a str>,
    pub username: Option<&'a str>,
}

pub trait EmailTemplates: Send + Sync {
    fn subject(&self, ctx: &TemplateContext<'_>) -> String;

    fn html(&self, ctx: &TemplateContext<'_>) -> String;
}

/// Templates read from the `[email]` config section.
#[derive(Debug, Clone)]
pub struct ConfigTemplates {
    config: EmailConfig,
}

impl ConfigTemplates {
    #[must_use]
    pub const fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn render(template: &str, ctx: &TemplateContext<'_>, escape: bool) -> String {
        let name = ctx.name.or(ctx.username).unwrap_or_default();
        let username = ctx.username.unwrap_or_default();
        if escape {
            template
                .replace("{name}", &html_escape::encode_text(name))
                .replace("{username}", &html_escape::encode_text(username))
        } else {
            template.replace("{name}", name).replace("{username}", username)
        }
    }
}

impl EmailTemplates for ConfigTemplates {
    fn subject(&self, ctx: &TemplateContext<'_>) -> String {
        let template = if ctx.active {
            &self.config.activated_subject
        } else {
            &self.config.deactivated_subject
        };
        Self::render(template, ctx, false)
    }

    fn html(&self, ctx: &TemplateContext<'_>) -> String {
        let template = if ctx.active {
            &self.config.activated_body
        } else {
            &self.config.deactivated_body
        };
        Self::render(template, ctx, true)
    }
}

/// An email the dispatcher wants sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailRequest {
    /// `Display Name<address>` entries.
    pub to: Vec<String>,
    pub from: String,
    pub subject: String,
    pub html: String,
}

impl EmailRequest {
    /// Recipients joined into a single header value.
    #[must_use]
    pub fn to_header(&self) -> String {
        self.to.join(",")
    }
}

pub struct NotificationDispatcher {
    accounts: AccountsConfig,
    templates: Box<dyn EmailTemplates>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(accounts: AccountsConfig, templates: Box<dyn EmailTemplates>) -> Self {
        Self {
            accounts,
            templates,
        }
    }

    /// Builds the status-change email for `user`, if one is due.
    #[must_use]
    pub fn decide(&self, user: &User, active: bool) -> Option<EmailRequest> {
        if !self.accounts.notify_on(active) {
            return None;
        }

        if user.emails.is_empty() {
            return None;
        }

        let display_name = user.display_name();
        let to = user
            .emails
            .iter()
            .map(|email| format!("{display_name}<{}>", email.address))
            .collect();

        let ctx = TemplateContext {
            active,
            name: user.name.as_deref(),
            username: user.username.as_deref(),
        };

        Some(EmailRequest {
            to,
            from: self.accounts.from_email.clone(),
            subject: self.templates.subject(&ctx),
            html: self.templates.html(&ctx),
        })
    }
}

/// Delivers emails. Failures are reported but never undo a transition.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, request: EmailRequest) -> anyhow::Result<()>;
}

/// Writes emails to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send(&self, request: EmailRequest) -> anyhow::Result<()> {
        info!(
            to = %request.to_header(),
            from = %request.from,
            subject = %request.subject,
            "Status-change email"
        );
        Ok(())
    }
}

/// Hands emails to an in-process outbox for a delivery worker to pick up.
pub struct OutboxMailer {
    sender: broadcast::Sender<EmailRequest>,
}

impl OutboxMailer {
    #[must_use]
    pub const fn new(sender: broadcast::Sender<EmailRequest>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl MailSender for OutboxMailer {
    async fn send(&self, request: EmailRequest) -> anyhow::Result<()> {
        self.sender
            .send(request)
            .map_err(|_| anyhow::anyhow!("No outbox worker is listening"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::models::user::UserEmail;

    fn user() -> User {
        User {
            id: UserId::new("u1"),
            username: Some("bob".to_string()),
            name: Some("Bob <B>".to_string()),
            active: true,
            emails: vec![
                UserEmail {
                    address: "bob@example.com".to_string(),
                    verified: true,
                },
                UserEmail {
                    address: "bob@work.example".to_string(),
                    verified: false,
                },
            ],
            roles: vec![],
            deactivation_reason: None,
        }
    }

    fn dispatcher(activating: bool, deactivating: bool) -> NotificationDispatcher {
        NotificationDispatcher::new(
            AccountsConfig {
                send_email_when_activating: activating,
                send_email_when_deactivating: deactivating,
                from_email: "admin@example.com".to_string(),
            },
            Box::new(ConfigTemplates::new(EmailConfig::default())),
        )
    }

    #[test]
    fn disabled_direction_issues_nothing() {
        let d = dispatcher(true, false);
        assert!(d.decide(&user(), false).is_none());
        assert!(d.decide(&user(), true).is_some());

        let d = dispatcher(false, true);
        assert!(d.decide(&user(), true).is_none());
        assert!(d.decide(&user(), false).is_some());
    }

    #[test]
    fn request_addresses_every_email() {
        let request = dispatcher(true, true).decide(&user(), false).unwrap();
        assert_eq!(
            request.to,
            vec![
                "Bob <B><bob@example.com>".to_string(),
                "Bob <B><bob@work.example>".to_string()
            ]
        );
        assert_eq!(
            request.to_header(),
            "Bob <B><bob@example.com>,Bob <B><bob@work.example>"
        );
        assert_eq!(request.from, "admin@example.com");
        assert_eq!(request.subject, "Account deactivated");
    }

    #[test]
    fn body_escapes_substituted_values() {
        let request = dispatcher(true, true).decide(&user(), true).unwrap();
        assert!(request.html.contains("Hello Bob &lt;B&gt;,"));
        assert!(request.html.contains("<strong>bob</strong> was activated"));
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut u = user();
        u.name = None;
        let request = dispatcher(true, true).decide(&u, true).unwrap();
        assert_eq!(request.to[0], "bob<bob@example.com>");
        assert!(request.html.contains("Hello bob,"));
    }

    #[test]
    fn no_addresses_no_request() {
        let mut u = user();
        u.emails.clear();
        assert!(dispatcher(true, true).decide(&u, true).is_none());
    }

    #[tokio::test]
    async fn outbox_mailer_needs_a_listener() {
        let (tx, mut rx) = broadcast::channel(4);
        let mailer = OutboxMailer::new(tx);
        let request = dispatcher(true, true).decide(&user(), true).unwrap();

        mailer.send(request.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), request);

        drop(rx);
        assert!(mailer.send(request).await.is_err());
    }
}
