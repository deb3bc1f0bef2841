use tokio::sync::broadcast;

use crate::build_status_service;
use crate::config::Config;
use crate::domain::events::AccountEvent;
use crate::models::user::NewUser;
use crate::open_store;
use crate::services::{StatusError, StatusOutcome, UserStatusService};

use super::resolve_user;

pub async fn cmd_user_add(
    config: &Config,
    username: Option<String>,
    name: Option<String>,
    emails: Vec<String>,
    roles: Vec<String>,
    inactive: bool,
) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let user = store
        .create_user(NewUser {
            username,
            name,
            active: !inactive,
            emails,
            roles,
        })
        .await?;

    println!(
        "Created user {} ({})",
        user.display_name(),
        if user.active { "active" } else { "inactive" }
    );
    println!("  ID: {}", user.id);
    Ok(())
}

pub async fn cmd_user_list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let users = store.list_users().await?;

    if users.is_empty() {
        println!("No users.");
        println!();
        println!("Add one with: warden user add --username alice --email alice@example.com");
        return Ok(());
    }

    println!("Users ({} total)", users.len());
    println!("{:-<70}", "");

    for user in users {
        let indicator = if user.active { "●" } else { "○" };
        println!(
            "{} {} {}",
            indicator,
            user.username.as_deref().unwrap_or("(no username)"),
            user.name
                .as_deref()
                .map(|n| format!("- {n}"))
                .unwrap_or_default()
        );
        println!(
            "  ID: {} | Roles: {} | Emails: {}",
            user.id,
            if user.roles.is_empty() {
                "-".to_string()
            } else {
                user.roles.join(",")
            },
            user.emails.len()
        );
    }

    println!();
    println!("Legend: ● Active | ○ Inactive");

    Ok(())
}

pub async fn cmd_user_show(config: &Config, key: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let user = resolve_user(&store, key).await?;
    let subscriptions = store.get_subscriptions_for_user(&user.id).await?;
    let tokens = store.count_login_tokens(&user.id).await?;

    if json {
        let value = serde_json::json!({
            "user": user,
            "subscriptions": subscriptions,
            "login_tokens": tokens,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", user.display_name());
    println!("{:-<70}", "");
    println!("ID:         {}", user.id);
    println!("Username:   {}", user.username.as_deref().unwrap_or("-"));
    println!("Active:     {}", user.active);
    println!("Roles:      {}", user.roles.join(", "));
    for email in &user.emails {
        println!(
            "Email:      {}{}",
            email.address,
            if email.verified { " (verified)" } else { "" }
        );
    }
    if let Some(reason) = &user.deactivation_reason {
        println!("Reason:     {reason}");
    }
    println!("Sessions:   {tokens}");

    if !subscriptions.is_empty() {
        println!();
        println!("Subscriptions:");
        for sub in subscriptions {
            println!(
                "  {} {}{}",
                sub.room_id,
                if sub.is_owner { "[owner]" } else { "" },
                if sub.archived { " [archived]" } else { "" }
            );
        }
    }

    Ok(())
}

pub async fn cmd_user_activate(config: &Config, key: &str) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let user = resolve_user(&store, key).await?;
    let (service, mut events) = build_status_service(config, store).await;

    let outcome = service.transition_user_status(&user.id, true, false).await?;
    print_outcome(user.display_name(), true, outcome);
    print_events(&mut events);
    Ok(())
}

pub async fn cmd_user_deactivate(
    config: &Config,
    key: &str,
    confirm_relinquish: bool,
    reason: Option<&str>,
) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let user = resolve_user(&store, key).await?;
    let (service, mut events) = build_status_service(config, store).await;

    let result = match reason {
        Some(reason) => {
            service
                .deactivate_with_reason(&user.id, reason, confirm_relinquish)
                .await
        }
        None => {
            service
                .transition_user_status(&user.id, false, confirm_relinquish)
                .await
        }
    };

    match result {
        Ok(outcome) => {
            print_outcome(user.display_name(), false, outcome);
            print_events(&mut events);
            Ok(())
        }
        Err(e @ StatusError::LastOwner(_)) => {
            println!("Cannot deactivate {}: {e}", user.display_name());
            println!("{:-<70}", "");
            for room in e.blocking_rooms() {
                let action = serde_json::to_value(room.action)?;
                println!(
                    "  {} [{}] {} -> {}",
                    room.room_id,
                    room.room_type,
                    room.room_name.as_deref().unwrap_or("(unnamed)"),
                    action.as_str().unwrap_or_default()
                );
            }
            println!();
            println!("Re-run with --confirm-relinquish to hand these rooms over.");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_outcome(name: &str, active: bool, outcome: StatusOutcome) {
    let verb = if active { "Activated" } else { "Deactivated" };
    match outcome {
        StatusOutcome::NotFound => println!("User not found."),
        StatusOutcome::Transitioned { notified: true } => {
            println!("{verb} {name} (notification sent)");
        }
        StatusOutcome::Transitioned { notified: false } => println!("{verb} {name}"),
    }
}

fn print_events(events: &mut broadcast::Receiver<AccountEvent>) {
    while let Ok(event) = events.try_recv() {
        if let Ok(line) = serde_json::to_string(&event) {
            println!("  event: {line}");
        }
    }
}
