pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod services;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, RoomCommands, UserCommands};
pub use config::Config;
use db::Store;
use domain::events::AccountEvent;
use services::{
    BroadcastHook, ConfigTemplates, DefaultUserStatusService, HookRegistry, LogMailer,
    NotificationDispatcher,
};

/// Status service wired to `store`, publishing hook events on the returned channel.
pub async fn build_status_service(
    config: &Config,
    store: Store,
) -> (DefaultUserStatusService, broadcast::Receiver<AccountEvent>) {
    let (tx, rx) = broadcast::channel(config.general.event_bus_buffer_size.max(1));

    let hooks = Arc::new(HookRegistry::new());
    BroadcastHook::new(tx).attach(&hooks).await;

    let dispatcher = NotificationDispatcher::new(
        config.accounts.clone(),
        Box::new(ConfigTemplates::new(config.email.clone())),
    );

    let service =
        DefaultUserStatusService::with_store(store, hooks, dispatcher, Arc::new(LogMailer));
    (service, rx)
}

pub async fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await
    .with_context(|| format!("Failed to open database {}", config.general.database_path))
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&config);
    config.validate()?;

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Init => cli::cmd_init(),
        Commands::User { command } => match command {
            UserCommands::Add {
                username,
                name,
                email,
                role,
                inactive,
            } => cli::cmd_user_add(&config, username, name, email, role, inactive).await,
            UserCommands::List => cli::cmd_user_list(&config).await,
            UserCommands::Show { user, json } => cli::cmd_user_show(&config, &user, json).await,
            UserCommands::Activate { user } => cli::cmd_user_activate(&config, &user).await,
            UserCommands::Deactivate {
                user,
                confirm_relinquish,
                reason,
            } => {
                cli::cmd_user_deactivate(&config, &user, confirm_relinquish, reason.as_deref())
                    .await
            }
        },
        Commands::Room { command } => match command {
            RoomCommands::Add {
                name,
                room_type,
                owner,
                member,
                agent,
            } => cli::cmd_room_add(&config, name, room_type, owner, member, agent).await,
            RoomCommands::List => cli::cmd_room_list(&config).await,
        },
    }
}
