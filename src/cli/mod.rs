//! CLI module - Command-line interface for Warden
//!
//! Accounts and rooms can be seeded and inspected from here, and status
//! transitions run through the same service the library exposes.

mod commands;

use clap::{Parser, Subcommand};

use crate::domain::RoomType;

/// Warden - account activation and deactivation for chat workspaces
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a default config.toml in the current directory
    Init,

    /// Manage user accounts
    #[command(alias = "u")]
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage rooms
    #[command(alias = "r")]
    Room {
        #[command(subcommand)]
        command: RoomCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user
    Add {
        /// Login name (omit for accounts without one)
        #[arg(long)]
        username: Option<String>,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Email address (repeatable)
        #[arg(long)]
        email: Vec<String>,
        /// Role (repeatable), e.g. admin
        #[arg(long)]
        role: Vec<String>,
        /// Create the account deactivated
        #[arg(long)]
        inactive: bool,
    },

    /// List all users
    #[command(alias = "ls")]
    List,

    /// Show a user and their subscriptions
    Show {
        /// User id or username
        user: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Activate a user
    Activate {
        /// User id or username
        user: String,
    },

    /// Deactivate a user
    Deactivate {
        /// User id or username
        user: String,
        /// Hand over or remove rooms the user owns alone
        #[arg(long)]
        confirm_relinquish: bool,
        /// Reason stored on the account
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RoomCommands {
    /// Create a room
    Add {
        /// Room name
        #[arg(long)]
        name: Option<String>,
        /// Room type: c, p, d, l (or channel, private, direct, livechat)
        #[arg(long = "type", default_value = "c")]
        room_type: RoomType,
        /// Owner user id or username (repeatable)
        #[arg(long)]
        owner: Vec<String>,
        /// Member user id or username (repeatable)
        #[arg(long)]
        member: Vec<String>,
        /// Serving agent for livechat rooms
        #[arg(long)]
        agent: Option<String>,
    },

    /// List all rooms
    #[command(alias = "ls")]
    List,
}

pub use commands::*;
