//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// agenda - Google Calendar from the terminal
#[derive(Debug, Parser)]
#[command(name = "agenda")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "AGENDA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with a Google refresh token
    Login {
        /// Refresh token from the Google consent flow
        #[arg(long, env = "AGENDA_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show whether a session is stored
    Status,

    /// Show the signed-in user
    Whoami,

    /// List upcoming events
    Events,

    /// List the events of one day, holidays included
    Day {
        /// Date as YYYY-MM-DD (today when omitted)
        date: Option<String>,
    },

    /// Create an event
    Create(EventArgs),

    /// Replace an event's title, times, description and location
    Update {
        /// Event ID, as shown by `agenda day`
        event_id: String,

        #[command(flatten)]
        event: EventArgs,
    },

    /// Delete an event
    Delete {
        /// Event ID, as shown by `agenda day`
        event_id: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Event fields, as entered in the event form.
#[derive(Debug, Clone, Args)]
pub struct EventArgs {
    /// Event title
    #[arg(long)]
    pub title: String,

    /// Date as YYYY-MM-DD
    #[arg(long)]
    pub date: String,

    /// Start time as HH:MM
    #[arg(long)]
    pub start: String,

    /// End time as HH:MM
    #[arg(long)]
    pub end: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "")]
    pub location: String,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}
