//! agenda CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use agenda_cli::cli::{Cli, Command, ConfigAction};
use agenda_cli::commands;
use agenda_cli::config::ClientConfig;
use agenda_cli::context::{self, AppContext};
use agenda_cli::error::ClientResult;
use agenda_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tracing_config = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        // Already reported by the session-expired notice.
        Err(e) if e.is_auth_failure() => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ClientConfig) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);

    let command = match cli.command {
        Command::Config { action } => {
            return match action {
                ConfigAction::Dump => commands::config::dump(&config_path, &config),
                ConfigAction::Path => commands::config::path(&config_path, &config),
            };
        }
        Command::Logout => {
            // Must work even when the OAuth client cannot be resolved.
            let session = context::logout_session(&config);
            return commands::auth::logout(&session).await;
        }
        command => command,
    };

    let ctx = AppContext::build(&config)?;
    let _expiry = ctx.session.subscribe_expired(|| {
        eprintln!("Session expired: please sign in again with `agenda login`.");
    });

    match command {
        Command::Login { refresh_token } => commands::auth::login(&ctx, &refresh_token).await,
        Command::Status => commands::auth::status(&ctx, cli.json).await,
        Command::Whoami => commands::auth::whoami(&ctx, cli.json).await,
        Command::Events => commands::events::upcoming(&ctx, cli.json).await,
        Command::Day { date } => commands::events::day(&ctx, date.as_deref(), cli.json).await,
        Command::Create(event) => commands::events::create(&ctx, &event, cli.json).await,
        Command::Update { event_id, event } => {
            commands::events::update(&ctx, &event_id, &event, cli.json).await
        }
        Command::Delete { event_id } => commands::events::delete(&ctx, &event_id).await,
        // Handled before the session is built.
        Command::Config { .. } | Command::Logout => Ok(()),
    }
}
