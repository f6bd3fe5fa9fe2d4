// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Echotune - a multi-tenant voice-chat music player.
//!
//! This is the binary entry point. The chat-platform client and the native
//! call engine are linked in by the deployment; see `serve` for the wiring
//! surface they drive.

use clap::{Parser, Subcommand};
use echotune::serve;
use tracing_subscriber::EnvFilter;

/// Echotune - a multi-tenant voice-chat music player.
#[derive(Parser, Debug)]
#[command(name = "echotune", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the player service.
    Serve,
    /// Validate and print the resolved configuration.
    Config,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("echotune={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match echotune_config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    init_tracing(&config.bot.log_level);

    match cli.command {
        Commands::Serve => {
            if let Err(errors) = echotune_config::validation::validate(&config) {
                for error in &errors {
                    eprintln!("config: {error}");
                }
                return std::process::ExitCode::FAILURE;
            }
            match serve::serve(config).await {
                Ok(()) => std::process::ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("serve failed: {e}");
                    std::process::ExitCode::FAILURE
                }
            }
        }
        Commands::Config => {
            match render_config(&config) {
                Ok(rendered) => {
                    println!("{rendered}");
                    if let Err(errors) = echotune_config::validation::validate(&config) {
                        for error in &errors {
                            eprintln!("warning: {error}");
                        }
                    }
                    std::process::ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("failed to render config: {e}");
                    std::process::ExitCode::FAILURE
                }
            }
        }
    }
}

fn render_config(
    config: &echotune_config::EchotuneConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    // Session strings and API keys are secrets; blank them before printing.
    let mut redacted = config.clone();
    redacted.bot.token = redact(&redacted.bot.token);
    redacted.sources.api_key = redact(&redacted.sources.api_key);
    redacted.assistants.session_strings = redacted
        .assistants
        .session_strings
        .iter()
        .map(|s| redact(s))
        .collect();

    Ok(serde_json::to_string_pretty(&redacted)?)
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "<set>".to_string()
    }
}
