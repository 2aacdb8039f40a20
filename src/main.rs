// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chatdeck - multi-provider LLM chat sessions for your terminal
//!
//! Entry point for the chatdeck CLI application.

use std::path::Path;

use clap::Parser;

use chatdeck::cli::{ChatArgs, Cli, Commands};
use chatdeck::config::Settings;
use chatdeck::error::Result;

#[path = "main/cli_commands.rs"]
mod cli_commands;
#[path = "main/repl.rs"]
mod repl;

use cli_commands::{run_ask, run_sessions_command};
use repl::run_chat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let settings = load_settings(cli.config.as_deref())?;
    if cli.needs_provider_key() {
        settings.validate()?;
    }
    Settings::ensure_directories()?;

    match cli.command {
        None => run_chat(ChatArgs::default(), settings).await?,
        Some(Commands::Chat(args)) => run_chat(args, settings).await?,
        Some(Commands::Ask(args)) => run_ask(args, settings, &cli.format).await?,
        Some(Commands::Sessions(args)) => run_sessions_command(args, settings, &cli.format)?,
    }

    Ok(())
}

/// Install the fmt subscriber. WARN by default, `-v` turns on debug output
/// for this crate; `RUST_LOG` directives still apply.
fn init_tracing(verbose: u8) {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    if verbose > 0 {
        let directive = if verbose > 1 {
            "chatdeck=trace"
        } else {
            "chatdeck=debug"
        };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => {
            let mut settings = Settings::load_from(path)?;
            settings.apply_env_overrides();
            Ok(settings)
        }
        None => Settings::load(),
    }
}
