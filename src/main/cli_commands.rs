// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use chatdeck::chat::{ChatOrchestrator, ChatTurnRequest, FileUpload, TurnOutcome};
use chatdeck::cli::{AskArgs, OutputFormat, SessionsArgs, SessionsCommands};
use chatdeck::config::Settings;
use chatdeck::error::{ChatError, Result};
use chatdeck::llm::factory::{ProviderFactory, ProviderSource};
use chatdeck::llm::message::{Role, UsageRecord};
use chatdeck::session::{Session, SessionDefaults, SessionStore, SessionSummary};

/// Build an orchestrator over the persisted sessions and real providers
pub(super) fn open_orchestrator(settings: Settings) -> Result<ChatOrchestrator> {
    let settings = Arc::new(settings);
    let store = SessionStore::load_from(
        &Settings::sessions_path(),
        SessionDefaults::from_settings(&settings),
    )?;
    let providers: Arc<dyn ProviderSource> = Arc::new(ProviderFactory::new(Arc::clone(&settings)));
    Ok(ChatOrchestrator::new(
        settings,
        store,
        providers,
        Settings::uploads_dir(),
    ))
}

pub(super) fn save_sessions(orchestrator: &ChatOrchestrator) -> Result<()> {
    orchestrator.save_sessions(&Settings::sessions_path())
}

pub(super) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub(super) fn print_colored(color: Color, text: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(color))?;
    print!("{}", text);
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

pub(super) fn print_error(message: &str) -> Result<()> {
    let mut stderr = io::stderr();
    stderr.execute(SetForegroundColor(Color::Red))?;
    eprintln!("{}", message);
    stderr.execute(ResetColor)?;
    Ok(())
}

pub(super) fn format_usage(usage: &UsageRecord) -> String {
    let show = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
    format!(
        "tokens: prompt {} / output {} / total {}",
        show(usage.prompt),
        show(usage.output),
        show(usage.total)
    )
}

pub(super) fn print_session_list(sessions: &[SessionSummary], active: Option<&str>) {
    if sessions.is_empty() {
        println!("\nNo sessions.\n");
        return;
    }

    println!();
    for session in sessions {
        let marker = if Some(session.id.as_str()) == active {
            "*"
        } else {
            " "
        };
        println!(
            "{} {} | {} | {}/{} | {} msgs | {}",
            marker,
            short_id(&session.id),
            session.updated_at.format("%Y-%m-%d %H:%M"),
            session.provider,
            session.model,
            session.message_count,
            session.title
        );
    }
    println!();
}

fn print_session(session: &Session) {
    println!("\nSession: {}", session.id);
    println!("Title: {}", session.title);
    println!("Route: {}/{}", session.provider, session.model);
    println!("Created: {}", session.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Updated: {}", session.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!();

    for message in &session.messages {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        match &message.file {
            Some(file) => println!("{} [{}]: {}", who, file, message.content),
            None => println!("{}: {}", who, message.content),
        }
    }
    println!();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One-shot question
pub(super) async fn run_ask(
    args: AskArgs,
    settings: Settings,
    format: &OutputFormat,
) -> Result<()> {
    let prompt = if args.stdin {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        args.prompt.clone().unwrap_or_default()
    };

    let file = match &args.file {
        Some(path) => Some(FileUpload::from_path(path).await?),
        None => None,
    };

    let mut orchestrator = open_orchestrator(settings)?;

    let mut request = ChatTurnRequest::new(prompt).with_params(args.route.raw_params());
    request.file = file;
    request.session_id = args.route.session.clone();
    request.provider = args.route.provider.clone();
    request.model = args.route.model.clone();
    request.openai_base_url = args.route.openai_base_url.clone();

    let envelope = orchestrator.chat(request).await;
    save_sessions(&orchestrator)?;

    if *format == OutputFormat::Json {
        print_json(&envelope)?;
    } else {
        match &envelope.body {
            TurnOutcome::Success(turn) => {
                println!("{}", turn.reply);
                tracing::debug!(session = %turn.session_id, "{}", format_usage(&turn.usage));
            }
            TurnOutcome::Failure(failure) => print_error(&failure.reply)?,
        }
    }

    if !envelope.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// `chatdeck sessions ...`
pub(super) fn run_sessions_command(
    args: SessionsArgs,
    settings: Settings,
    format: &OutputFormat,
) -> Result<()> {
    let sessions_path = Settings::sessions_path();
    let mut store =
        SessionStore::load_from(&sessions_path, SessionDefaults::from_settings(&settings))?;
    let json = *format == OutputFormat::Json;

    match args.command {
        SessionsCommands::List { limit } => {
            let sessions: Vec<SessionSummary> = store.list().into_iter().take(limit).collect();
            if json {
                print_json(&sessions)?;
            } else {
                print_session_list(&sessions, store.active_id());
            }
        }

        SessionsCommands::Show { session_id } => {
            let session = store.find_by_prefix(&session_id)?;
            if json {
                print_json(session)?;
            } else {
                print_session(session);
            }
        }

        SessionsCommands::Rename { session_id, title } => {
            let id = store.find_by_prefix(&session_id)?.id.clone();
            let session = store.rename(&id, &title)?;
            println!("Renamed {} to \"{}\".", short_id(&session.id), session.title);
            store.save_to(&sessions_path)?;
        }

        SessionsCommands::Delete { session_id } => {
            let id = store.find_by_prefix(&session_id)?.id.clone();
            let removed = store.delete(&id)?;
            println!("Deleted \"{}\".", removed.title);
            store.save_to(&sessions_path)?;
        }

        SessionsCommands::Clear { session_id } => {
            let id = store.find_by_prefix(&session_id)?.id.clone();
            store.clear(&id)?;
            println!("Cleared {}.", short_id(&id));
            store.save_to(&sessions_path)?;
        }

        SessionsCommands::Export { session, output } => {
            let bundle = match session {
                Some(prefix) => {
                    let id = store.find_by_prefix(&prefix)?.id.clone();
                    store.export_session(&id)?
                }
                None => store.export_all(),
            };
            let content = serde_json::to_string_pretty(&bundle)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    println!(
                        "Exported {} session(s) to {}.",
                        bundle.sessions.len(),
                        path.display()
                    );
                }
                None => println!("{}", content),
            }
        }

        SessionsCommands::Import { path } => {
            let content = std::fs::read_to_string(&path)?;
            let payload: serde_json::Value = serde_json::from_str(&content)
                .map_err(|e| ChatError::InvalidInput(format!("Invalid import file: {}", e)))?;
            let ids = store.import(&payload)?;
            println!("Imported {} session(s).", ids.len());
            store.save_to(&sessions_path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("550e8400-e29b-41d4"), "550e8400");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_format_usage() {
        assert_eq!(
            format_usage(&UsageRecord::new(3, 4, 7)),
            "tokens: prompt 3 / output 4 / total 7"
        );
        assert_eq!(
            format_usage(&UsageRecord::estimated("a b", "c")),
            "tokens: prompt 2 / output 1 / total -"
        );
    }
}
