// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command handling for the chat REPL
//!
//! Parses a line of user input into a [`ChatCommand`]. Parsing is pure so
//! the routing logic can be tested without a terminal.

use crate::llm::params::RawParameters;

/// Sampling parameter addressed by `/set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamName {
    Temperature,
    TopP,
    TopK,
    MaxTokens,
}

impl ParamName {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "temperature" | "temp" => Some(ParamName::Temperature),
            "top_p" => Some(ParamName::TopP),
            "top_k" => Some(ParamName::TopK),
            "max_tokens" => Some(ParamName::MaxTokens),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::Temperature => "temperature",
            ParamName::TopP => "top_p",
            ParamName::TopK => "top_k",
            ParamName::MaxTokens => "max_tokens",
        }
    }

    /// Store a raw value; `None` resets the parameter to its default
    pub fn apply(&self, params: &mut RawParameters, value: Option<String>) {
        let slot = match self {
            ParamName::Temperature => &mut params.temperature,
            ParamName::TopP => &mut params.top_p,
            ParamName::TopK => &mut params.top_k,
            ParamName::MaxTokens => &mut params.max_tokens,
        };
        *slot = value;
    }
}

/// Represents the different types of commands that can be issued in chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Exit the chat session
    Exit,
    /// Show help information
    Help,
    /// Show the active route and sampling parameters
    Config,
    /// Start a new session with an optional title
    New(Option<String>),
    /// List sessions
    Sessions,
    /// Switch to a different session
    Switch(String),
    /// Rename the active session
    Rename(String),
    /// Clear the active session's messages
    Clear,
    /// Delete the active session
    Delete,
    /// Show the provider, or switch to another one
    Provider(Option<String>),
    /// Show the model, or switch to another one
    Model(Option<String>),
    /// Set a sampling parameter (`None` resets it)
    Set(ParamName, Option<String>),
    /// Attach a file to the next message
    Attach(String),
    /// Drop the pending attachment
    Detach,
    /// Export all sessions to a file
    Export(String),
    /// Import sessions from a file
    Import(String),
    /// Persist sessions now
    Save,
    /// Regular user message (not a command)
    Message(String),
    /// Empty input
    Empty,
    /// Unknown slash command
    Unknown(String),
    /// Known command used incorrectly; carries a usage hint
    Invalid(String),
}

/// Split `/name rest` into the lowercase name and the trimmed remainder
fn split_command(input: &str) -> (String, Option<&str>) {
    match input.split_once(char::is_whitespace) {
        Some((name, rest)) => {
            let rest = rest.trim();
            (
                name.to_lowercase(),
                if rest.is_empty() { None } else { Some(rest) },
            )
        }
        None => (input.to_lowercase(), None),
    }
}

fn required(
    arg: Option<&str>,
    usage: &str,
    build: impl FnOnce(String) -> ChatCommand,
) -> ChatCommand {
    match arg {
        Some(value) => build(value.to_string()),
        None => ChatCommand::Invalid(format!("Usage: {}", usage)),
    }
}

/// Parse user input into a ChatCommand
pub fn parse_command(input: &str) -> ChatCommand {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return ChatCommand::Empty;
    }

    let lower = trimmed.to_lowercase();
    if lower == "exit" || lower == "quit" {
        return ChatCommand::Exit;
    }

    if !trimmed.starts_with('/') {
        return ChatCommand::Message(trimmed.to_string());
    }

    let (name, arg) = split_command(trimmed);
    match name.as_str() {
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/help" | "/?" => ChatCommand::Help,
        "/config" => ChatCommand::Config,
        "/new" => ChatCommand::New(arg.map(str::to_string)),
        "/sessions" | "/list" => ChatCommand::Sessions,
        "/switch" => required(arg, "/switch <id>", ChatCommand::Switch),
        "/rename" => required(arg, "/rename <title>", ChatCommand::Rename),
        "/clear" => ChatCommand::Clear,
        "/delete" => ChatCommand::Delete,
        "/provider" => ChatCommand::Provider(arg.map(str::to_string)),
        "/model" => ChatCommand::Model(arg.map(str::to_string)),
        "/set" => parse_set(arg),
        "/attach" => required(arg, "/attach <path>", ChatCommand::Attach),
        "/detach" => ChatCommand::Detach,
        "/export" => required(arg, "/export <path>", ChatCommand::Export),
        "/import" => required(arg, "/import <path>", ChatCommand::Import),
        "/save" => ChatCommand::Save,
        _ => ChatCommand::Unknown(trimmed.to_string()),
    }
}

fn parse_set(arg: Option<&str>) -> ChatCommand {
    const USAGE: &str = "Usage: /set <temperature|top_p|top_k|max_tokens> <value|reset>";

    let Some(arg) = arg else {
        return ChatCommand::Invalid(USAGE.to_string());
    };
    let mut parts = arg.split_whitespace();
    let (Some(name), value) = (parts.next(), parts.next()) else {
        return ChatCommand::Invalid(USAGE.to_string());
    };
    let Some(param) = ParamName::parse(name) else {
        return ChatCommand::Invalid(format!("Unknown parameter '{}'. {}", name, USAGE));
    };
    match value {
        None => ChatCommand::Invalid(USAGE.to_string()),
        Some(v) if v.eq_ignore_ascii_case("reset") => ChatCommand::Set(param, None),
        // Raw text; clamping happens when the turn is sent
        Some(v) => ChatCommand::Set(param, Some(v.to_string())),
    }
}

/// Validate a session identifier or id prefix
pub fn validate_session_id(session_id: &str) -> Result<(), String> {
    if session_id.is_empty() {
        return Err("Session ID cannot be empty".to_string());
    }

    if session_id.len() > 36 {
        return Err("Session ID is too long".to_string());
    }

    let valid_chars = session_id
        .chars()
        .all(|c| c.is_ascii_hexdigit() || c == '-');
    if !valid_chars {
        return Err("Session ID contains invalid characters".to_string());
    }

    Ok(())
}

/// Format help text for display
pub fn format_help_text() -> String {
    r#"chatdeck commands:

Sessions:
  /new [title]      - Start a new session
  /sessions         - List sessions, most recent first
  /switch <id>      - Switch to a session (an id prefix is enough)
  /rename <title>   - Rename the current session
  /clear            - Remove all messages from the current session
  /delete           - Delete the current session
  /export <path>    - Export all sessions to a JSON file
  /import <path>    - Import sessions from a JSON file
  /save             - Save sessions now

Model & Parameters:
  /provider [name]  - Show or switch provider (google, openai, anthropic)
  /model [name]     - Show or switch model
  /set <param> <v>  - Set temperature, top_p, top_k or max_tokens ("reset" restores the default)
  /config           - Show the current route and parameters

Files:
  /attach <path>    - Attach a file to the next message (Google only)
  /detach           - Drop the pending attachment

  /help             - Show this help message
  /exit, exit, quit - Leave chatdeck"#
        .to_string()
}
