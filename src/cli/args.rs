// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for chatdeck.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::llm::params::RawParameters;

/// chatdeck - multi-provider LLM chat sessions for your terminal
#[derive(Parser, Debug)]
#[command(name = "chatdeck")]
#[command(version, about = "Multi-provider LLM chat sessions for your terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Session management
    Sessions(SessionsArgs),
}

impl Cli {
    /// Chatting needs at least one provider key; browsing sessions does not.
    pub fn needs_provider_key(&self) -> bool {
        !matches!(self.command, Some(Commands::Sessions(_)))
    }
}

/// Provider routing and sampling flags shared by `chat` and `ask`
#[derive(clap::Args, Debug, Default, Clone)]
pub struct RouteArgs {
    /// LLM provider to use (google, openai, anthropic)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Session to continue
    #[arg(short, long)]
    pub session: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(long, allow_hyphen_values = true)]
    pub temperature: Option<String>,

    /// Nucleus sampling probability (0.0 - 1.0)
    #[arg(long, allow_hyphen_values = true)]
    pub top_p: Option<String>,

    /// Top-k sampling (1 - 100, Google only)
    #[arg(long, allow_hyphen_values = true)]
    pub top_k: Option<String>,

    /// Maximum output tokens
    #[arg(long, allow_hyphen_values = true)]
    pub max_tokens: Option<String>,

    /// Base URL for an OpenAI compatible endpoint
    #[arg(long, value_name = "URL")]
    pub openai_base_url: Option<String>,
}

impl RouteArgs {
    /// Sampling flags as raw, unvalidated parameters
    pub fn raw_params(&self) -> RawParameters {
        RawParameters {
            temperature: self.temperature.clone(),
            top_p: self.top_p.clone(),
            top_k: self.top_k.clone(),
            max_tokens: self.max_tokens.clone(),
        }
    }
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Initial prompt (optional)
    pub prompt: Option<String>,

    #[command(flatten)]
    pub route: RouteArgs,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: Option<String>,

    /// Attach a file (Google only)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Read prompt from stdin
    #[arg(long)]
    pub stdin: bool,

    #[command(flatten)]
    pub route: RouteArgs,
}

/// Arguments for session management
#[derive(clap::Args, Debug)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionsCommands,
}

/// Sessions subcommands
#[derive(Subcommand, Debug)]
pub enum SessionsCommands {
    /// List sessions, most recently updated first
    List {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a session's messages
    Show {
        /// Session ID
        session_id: String,
    },

    /// Rename a session
    Rename {
        /// Session ID
        session_id: String,

        /// New title
        title: String,
    },

    /// Delete a session
    Delete {
        /// Session ID
        session_id: String,
    },

    /// Remove all messages from a session
    Clear {
        /// Session ID
        session_id: String,
    },

    /// Export sessions as JSON
    Export {
        /// Export only this session
        #[arg(long)]
        session: Option<String>,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import sessions from a JSON file
    Import {
        /// File to import
        path: PathBuf,
    },
}

/// Output format for responses
#[derive(ValueEnum, Clone, Debug, Default, PartialEq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}
