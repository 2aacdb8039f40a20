// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Interactive chat loop

use std::io::{self, Write};
use std::path::Path;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use chatdeck::chat::commands::{format_help_text, parse_command, validate_session_id, ChatCommand};
use chatdeck::chat::{ChatOrchestrator, ChatTurnRequest, FileUpload, TurnOutcome};
use chatdeck::cli::ChatArgs;
use chatdeck::config::Settings;
use chatdeck::error::{ChatError, Result};
use chatdeck::llm::params::{GenerationParameters, RawParameters};
use chatdeck::llm::provider::ProviderKind;

use super::cli_commands::{
    format_usage, open_orchestrator, print_colored, print_error, print_session_list,
    save_sessions, short_id,
};

/// Mutable REPL state on top of the orchestrator
struct ReplState {
    orchestrator: ChatOrchestrator,
    session_id: String,
    provider: Option<ProviderKind>,
    model: Option<String>,
    params: RawParameters,
    openai_base_url: Option<String>,
    attachment: Option<FileUpload>,
}

enum Flow {
    Continue,
    Exit,
}

impl ReplState {
    /// Provider and model the next turn will use
    fn route(&self) -> (ProviderKind, String) {
        let session = self.orchestrator.store().get(&self.session_id);
        let session_provider = session
            .map(|s| s.provider)
            .unwrap_or(self.orchestrator.store().defaults().provider);
        let provider = self.provider.unwrap_or(session_provider);
        let model = match (&self.model, session) {
            (Some(model), _) => model.clone(),
            (None, Some(s)) if s.provider == provider => s.model.clone(),
            _ => self
                .orchestrator
                .store()
                .defaults()
                .model_for(provider)
                .to_string(),
        };
        (provider, model)
    }

    fn switch_to(&mut self, id: String) {
        self.session_id = id;
        self.provider = None;
        self.model = None;
    }

    fn follow_active(&mut self) {
        if let Some(id) = self.orchestrator.store().active_id() {
            let id = id.to_string();
            self.switch_to(id);
        }
    }

    async fn send(&mut self, message: String) -> Result<()> {
        let mut request = ChatTurnRequest::new(message)
            .with_session(self.session_id.clone())
            .with_params(self.params.clone());
        request.file = self.attachment.clone();
        request.provider = self.provider.map(|p| p.to_string());
        request.model = self.model.clone();
        request.openai_base_url = self.openai_base_url.clone();

        let envelope = self.orchestrator.chat(request).await;
        match envelope.body {
            TurnOutcome::Success(turn) => {
                print_colored(Color::Cyan, "\nassistant: ")?;
                println!("{}", turn.reply);
                let mut stdout = io::stdout();
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                println!("({})\n", format_usage(&turn.usage));
                stdout.execute(ResetColor)?;

                // The session now carries the route that was used
                self.attachment = None;
                self.switch_to(turn.session_id);
                save_sessions(&self.orchestrator)?;
            }
            TurnOutcome::Failure(failure) => {
                print_error(&format!("\n{}\n", failure.reply))?;
                if let Some(file) = &self.attachment {
                    println!("{} is still attached (/detach to drop it).\n", file.file_name);
                }
            }
        }
        Ok(())
    }

    async fn handle(&mut self, command: ChatCommand) -> Result<Flow> {
        match command {
            ChatCommand::Empty => {}
            ChatCommand::Exit => return Ok(Flow::Exit),
            ChatCommand::Help => println!("\n{}\n", format_help_text()),
            ChatCommand::Message(text) => self.send(text).await?,

            ChatCommand::Config => self.print_config(),

            ChatCommand::New(title) => {
                let (provider, model) = self.route();
                let session = self.orchestrator.create_session(
                    title.as_deref(),
                    Some(provider),
                    Some(&model),
                );
                println!("Started session {} ({}).", short_id(&session.id), session.title);
                self.switch_to(session.id);
            }

            ChatCommand::Sessions => {
                print_session_list(
                    &self.orchestrator.list_sessions(),
                    Some(self.session_id.as_str()),
                );
            }

            ChatCommand::Switch(prefix) => {
                if let Err(e) = validate_session_id(&prefix) {
                    print_error(&e)?;
                    return Ok(Flow::Continue);
                }
                let found = self
                    .orchestrator
                    .store()
                    .find_by_prefix(&prefix)
                    .map(|s| (s.id.clone(), s.title.clone()));
                match found {
                    Ok((id, title)) => {
                        println!("Switched to {} ({}).", short_id(&id), title);
                        self.switch_to(id);
                    }
                    Err(e) => print_error(&e.to_string())?,
                }
            }

            ChatCommand::Rename(title) => {
                let session = self.orchestrator.rename_session(&self.session_id, &title)?;
                println!("Renamed to \"{}\".", session.title);
            }

            ChatCommand::Clear => {
                self.orchestrator.clear_session(&self.session_id)?;
                println!("Conversation cleared.");
            }

            ChatCommand::Delete => {
                self.orchestrator.delete_session(&self.session_id)?;
                self.follow_active();
                println!("Session deleted. Now in {}.", short_id(&self.session_id));
            }

            ChatCommand::Provider(None) => println!("Provider: {}", self.route().0),
            ChatCommand::Provider(Some(name)) => match name.parse::<ProviderKind>() {
                Ok(kind) => {
                    self.provider = Some(kind);
                    self.model = None;
                    let (provider, model) = self.route();
                    println!("Provider: {} (model {})", provider, model);
                    if !self.orchestrator.settings().is_provider_configured(kind) {
                        print_error(&format!("Warning: no API key configured for {}.", kind))?;
                    }
                }
                Err(e) => print_error(&e.to_string())?,
            },

            ChatCommand::Model(None) => println!("Model: {}", self.route().1),
            ChatCommand::Model(Some(model)) => {
                println!("Model: {}", model);
                self.model = Some(model);
            }

            ChatCommand::Set(param, value) => {
                match &value {
                    Some(v) => println!("{} = {}", param.as_str(), v),
                    None => println!("{} reset to default", param.as_str()),
                }
                param.apply(&mut self.params, value);
            }

            ChatCommand::Attach(path) => match FileUpload::from_path(Path::new(&path)).await {
                Ok(file) => {
                    println!(
                        "Attached {} ({} bytes, {}).",
                        file.file_name,
                        file.bytes.len(),
                        file.mime_type()
                    );
                    if !self.route().0.supports_attachments() {
                        print_error("Note: file uploads are only supported for Google GenAI.")?;
                    }
                    self.attachment = Some(file);
                }
                Err(e) => print_error(&e.to_string())?,
            },

            ChatCommand::Detach => match self.attachment.take() {
                Some(file) => println!("Removed attachment {}.", file.file_name),
                None => println!("No attachment."),
            },

            ChatCommand::Export(path) => {
                let bundle = self.orchestrator.export_all();
                std::fs::write(&path, serde_json::to_string_pretty(&bundle)?)?;
                println!("Exported {} session(s) to {}.", bundle.sessions.len(), path);
            }

            ChatCommand::Import(path) => match self.import(Path::new(&path)) {
                Ok(count) => println!("Imported {} session(s).", count),
                Err(e) => print_error(&e.to_string())?,
            },

            ChatCommand::Save => {
                save_sessions(&self.orchestrator)?;
                println!("Saved to {}.", Settings::sessions_path().display());
            }

            ChatCommand::Unknown(input) => {
                print_error(&format!("Unknown command: {}. Type /help for commands.", input))?;
            }
            ChatCommand::Invalid(usage) => print_error(&usage)?,
        }
        Ok(Flow::Continue)
    }

    fn import(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let payload: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ChatError::InvalidInput(format!("Invalid import file: {}", e)))?;
        let ids = self.orchestrator.import_sessions(&payload)?;
        save_sessions(&self.orchestrator)?;
        Ok(ids.len())
    }

    fn print_config(&self) {
        let settings = self.orchestrator.settings();
        let (provider, model) = self.route();
        let params = GenerationParameters::sanitize(
            &self.params,
            &settings.defaults,
            provider.max_tokens_ceiling(),
        );

        println!("\nSession: {}", self.session_id);
        println!("Provider: {}", provider);
        println!("Model: {}", model);
        println!(
            "temperature={} top_p={} top_k={} max_tokens={}",
            params.temperature, params.top_p, params.top_k, params.max_tokens
        );
        let configured: Vec<String> = settings
            .configured_providers()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("Configured providers: {}", configured.join(", "));
        if let Some(file) = &self.attachment {
            println!("Pending attachment: {}", file.file_name);
        }
        println!("Settings file: {}\n", Settings::default_path().display());
    }
}

fn print_welcome(provider: ProviderKind, model: &str, session_id: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("chatdeck v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Provider: {}", provider);
    println!("Model: {}", model);
    println!("Session: {}", short_id(session_id));
    println!("Type /help for commands, exit to quit\n");
    Ok(())
}

/// Prompt and read one line; `None` on end of input
fn read_user_input() -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Run interactive chat mode
pub(super) async fn run_chat(args: ChatArgs, settings: Settings) -> Result<()> {
    let orchestrator = open_orchestrator(settings)?;

    let session_id = match args.route.session.as_deref() {
        Some(prefix) => orchestrator.store().find_by_prefix(prefix)?.id.clone(),
        None => orchestrator
            .store()
            .active_id()
            .map(str::to_string)
            .ok_or_else(|| ChatError::SessionNotFound("active".to_string()))?,
    };

    let provider = match args.route.provider.as_deref() {
        Some(name) => Some(name.parse::<ProviderKind>()?),
        None => None,
    };

    let mut state = ReplState {
        orchestrator,
        session_id,
        provider,
        model: args.route.model.clone(),
        params: args.route.raw_params(),
        openai_base_url: args.route.openai_base_url.clone(),
        attachment: None,
    };

    let (provider, model) = state.route();
    print_welcome(provider, &model, &state.session_id)?;
    tracing::debug!(session = %state.session_id, "chat loop started");

    if let Some(prompt) = args.prompt {
        state.send(prompt).await?;
    }

    while let Some(line) = read_user_input()? {
        if let Flow::Exit = state.handle(parse_command(&line)).await? {
            break;
        }
    }

    save_sessions(&state.orchestrator)?;
    println!("Goodbye!");
    Ok(())
}
