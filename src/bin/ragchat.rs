//! Interactive chat against a retrieval-augmented LLM backend.
//!
//! This binary provides a streaming REPL over the backend's WebSocket
//! endpoint. Provider, model and retrieval mode can be changed between
//! messages.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a local backend with default settings
//! ragchat
//!
//! # Pick a provider, model and mode
//! ragchat --provider openai --model gpt-4o --mode rag
//!
//! # Remote backend, no colors
//! ragchat --server https://chat.example.com --no-color
//! ```
//!
//! Logs go to stderr and are controlled with `RUST_LOG`.
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/new` - Start a new conversation
//! - `/retry` - Re-send the last message
//! - `/provider <key>`, `/model <id>`, `/mode llm|rag|web` - Change selection
//! - `/status` - Show connection and selection
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use ragchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, help_text, parse_command,
};
use ragchat::render::format_metadata;
use ragchat::transcript::export_text_to;
use ragchat::{
    ConnectionStatus, ControllerPhase, SessionController, Transcript, WebSocketTransport,
    fetch_catalog_or_builtin,
};

/// Library modules that log too much below `warn`.
const NOISY_MODULES: &[&str] = &["hyper", "reqwest", "rustls", "tungstenite", "tokio_tungstenite"];

type Session = SessionController<WebSocketTransport>;

/// What the input thread hands to the main loop.
enum Input {
    Line(String),
    Interrupted,
    Eof,
    Failed(String),
}

enum Event {
    Input(Option<Input>),
    Update(bool),
}

/// Main entry point for the ragchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let (args, _) = ChatArgs::from_command_line_relaxed("ragchat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    let http = reqwest::Client::new();
    let catalog = fetch_catalog_or_builtin(&http, &config.catalog_url()?).await;

    let transport = Arc::new(WebSocketTransport::with_policy(
        config.socket_url()?,
        config.reconnect_policy(),
    ));
    let mut session = SessionController::new(transport)
        .with_catalog(catalog)
        .with_provider(config.provider.clone())
        .with_mode(config.mode);
    if let Some(model) = config.model.clone() {
        session = session.with_model(model);
    }
    session.connect();

    println!("RAG Chat ({})", session.status_line());
    println!("Connecting to {} ...", session.transport().url());
    println!("Type /help for commands, /quit to exit\n");

    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    let (prompt_tx, prompt_rx) = std::sync::mpsc::channel::<()>();
    std::thread::spawn(move || read_input(input_tx, prompt_rx));

    let mut awaiting_response = false;
    loop {
        let event = tokio::select! {
            input = input_rx.recv() => Event::Input(input),
            alive = session.next_update(&mut renderer) => Event::Update(alive),
        };

        match event {
            Event::Input(Some(Input::Line(line))) => {
                if !handle_line(&line, &mut session, &mut renderer) {
                    break;
                }
                awaiting_response =
                    session.phase() == ControllerPhase::Streaming && !session.is_orphaned();
            }
            Event::Input(Some(Input::Interrupted)) => println!(),
            Event::Input(Some(Input::Eof) | None) => {
                println!("\nGoodbye!");
                break;
            }
            Event::Input(Some(Input::Failed(err))) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
            Event::Update(false) => {
                renderer.print_error("transport closed");
                break;
            }
            Event::Update(true) => {
                if !awaiting_response {
                    continue;
                }
                if session.is_orphaned() {
                    renderer.print_warning("Connection lost mid-response. Use /retry or /clear.");
                } else if session.phase() == ControllerPhase::Streaming {
                    continue;
                }
                awaiting_response = false;
            }
        }
        if !awaiting_response && prompt_tx.send(()).is_err() {
            break;
        }
    }

    session.disconnect().await;
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = String::from("warn");
        for module in NOISY_MODULES {
            directives.push_str(&format!(",{module}=warn"));
        }
        EnvFilter::new(directives)
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

/// Reads lines on a dedicated thread; waits for a prompt token between lines
/// so the prompt does not interleave with streamed output.
fn read_input(tx: mpsc::UnboundedSender<Input>, prompt: std::sync::mpsc::Receiver<()>) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            let _ = tx.send(Input::Failed(err.to_string()));
            return;
        }
    };
    loop {
        let input = match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                Input::Line(line)
            }
            Err(ReadlineError::Interrupted) => Input::Interrupted,
            Err(ReadlineError::Eof) => Input::Eof,
            Err(err) => Input::Failed(err.to_string()),
        };
        let done = matches!(input, Input::Eof | Input::Failed(_));
        if tx.send(input).is_err() || done || prompt.recv().is_err() {
            return;
        }
    }
}

/// Handles one line of input. Returns false when the user asked to quit.
fn handle_line(line: &str, session: &mut Session, renderer: &mut PlainTextRenderer) -> bool {
    let Some(command) = parse_command(line) else {
        send_message(line, session, renderer);
        return true;
    };
    match command {
        ChatCommand::Quit => {
            println!("Goodbye!");
            return false;
        }
        ChatCommand::Clear => {
            session.clear();
            renderer.print_info("Conversation cleared.");
        }
        ChatCommand::Retry => {
            let orphaned = session.is_orphaned();
            match session.retry() {
                Some(_) => println!("AI:"),
                None if orphaned => {
                    renderer.print_info("Abandoned the interrupted response; still not connected.")
                }
                None => renderer.print_info("Nothing to retry right now."),
            }
        }
        ChatCommand::Provider(provider) => match session.switch_provider(provider) {
            Ok(()) => {
                renderer.print_info(&format!("Now chatting with {}", session.status_line()));
                if session.model_id().is_none() {
                    renderer.print_info("No models known for this provider; pick one with /model.");
                }
                if let Some(notice) = session.notice() {
                    renderer.print_warning(notice);
                }
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Model(model) => match session.switch_model(&model) {
            Ok(()) => {
                if !session.catalog().contains(session.provider(), &model) {
                    renderer.print_warning(&format!(
                        "{model} is not listed for {}; using it anyway",
                        session.provider().display_name()
                    ));
                }
                renderer.print_info(&format!("Now chatting with {}", session.status_line()));
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Mode(mode) => match session.switch_mode(mode) {
            Ok(()) => renderer.print_info(&format!("Now chatting with {}", session.status_line())),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::ListProviders => {
            println!("    Providers:");
            for provider in session.catalog().providers() {
                let marker = if provider == session.provider() { "*" } else { " " };
                let warned = if session.state().provider_warning(provider).is_some() {
                    " (warning)"
                } else {
                    ""
                };
                println!(
                    "    {marker} {:<12} {}{warned}",
                    provider.key(),
                    provider.display_name()
                );
            }
        }
        ChatCommand::ListModels => {
            let models = session.catalog().models(session.provider());
            if models.is_empty() {
                println!("    No models known for {}", session.provider().display_name());
            }
            for model in models {
                let marker = if Some(model.id.as_str()) == session.model_id() {
                    "*"
                } else {
                    " "
                };
                println!("    {marker} {:<36} {}", model.id, model.description);
            }
        }
        ChatCommand::Status => print_status(session),
        ChatCommand::SaveTranscript(path) => match session.transcript().save_to(&path) {
            Ok(()) => renderer.print_info(&format!("Chat saved to {path}")),
            Err(err) => renderer.print_error(&format!("Failed to save chat: {err}")),
        },
        ChatCommand::LoadTranscript(path) => {
            match Transcript::load_from(&path).and_then(|t| session.load_transcript(t)) {
                Ok(()) => {
                    renderer.print_info(&format!(
                        "Chat loaded from {path} ({} messages); {}",
                        session.state().messages().len(),
                        session.status_line()
                    ));
                }
                Err(err) => renderer.print_error(&format!("Error loading chat: {err}")),
            }
        }
        ChatCommand::ExportText(path) => {
            match export_text_to(&path, session.state().messages(), &session.model_label()) {
                Ok(()) => renderer.print_info(&format!("Chat exported to {path}")),
                Err(err) => renderer.print_error(&format!("Failed to export chat: {err}")),
            }
        }
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {line}");
            }
        }
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    true
}

fn send_message(line: &str, session: &mut Session, renderer: &mut PlainTextRenderer) {
    match session.phase() {
        ControllerPhase::Ready => {}
        ControllerPhase::Streaming => {
            renderer.print_info("Still answering the previous message.");
            return;
        }
        ControllerPhase::AwaitingConnection => {
            renderer.print_info("Not connected yet; the message was not sent.");
            return;
        }
        ControllerPhase::Error => {
            renderer.print_error(&format!(
                "{}; the message was not sent. Reconnecting.",
                session.state().connection_status()
            ));
            session.connect();
            return;
        }
    }
    if session.model_id().is_none() {
        renderer.print_info("Select a model with /model first.");
        return;
    }
    if session.send(line).is_some() {
        println!("AI:");
    } else {
        renderer.print_error("The message could not be sent.");
    }
}

fn print_status(session: &Session) {
    let state = session.state();
    println!("    Session Status:");
    println!("      Connection: {}", state.connection_status());
    println!("      Using: {}", session.status_line());
    println!("      Messages: {}", state.messages().len());
    println!(
        "      Streaming: {}",
        if state.is_busy() { "yes" } else { "no" }
    );
    if let Some(summary) = state.last_metadata().and_then(format_metadata) {
        println!("      Last response: {summary}");
    }
    if let Some(error) = state.last_error() {
        println!("      Last error: {error}");
    }
    for (provider, warning) in state.provider_warnings() {
        println!("      Warning ({}): {warning}", provider.display_name());
    }
    if matches!(state.connection_status(), ConnectionStatus::Error(_)) {
        println!("      Send a message to reconnect.");
    }
}
