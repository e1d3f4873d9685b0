//! Interactive chat against a DIAL / Azure-OpenAI deployment.
//!
//! # Usage
//!
//! ```bash
//! # Credential from the environment, streaming replies
//! DIAL_API_KEY=... dialchat
//!
//! # Another deployment, whole replies, hand-rolled HTTP transport
//! dialchat --deployment gpt-35-turbo --blocking --transport raw
//!
//! # Show raw traffic (the api-key is redacted)
//! dialchat --verbose
//! ```
//!
//! # Commands
//!
//! - `exit` - End the session (any case)
//! - `/help` - Show available commands
//! - `/stats` - Show session statistics
//! - `/stream on|off` - Switch between streaming and blocking replies
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use dialchat::chat::{
    ChatArgs, ChatConfig, ChatSession, Interrupt, LineOutcome, PlainTextRenderer, Renderer,
};
use dialchat::{ClientLogger, StderrLogger, build_transport};

const SYSTEM_PROMPT_PROMPT: &str = "Enter system prompt (or press Enter to use default): ";
const USER_PROMPT: &str = "You: ";
const EXIT_MESSAGE: &str = "Exiting the chat.";

/// Main entry point for the dialchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("dialchat [OPTIONS]");
    let config = ChatConfig::resolve(args)?;
    tracing::debug!(?config, "resolved configuration");

    let logger: Option<Arc<dyn ClientLogger>> = if config.dial.verbose {
        Some(Arc::new(StderrLogger))
    } else {
        None
    };
    let transport = build_transport(&config.dial, logger.clone())?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    let interrupt = Interrupt::new();
    let handler_interrupt = interrupt.clone();
    ctrlc::set_handler(move || {
        handler_interrupt.trigger();
    })?;

    let system_prompt = match rl.readline(SYSTEM_PROMPT_PROMPT) {
        Ok(line) => line,
        Err(ReadlineError::Interrupted) => String::new(),
        Err(ReadlineError::Eof) => {
            println!("{EXIT_MESSAGE}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let mut session = ChatSession::new(transport, &config.dial, &system_prompt);
    if let Some(logger) = logger {
        session = session.with_logger(logger);
    }

    loop {
        interrupt.reset();

        match rl.readline(USER_PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                match session.handle_line(&line, &mut renderer, &interrupt).await {
                    LineOutcome::Continue => {}
                    LineOutcome::Exit => {
                        println!("{EXIT_MESSAGE}");
                        break;
                    }
                    LineOutcome::Sent(Err(e)) if !e.is_abort() => {
                        renderer.print_error(&e.to_string());
                    }
                    LineOutcome::Sent(_) => {}
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{EXIT_MESSAGE}");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}
