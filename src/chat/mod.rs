//! Interactive chat built on the completion transports.
//!
//! This module provides the pieces of the `dialchat` REPL:
//!
//! - [`config`]: CLI argument parsing and configuration layering
//! - [`session`]: conversation state and one round trip per user turn
//! - [`commands`]: the exit command and slash commands
//! - [`interrupt`]: the Ctrl+C cancellation signal

mod commands;
mod config;
mod interrupt;
mod session;

pub use crate::render::{ASSISTANT_LABEL, PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, is_exit_command, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use interrupt::Interrupt;
pub use session::{ChatSession, LineOutcome, SessionStats};
