//! Command parsing for the chat application.
//!
//! The bare word `exit` ends the session.  Everything else that starts with
//! `/` is a slash command that controls the session without reaching the
//! deployment.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics (message count, deployment, mode, transport).
    Stats,

    /// Switch streaming on or off for later turns.
    Stream(bool),

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Returns true when `input` is the exit command, in any case.
pub fn is_exit_command(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("exit")
}

/// Parses user input for commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be sent as a regular message.
///
/// # Examples
///
/// ```
/// # use dialchat::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("EXIT"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/stream off"), Some(ChatCommand::Stream(false)));
/// assert!(parse_command("What is 2+2?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    if is_exit_command(input) {
        return Some(ChatCommand::Quit);
    }

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "stream" => match argument.and_then(parse_on_off) {
            Some(on) => ChatCommand::Stream(on),
            None => ChatCommand::Invalid("/stream expects on or off".to_string()),
        },
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };
    Some(result)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /stream on|off         Stream replies or wait for the whole reply
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat (typing exit works too)"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_in_any_case() {
        for input in ["exit", "EXIT", "Exit", "  eXiT  "] {
            assert!(is_exit_command(input), "{input}");
            assert_eq!(parse_command(input), Some(ChatCommand::Quit));
        }
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command("exits"));
    }

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_stream_toggle() {
        assert_eq!(parse_command("/stream on"), Some(ChatCommand::Stream(true)));
        assert_eq!(parse_command("/stream OFF"), Some(ChatCommand::Stream(false)));
        assert!(matches!(
            parse_command("/stream"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/stream sometimes"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_help_and_stats() {
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
    }

    #[test]
    fn unknown_command_is_invalid() {
        assert_eq!(
            parse_command("/model gpt-4"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("What is 2+2?"), None);
        assert_eq!(parse_command("please exit"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_lists_commands() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/stream"));
        assert!(help.contains("/stats"));
    }
}
