//! Output rendering for the chat loop.
//!
//! The session talks to a [`Renderer`] rather than to stdout so that the same
//! turn logic drives both the terminal and tests.

use std::io::{self, Write};

/// ANSI escape code for bold cyan text (used for the assistant label).
const ANSI_LABEL: &str = "\x1b[1;36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for dim text (used for informational output).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Label printed before every assistant reply.
pub const ASSISTANT_LABEL: &str = "Assistant: ";

/// Receives the visible output of a chat turn.
pub trait Renderer: Send {
    /// Called once before the first fragment of a reply.
    fn start_response(&mut self);

    /// Print reply text as it arrives.
    fn print_text(&mut self, text: &str);

    /// Called once after the last fragment of a reply.
    fn finish_response(&mut self);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print informational output such as command results.
    fn print_info(&mut self, info: &str);

    /// Called when the user cancels a reply in flight.
    fn print_interrupted(&mut self) {
        self.print_info("[interrupted]");
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Replies and info go to the writer (stdout by default), errors go to stderr.
pub struct PlainTextRenderer {
    out: Box<dyn Write + Send>,
    use_color: bool,
    in_response: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::to_writer(io::stdout(), use_color)
    }

    /// Creates a renderer that writes replies to `out`.
    pub fn to_writer(out: impl Write + Send + 'static, use_color: bool) -> Self {
        Self {
            out: Box::new(out),
            use_color,
            in_response: false,
        }
    }

    fn write(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    /// Terminate a reply that was cut short so the next line starts clean.
    fn close_response(&mut self) {
        if self.in_response {
            self.write("\n");
            self.in_response = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self) {
        self.close_response();
        if self.use_color {
            self.write(&format!("{ANSI_LABEL}{ASSISTANT_LABEL}{ANSI_RESET}"));
        } else {
            self.write(ASSISTANT_LABEL);
        }
        self.in_response = true;
    }

    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn finish_response(&mut self) {
        self.close_response();
    }

    fn print_error(&mut self, error: &str) {
        self.close_response();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.close_response();
        if self.use_color {
            self.write(&format!("{ANSI_DIM}{info}{ANSI_RESET}\n"));
        } else {
            self.write(&format!("{info}\n"));
        }
    }
}
