//! Output rendering for chat sessions.
//!
//! The controller reports what happened to the conversation through the
//! [`Renderer`] trait; presentation layers decide how it looks.

use std::io::{self, Stdout, Write};

use crate::types::{ConnectionStatus, ResponseMetadata};

/// ANSI escape code for dim text (used for metadata).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for system notices).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for warnings).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering session output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Nothing at all, for headless sessions
pub trait Renderer: Send {
    /// Print a fragment of assistant text.
    ///
    /// This is called incrementally as fragments arrive.
    fn print_fragment(&mut self, text: &str);

    /// Called when a response is complete.
    fn finish_response(&mut self, metadata: Option<&ResponseMetadata>);

    /// Print a request-level error.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a provider warning.
    fn print_warning(&mut self, warning: &str) {
        self.print_info(warning);
    }

    /// Called when the connection status changes.
    fn print_status(&mut self, _status: &ConnectionStatus) {}
}

/// Formats response metadata as a short summary, e.g. `1.20s, 42 tokens`.
///
/// Returns `None` when the backend reported nothing.
pub fn format_metadata(metadata: &ResponseMetadata) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(elapsed) = metadata.elapsed {
        parts.push(format!("{elapsed:.2}s"));
    }
    match (metadata.prompt_tokens, metadata.completion_tokens) {
        (Some(prompt), Some(completion)) => match metadata.total_tokens() {
            Some(total) => parts.push(format!("{total} tokens ({prompt} in, {completion} out)")),
            None => parts.push(format!("{prompt} tokens in, {completion} out")),
        },
        (Some(prompt), None) => parts.push(format!("{prompt} prompt tokens")),
        (None, Some(completion)) => parts.push(format!("{completion} completion tokens")),
        (None, None) => {}
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            line_start: true,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn end_line(&mut self) {
        if !self.line_start {
            println!();
            self.line_start = true;
        }
    }

    fn styled_line(&mut self, color: &str, label: &str, text: &str) {
        self.end_line();
        if self.use_color {
            println!("{color}{label}{text}{ANSI_RESET}");
        } else {
            println!("{label}{text}");
        }
        self.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_fragment(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    fn finish_response(&mut self, metadata: Option<&ResponseMetadata>) {
        self.end_line();
        if let Some(summary) = metadata.and_then(format_metadata) {
            if self.use_color {
                println!("{ANSI_DIM}[{summary}]{ANSI_RESET}");
            } else {
                println!("[{summary}]");
            }
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.styled_line(ANSI_CYAN, "", info);
    }

    fn print_warning(&mut self, warning: &str) {
        self.styled_line(ANSI_YELLOW, "Warning: ", warning);
    }

    fn print_status(&mut self, status: &ConnectionStatus) {
        let color = match status {
            ConnectionStatus::Connected => ANSI_CYAN,
            ConnectionStatus::Error(_) => ANSI_RED,
            ConnectionStatus::Connecting | ConnectionStatus::Disconnected => ANSI_DIM,
        };
        self.styled_line(color, "[", &format!("{status}]"));
    }
}

/// A renderer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn print_fragment(&mut self, _: &str) {}

    fn finish_response(&mut self, _: Option<&ResponseMetadata>) {}

    fn print_error(&mut self, _: &str) {}

    fn print_info(&mut self, _: &str) {}
}
