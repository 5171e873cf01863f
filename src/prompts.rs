//! Colored status output and confirmation prompts for the CLI
//!
//! Terminal coloring is decorative: every termcolor write uses `let _ =`
//! so a closed or redirected stream never aborts a keychain operation.
//! Reading the user's answer is not decorative and propagates errors.

use std::fmt;
use std::io::{self, Write};

use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

use crate::error::Result;

/// Where a status line goes and how it is marked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Warning,
    Failure,
}

impl Status {
    fn color(self) -> Color {
        match self {
            Self::Success => Color::Green,
            Self::Warning => Color::Yellow,
            Self::Failure => Color::Red,
        }
    }

    fn marker(self) -> &'static str {
        match self {
            Self::Success => "✓ ",
            Self::Warning => "⚠️  ",
            Self::Failure => "❌ ",
        }
    }

    fn writer(self) -> BufferWriter {
        match self {
            Self::Success => BufferWriter::stdout(ColorChoice::Auto),
            Self::Warning | Self::Failure => BufferWriter::stderr(ColorChoice::Auto),
        }
    }
}

/// Print one status line with a colored marker
///
/// Successes go to stdout, warnings and failures to stderr.
pub fn print_status(status: Status, message: fmt::Arguments<'_>) {
    let writer = status.writer();
    let mut buffer = writer.buffer();
    let _ = buffer.set_color(ColorSpec::new().set_fg(Some(status.color())));
    let _ = buffer.write_all(status.marker().as_bytes());
    let _ = buffer.reset();
    let _ = writeln!(buffer, "{message}");
    let _ = writer.print(&buffer);
}

/// Print a yellow warning line on stderr
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::prompts::print_status($crate::prompts::Status::Warning, format_args!($($arg)*))
    };
}

/// Print a red error line on stderr
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::prompts::print_status($crate::prompts::Status::Failure, format_args!($($arg)*))
    };
}

/// Print a green success line on stdout
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::prompts::print_status($crate::prompts::Status::Success, format_args!($($arg)*))
    };
}

/// Interpret one line of a yes/no answer
///
/// `None` means the answer was not recognised and the user should be asked again.
#[must_use]
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Ask a yes/no question on stdin, looping until a valid answer
///
/// EOF (Ctrl+D) counts as "no".
pub fn prompt_yes_no(question: &str) -> Result<bool> {
    loop {
        print!("{question} (y/n): ");
        io::stdout().flush()?;

        let mut response = String::new();
        let bytes_read = io::stdin().read_line(&mut response)?;

        if bytes_read == 0 {
            println!("\nEOF detected, treating as 'no'");
            return Ok(false);
        }

        match parse_yes_no(&response) {
            Some(answer) => return Ok(answer),
            None if response.trim().is_empty() => {
                warn!("Empty input. Please enter 'y' for yes or 'n' for no.");
            }
            None => {
                warn!("Invalid input: '{}'. Please enter 'y' or 'n'.", response.trim());
            }
        }
    }
}
