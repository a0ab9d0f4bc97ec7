//! Error types for devstack

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using devstack Error
pub type Result<T> = std::result::Result<T, Error>;

/// devstack error types
///
/// Every variant is fatal for a bootstrap run; nothing above the readiness
/// poll retries.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Container runtime not available (is the daemon running?): {0}")]
    RuntimeUnavailable(Box<Error>),

    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}{}", fmt_stderr(.stderr))]
    CommandFailed {
        command: String,
        status: String,
        stderr: Option<String>,
    },

    #[error("Timed out waiting for {what} after {seconds}s")]
    Timeout { what: String, seconds: u64 },

    #[error("Missing schema file: {}", .0.display())]
    MissingSchema(PathBuf),

    #[error("{0}")]
    ApiUnreachable(String),

    #[error("Backend process error: {0}")]
    Backend(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn fmt_stderr(stderr: &Option<String>) -> String {
    match stderr.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => format!(": {}", s),
        _ => String::new(),
    }
}

impl Error {
    /// Build a `CommandFailed` from a program, its arguments and exit status.
    pub fn command_failed(
        program: &str,
        args: &[String],
        status: impl ToString,
        stderr: Option<String>,
    ) -> Self {
        Error::CommandFailed {
            command: render_command(program, args),
            status: status.to_string(),
            stderr,
        }
    }
}

/// Render a command line for logs and error messages.
pub fn render_command(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
