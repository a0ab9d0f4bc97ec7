//! Subprocess invocation boundary
//!
//! All container runtime calls go through [`CommandRunner`] so the pipeline
//! can be driven by a recording fake in tests.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use devstack_common::error::render_command;
use devstack_common::{Error, Result};

/// Runs external programs to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run with inherited stdio. Non-zero exit is an error.
    async fn run(&self, program: &str, args: &[String]) -> Result<()>;

    /// Run with piped output and return stdout. Non-zero exit is an error
    /// carrying the captured stderr.
    async fn capture(&self, program: &str, args: &[String]) -> Result<String>;

    /// Run with output discarded and report whether it exited successfully.
    /// Only a failure to spawn is an error.
    async fn status(&self, program: &str, args: &[String]) -> Result<bool>;
}

/// [`CommandRunner`] backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

fn spawn_error(program: &str, args: &[String], source: std::io::Error) -> Error {
    Error::Spawn {
        command: render_command(program, args),
        source,
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<()> {
        debug!("exec: {}", render_command(program, args));

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| spawn_error(program, args, e))?;

        if !status.success() {
            return Err(Error::command_failed(program, args, status, None));
        }
        Ok(())
    }

    async fn capture(&self, program: &str, args: &[String]) -> Result<String> {
        debug!("exec (captured): {}", render_command(program, args));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(program, args, e))?;

        if !output.status.success() {
            return Err(Error::command_failed(
                program,
                args,
                output.status,
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn status(&self, program: &str, args: &[String]) -> Result<bool> {
        debug!("exec (status): {}", render_command(program, args));

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| spawn_error(program, args, e))?;

        Ok(status.success())
    }
}
