//! Container runtime CLI wrapper
//!
//! Speaks the docker command-line verbs (podman accepts the same ones):
//! version, ps, rm, run, exec and cp.

use std::path::Path;
use tracing::{debug, warn};

use devstack_common::{Error, Result};

use crate::command::CommandRunner;

/// Host-to-container port publication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

/// A named, detached container to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
    pub env: Vec<(String, String)>,

    /// Arguments passed to the image entrypoint
    pub args: Vec<String>,

    /// Remove the container when it stops
    pub auto_remove: bool,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ports: Vec::new(),
            env: Vec::new(),
            args: Vec::new(),
            auto_remove: true,
        }
    }

    /// Arguments for `<runtime> run`
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--name".to_string(), self.name.clone()];

        if self.auto_remove {
            args.push("--rm".to_string());
        }

        for (key, value) in &self.env {
            args.extend(["-e".to_string(), format!("{}={}", key, value)]);
        }

        for port in &self.ports {
            args.extend(["-p".to_string(), format!("{}:{}", port.host, port.container)]);
        }

        args.push("-d".to_string());
        args.push(self.image.clone());
        args.extend(self.args.iter().cloned());
        args
    }
}

/// Container runtime driven through its CLI
pub struct ContainerCli<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> ContainerCli<R> {
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Get the CLI command name
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Fail fast when the runtime daemon is not reachable
    pub async fn ensure_available(&self) -> Result<()> {
        self.runner
            .run(&self.program, &["version".to_string()])
            .await
            .map_err(|e| Error::RuntimeUnavailable(Box::new(e)))
    }

    /// Whether a container with exactly this name is running.
    ///
    /// A failing listing counts as "not running".
    pub async fn is_running(&self, name: &str) -> bool {
        let args = vec![
            "ps".to_string(),
            "--filter".to_string(),
            format!("name=^/{}$", name),
            "--format".to_string(),
            "{{.Names}}".to_string(),
        ];

        match self.runner.capture(&self.program, &args).await {
            Ok(out) => out.lines().any(|line| line.trim() == name),
            Err(e) => {
                debug!("Listing containers failed, assuming {} is not running: {}", name, e);
                false
            }
        }
    }

    /// Remove a container whether running or stopped. Errors are ignored.
    pub async fn remove_force(&self, name: &str) {
        let args = vec!["rm".to_string(), "-f".to_string(), name.to_string()];
        match self.runner.status(&self.program, &args).await {
            Ok(true) => debug!("Removed container {}", name),
            Ok(false) => debug!("No container {} to remove", name),
            Err(e) => warn!("Ignoring failure to remove {}: {}", name, e),
        }
    }

    /// Create and start a detached container
    pub async fn run_container(&self, spec: &ContainerSpec) -> Result<()> {
        self.runner.run(&self.program, &spec.run_args()).await
    }

    /// Run a command inside a container, inheriting stdio
    pub async fn exec(&self, name: &str, command: &[String]) -> Result<()> {
        self.runner.run(&self.program, &exec_args(name, command)).await
    }

    /// Run a command inside a container and report success.
    ///
    /// Output is discarded; a spawn failure counts as unsuccessful.
    pub async fn exec_succeeds(&self, name: &str, command: &[String]) -> bool {
        match self.runner.status(&self.program, &exec_args(name, command)).await {
            Ok(success) => success,
            Err(e) => {
                debug!("exec in {} failed: {}", name, e);
                false
            }
        }
    }

    /// Copy a host file into the container filesystem
    pub async fn copy_into(
        &self,
        host_path: &Path,
        name: &str,
        container_path: &str,
    ) -> Result<()> {
        let args = vec![
            "cp".to_string(),
            host_path.display().to_string(),
            format!("{}:{}", name, container_path),
        ];
        self.runner.run(&self.program, &args).await
    }
}

fn exec_args(name: &str, command: &[String]) -> Vec<String> {
    let mut args = vec!["exec".to_string(), name.to_string()];
    args.extend(command.iter().cloned());
    args
}
