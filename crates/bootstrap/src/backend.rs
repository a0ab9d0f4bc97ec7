//! Backend process management - spawning and supervising the server under test

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{info, warn};

use devstack_common::config::{BackendConfig, DatabaseConfig};
use devstack_common::error::render_command;
use devstack_common::{backend_env, EnvMap, Error, Result};

/// Everything needed to start the backend
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,

    /// Complete environment; nothing else is inherited
    pub env: EnvMap,
}

impl LaunchSpec {
    /// Build the launch spec for the backend, layering the datastore
    /// overrides on top of `parent_env`.
    pub fn for_backend<I, K, V>(
        repo_root: &Path,
        backend: &BackendConfig,
        database: &DatabaseConfig,
        parent_env: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<std::ffi::OsString>,
        V: Into<std::ffi::OsString>,
    {
        Self {
            program: backend.program.clone(),
            args: backend.args.clone(),
            cwd: repo_root.join(&backend.dir),
            env: backend_env(parent_env, database, backend),
        }
    }
}

/// A supervised child process
#[async_trait]
pub trait ChildProcess: Send {
    /// OS process id, `None` once reaped
    fn id(&self) -> Option<u32>;

    /// Deliver a signal to the child
    fn signal(&mut self, signal: Signal) -> Result<()>;

    /// Wait for exit and return the exit code, `None` when killed by a signal
    async fn wait(&mut self) -> Result<Option<i32>>;
}

/// Starts the backend process
pub trait BackendLauncher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ChildProcess>>;
}

/// Launches the backend as a real child process with inherited stdio
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl BackendLauncher for ProcessLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ChildProcess>> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .env_clear()
            .envs(&spec.env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Spawn {
                command: format!(
                    "{} (in {})",
                    render_command(&spec.program, &spec.args),
                    spec.cwd.display()
                ),
                source: e,
            })?;

        Ok(Box::new(BackendProcess { child }))
    }
}

/// Handle to a running backend process
pub struct BackendProcess {
    child: Child,
}

#[async_trait]
impl ChildProcess for BackendProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn signal(&mut self, signal: Signal) -> Result<()> {
        let pid = self
            .child
            .id()
            .ok_or_else(|| Error::Backend("process has already exited".to_string()))?;

        kill(Pid::from_raw(pid as i32), signal).map_err(|e| {
            Error::Backend(format!("failed to send {} to pid {}: {}", signal.as_str(), pid, e))
        })
    }

    async fn wait(&mut self) -> Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }
}

/// Install SIGINT and SIGTERM handlers feeding a channel.
///
/// Once installed the default terminate-on-signal behaviour is gone for the
/// rest of the process, so call this only after the child exists.
pub fn termination_signals() -> Result<mpsc::UnboundedReceiver<Signal>> {
    let (tx, rx) = mpsc::unbounded_channel();

    for (kind, sig) in [
        (SignalKind::interrupt(), Signal::SIGINT),
        (SignalKind::terminate(), Signal::SIGTERM),
    ] {
        let mut stream = signal(kind)?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(sig).is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}

/// Forward `signal` to the child. A failed delivery is logged and dropped.
pub fn forward_signal(child: &mut dyn ChildProcess, signal: Signal) {
    info!("Forwarding {} to backend", signal.as_str());
    if let Err(e) = child.signal(signal) {
        warn!("Could not forward {}: {}", signal.as_str(), e);
    }
}

/// Wait for the child to exit, forwarding every received signal to it.
///
/// Returns the child's exit code, 0 when it has none.
pub async fn supervise(
    mut child: Box<dyn ChildProcess>,
    mut signals: mpsc::UnboundedReceiver<Signal>,
) -> Result<i32> {
    loop {
        tokio::select! {
            status = child.wait() => {
                let code = status?;
                info!("Backend exited with code {:?}", code);
                return Ok(code.unwrap_or(0));
            }
            Some(sig) = signals.recv() => {
                forward_signal(child.as_mut(), sig);
            }
        }
    }
}
