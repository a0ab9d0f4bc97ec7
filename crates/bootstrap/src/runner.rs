//! Bootstrap pipeline that provisions dependencies and supervises the backend

use nix::sys::signal::Signal;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use devstack_common::{Result, StackConfig};

use crate::backend::{supervise, BackendLauncher, LaunchSpec};
use crate::command::CommandRunner;
use crate::provision::{ensure_cache, ensure_database};
use crate::readiness::{wait_for_database, PollPolicy};
use crate::runtime::ContainerCli;
use crate::seed::{seed_database, SeedFiles};

/// Runs the bootstrap steps strictly in order, stopping at the first failure
pub struct Bootstrapper<R, L> {
    config: StackConfig,
    repo_root: PathBuf,
    cli: ContainerCli<R>,
    launcher: L,
}

impl<R: CommandRunner, L: BackendLauncher> Bootstrapper<R, L> {
    pub fn new(config: StackConfig, repo_root: impl Into<PathBuf>, runner: R, launcher: L) -> Self {
        let cli = ContainerCli::new(runner, config.runtime.program.clone());
        Self {
            config,
            repo_root: repo_root.into(),
            cli,
            launcher,
        }
    }

    /// Runtime check, cache, database, readiness wait and seeding.
    ///
    /// Returns the SQL file that was loaded.
    pub async fn provision(&self) -> Result<PathBuf> {
        info!("[1/6] Checking container runtime ({})", self.cli.program());
        self.cli.ensure_available().await?;

        info!("[2/6] Ensuring cache container {}", self.config.cache.container_name);
        ensure_cache(&self.cli, &self.config.cache).await?;

        info!("[3/6] Recreating database container {}", self.config.database.container_name);
        ensure_database(&self.cli, &self.config.database).await?;

        info!(
            "[4/6] Waiting for database (timeout {}s)",
            self.config.readiness.timeout_secs
        );
        let attempts = wait_for_database(
            &self.cli,
            &self.config.database,
            PollPolicy::from(&self.config.readiness),
        )
        .await?;
        info!("Database ready after {} probe(s)", attempts);

        info!("[5/6] Seeding schema");
        let files = SeedFiles::from_config(&self.repo_root, &self.config.seed);
        seed_database(
            &self.cli,
            &self.config.database,
            &files,
            &self.config.seed.container_dir,
        )
        .await
    }

    /// Launch spec for the backend given the parent environment
    pub fn launch_spec<I, K, V>(&self, parent_env: I) -> LaunchSpec
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        LaunchSpec::for_backend(
            &self.repo_root,
            &self.config.backend,
            &self.config.database,
            parent_env,
        )
    }

    /// Provision everything, start the backend and supervise it until exit.
    ///
    /// `signals` is invoked only once the backend is running, so signals
    /// during setup keep their default behaviour. Returns the exit code the
    /// bootstrapper should exit with.
    pub async fn up<I, K, V, S>(&self, parent_env: I, signals: S) -> Result<i32>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
        S: FnOnce() -> Result<mpsc::UnboundedReceiver<Signal>>,
    {
        self.provision().await?;

        let spec = self.launch_spec(parent_env);
        info!(
            "[6/6] Starting backend: {} {} (in {})",
            spec.program,
            spec.args.join(" "),
            spec.cwd.display()
        );
        let child = self.launcher.launch(&spec)?;
        if let Some(pid) = child.id() {
            info!("Backend started with PID {}", pid);
        }

        let signals = signals()?;
        supervise(child, signals).await
    }
}
