//! devstack - start the backend with its dependencies
//!
//! Provisions the cache and database containers, seeds the schema, then runs
//! the backend in the foreground until it exits.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use devstack_bootstrap::backend::termination_signals;
use devstack_bootstrap::readiness::wait_for_api;
use devstack_bootstrap::{ApiWait, Bootstrapper, PollPolicy, ProcessLauncher, SystemRunner};
use devstack_common::{env, StackConfig, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "devstack")]
#[command(about = "Provision local dependencies and run the backend under test")]
#[command(version)]
struct Cli {
    /// Repository root containing sql/ and backend/
    #[arg(long, env = "DEVSTACK_REPO_ROOT", default_value = ".", global = true)]
    repo_root: PathBuf,

    /// Configuration file path (default: <repo-root>/devstack.toml)
    #[arg(short, long, env = "DEVSTACK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Container runtime CLI, overrides the config file
    #[arg(long, env = "DEVSTACK_RUNTIME", global = true)]
    runtime: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision dependencies, then run and supervise the backend (default)
    Up,

    /// Provision and seed dependencies without starting the backend
    Provision,

    /// Wait until the backend API answers
    WaitApi(WaitApiArgs),

    /// Print the datastore environment the backend would receive
    PrintEnv,
}

#[derive(Args)]
struct WaitApiArgs {
    /// Backend base URL
    #[arg(long, env = "API_URL", default_value = "http://127.0.0.1:5050")]
    api_url: String,

    /// Path probed with GET
    #[arg(long, default_value = "/docs")]
    probe_path: String,

    /// Total time to wait in milliseconds
    #[arg(long, env = "API_WAIT_TIMEOUT_MS", default_value_t = 60_000)]
    timeout_ms: u64,

    /// Delay between probes in milliseconds
    #[arg(long, default_value_t = 1_000)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = run(cli).await?;
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    // only the implicit repo-root file may be absent
    let mut config = match &cli.config {
        Some(path) => StackConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => {
            let path = cli.repo_root.join(DEFAULT_CONFIG_FILE);
            StackConfig::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
    };
    if let Some(runtime) = cli.runtime {
        config.runtime.program = runtime;
    }

    let bootstrapper = Bootstrapper::new(config, cli.repo_root, SystemRunner, ProcessLauncher);

    match cli.command.unwrap_or(Commands::Up) {
        Commands::Up => {
            let code = bootstrapper
                .up(std::env::vars_os(), termination_signals)
                .await
                .context("devstack up failed")?;
            Ok(code)
        }
        Commands::Provision => {
            let seeded = bootstrapper
                .provision()
                .await
                .context("devstack provision failed")?;
            info!("Dependencies ready, seeded from {}", seeded.display());
            Ok(0)
        }
        Commands::WaitApi(args) => {
            let wait = ApiWait {
                api_url: args.api_url,
                probe_path: args.probe_path,
                policy: PollPolicy {
                    interval: Duration::from_millis(args.interval_ms),
                    timeout: Duration::from_millis(args.timeout_ms),
                },
            };
            wait_for_api(&wait).await?;
            info!("Backend reachable at {}", wait.api_url);
            Ok(0)
        }
        Commands::PrintEnv => {
            let spec = bootstrapper.launch_spec(std::env::vars_os());
            for key in [
                env::PORT,
                env::DATABASE_HOST,
                env::DATABASE_PORT,
                env::DATABASE_USER_NAME,
                env::DATABASE_PASSWORD,
                env::DATABASE_NAME,
                env::CACHE_MODE,
                env::GOOGLE_CLOUD_STORAGE,
            ] {
                if let Some(value) = spec.env.get(OsStr::new(key)) {
                    println!("{}={}", key, value.to_string_lossy());
                }
            }
            Ok(0)
        }
    }
}
