//! Readiness polling for the database container and the backend API

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use devstack_common::config::{DatabaseConfig, ReadinessConfig};
use devstack_common::{Error, Result};

use crate::command::CommandRunner;
use crate::runtime::ContainerCli;

/// Fixed-interval polling bounded by a total timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&ReadinessConfig> for PollPolicy {
    fn from(config: &ReadinessConfig) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }
}

/// Call `probe` until it reports ready, sleeping `interval` between
/// attempts. No attempt is started once `timeout` has elapsed.
///
/// Returns the number of attempts made.
pub async fn poll_until<F, Fut>(what: &str, policy: PollPolicy, mut probe: F) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let mut attempts = 0;

    while start.elapsed() < policy.timeout {
        attempts += 1;

        if probe().await {
            debug!("{} ready after {} attempt(s)", what, attempts);
            return Ok(attempts);
        }

        if attempts == 1 {
            info!("Waiting for {}...", what);
        }

        sleep(policy.interval).await;
    }

    Err(Error::Timeout {
        what: what.to_string(),
        seconds: policy.timeout.as_secs(),
    })
}

/// Arguments of the in-container liveness probe
pub fn database_ping_command(database: &DatabaseConfig) -> Vec<String> {
    vec![
        "mysqladmin".to_string(),
        format!("-u{}", database.user),
        format!("-p{}", database.password),
        "ping".to_string(),
        "-h".to_string(),
        "127.0.0.1".to_string(),
    ]
}

/// Poll `mysqladmin ping` inside the database container
pub async fn wait_for_database<R: CommandRunner>(
    cli: &ContainerCli<R>,
    database: &DatabaseConfig,
    policy: PollPolicy,
) -> Result<u32> {
    let ping = database_ping_command(database);
    let what = format!("database container {}", database.container_name);

    poll_until(&what, policy, || cli.exec_succeeds(&database.container_name, &ping)).await
}

/// Backend API readiness settings
#[derive(Debug, Clone)]
pub struct ApiWait {
    /// Base URL of the backend API
    pub api_url: String,

    /// Path probed with GET; served without auth
    pub probe_path: String,

    pub policy: PollPolicy,
}

impl Default for ApiWait {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5050".to_string(),
            probe_path: "/docs".to_string(),
            policy: PollPolicy {
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(60),
            },
        }
    }
}

/// Poll the backend until `GET <api_url><probe_path>` returns a 2xx status
pub async fn wait_for_api(wait: &ApiWait) -> Result<u32> {
    let probe_url = reqwest::Url::parse(&wait.api_url)
        .and_then(|base| base.join(&wait.probe_path))
        .map_err(|e| Error::InvalidConfig(format!("invalid API URL {}: {}", wait.api_url, e)))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

    let result = poll_until("backend API", wait.policy, || {
        let request = client.get(probe_url.clone());
        async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => true,
                Ok(resp) => {
                    warn!("Readiness probe returned {}", resp.status());
                    false
                }
                Err(e) => {
                    // connection refused is expected while the backend starts
                    if !e.is_connect() {
                        warn!("Readiness probe error: {}", e);
                    }
                    false
                }
            }
        }
    })
    .await;

    match result {
        Err(Error::Timeout { .. }) => Err(Error::ApiUnreachable(
            [
                "Backend not reachable for smoke tests.".to_string(),
                format!("Expected API at: {}", wait.api_url),
                format!("Tried: GET {} for {}ms", probe_url, wait.policy.timeout.as_millis()),
                "Start your backend separately (devstack up), then re-run the smoke tests with:"
                    .to_string(),
                format!("  API_URL={} npm test -- --project=chromium tests/smoke", wait.api_url),
            ]
            .join("\n"),
        )),
        other => other,
    }
}
