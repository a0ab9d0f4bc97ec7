//! Stack configuration
//!
//! Every section has a `Default` that reproduces the fixed local stack the
//! smoke suite expects, so a missing config file means "use the defaults".

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Top-level stack configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Container runtime CLI
    pub runtime: RuntimeConfig,

    /// Cache container
    pub cache: CacheConfig,

    /// Database container
    pub database: DatabaseConfig,

    /// Database readiness polling
    pub readiness: ReadinessConfig,

    /// Schema/seed files
    pub seed: SeedConfig,

    /// Backend process under test
    pub backend: BackendConfig,
}

/// Container runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// CLI program name (docker or podman)
    pub program: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

/// Cache (Redis) container configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub container_name: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            container_name: "digibot-redis".to_string(),
            image: "redis:7-alpine".to_string(),
            host_port: 6379,
            container_port: 6379,
        }
    }
}

/// Database (MySQL) container configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub container_name: String,
    pub image: String,

    /// Address the backend uses to reach the published port
    pub host: String,
    pub host_port: u16,
    pub container_port: u16,

    pub user: String,
    pub password: String,
    pub database: String,

    /// Authentication plugin passed to mysqld; the backend's driver needs
    /// native password auth.
    pub auth_plugin: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            container_name: "digibot-mysql".to_string(),
            image: "mysql:5.7".to_string(),
            host: "127.0.0.1".to_string(),
            host_port: 3307,
            container_port: 3306,
            user: "root".to_string(),
            password: "root".to_string(),
            database: "community_aid".to_string(),
            auth_plugin: Some("mysql_native_password".to_string()),
        }
    }
}

/// Readiness polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Delay between probe attempts
    pub interval_ms: u64,

    /// Total time allowed before giving up
    pub timeout_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            timeout_secs: 120,
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Seed file locations, relative to the repository root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Full dump: table definitions plus seed data (preferred)
    pub dump: PathBuf,

    /// Schema-only fallback
    pub schema: PathBuf,

    /// Directory inside the container the file is copied to
    pub container_dir: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            dump: PathBuf::from("sql/dml.sql"),
            schema: PathBuf::from("sql/ddl.sql"),
            container_dir: "/tmp".to_string(),
        }
    }
}

/// Backend process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Working directory, relative to the repository root
    pub dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,

    /// Listen port used when the environment does not set PORT.
    /// Kept at 5050 so the smoke tests find the API.
    pub default_port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backend"),
            program: "node".to_string(),
            args: vec!["server.js".to_string()],
            default_port: 5050,
        }
    }
}

impl StackConfig {
    /// Load configuration from a file that must exist
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
