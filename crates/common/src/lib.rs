//! devstack Common Library
//!
//! Shared error type, stack configuration and the backend environment
//! overlay used by the bootstrapper.

pub mod config;
pub mod env;
pub mod error;

pub use config::StackConfig;
pub use env::{backend_env, EnvMap};
pub use error::{Error, Result};

/// Default config file name, looked up in the repository root
pub const DEFAULT_CONFIG_FILE: &str = "devstack.toml";
