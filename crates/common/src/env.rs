//! Backend environment overlay
//!
//! The backend is started with the parent's environment plus a fixed set of
//! overrides pointing its datastore at the provisioned containers. The
//! overlay is computed as a new map; the bootstrapper's own environment is
//! never mutated.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use crate::config::{BackendConfig, DatabaseConfig};

pub const PORT: &str = "PORT";
pub const DATABASE_HOST: &str = "DATABASE_HOST";
pub const DATABASE_PORT: &str = "DATABASE_PORT";
pub const DATABASE_USER_NAME: &str = "DATABASE_USER_NAME";
pub const DATABASE_PASSWORD: &str = "DATABASE_PASSWORD";
pub const DATABASE_NAME: &str = "DATABASE_NAME";
pub const CACHE_MODE: &str = "CACHE_MODE";
pub const GOOGLE_CLOUD_STORAGE: &str = "GOOGLE_CLOUD_STORAGE";

/// Environment handed to the backend process
pub type EnvMap = BTreeMap<OsString, OsString>;

/// Build the backend environment from the parent environment.
///
/// Datastore keys are always overridden. `PORT`, `CACHE_MODE` and
/// `GOOGLE_CLOUD_STORAGE` keep a non-empty parent value and otherwise fall
/// back to their stable defaults (cache and cloud storage disabled).
pub fn backend_env<I, K, V>(parent: I, database: &DatabaseConfig, backend: &BackendConfig) -> EnvMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<OsString>,
    V: Into<OsString>,
{
    let mut env: EnvMap = parent
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();

    let port = inherited_or(&env, PORT, &backend.default_port.to_string());
    let cache_mode = inherited_or(&env, CACHE_MODE, "0");
    let cloud_storage = inherited_or(&env, GOOGLE_CLOUD_STORAGE, "0");

    let overrides: [(&str, OsString); 8] = [
        (PORT, port),
        (DATABASE_HOST, database.host.clone().into()),
        (DATABASE_PORT, database.host_port.to_string().into()),
        (DATABASE_USER_NAME, database.user.clone().into()),
        (DATABASE_PASSWORD, database.password.clone().into()),
        (DATABASE_NAME, database.database.clone().into()),
        (CACHE_MODE, cache_mode),
        (GOOGLE_CLOUD_STORAGE, cloud_storage),
    ];

    for (key, value) in overrides {
        env.insert(key.into(), value);
    }

    env
}

fn inherited_or(env: &EnvMap, key: &str, default: &str) -> OsString {
    match env.get(OsStr::new(key)) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => OsString::from(default),
    }
}
