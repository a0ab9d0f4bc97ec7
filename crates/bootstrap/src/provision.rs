//! Cache and database container provisioning
//!
//! The cache is reused when already running since its contents never affect
//! test outcomes. The database is always recreated so every run starts from
//! an empty, freshly seeded schema.

use tracing::info;

use devstack_common::config::{CacheConfig, DatabaseConfig};
use devstack_common::Result;

use crate::command::CommandRunner;
use crate::runtime::{ContainerCli, ContainerSpec, PortMapping};

/// Container definition for the cache
pub fn cache_spec(cache: &CacheConfig) -> ContainerSpec {
    ContainerSpec {
        ports: vec![PortMapping {
            host: cache.host_port,
            container: cache.container_port,
        }],
        ..ContainerSpec::new(&cache.container_name, &cache.image)
    }
}

/// Container definition for the database
///
/// A non-root `user` is created by the image with full rights on the
/// database, sharing the root password.
pub fn database_spec(database: &DatabaseConfig) -> ContainerSpec {
    let mut args = Vec::new();
    if let Some(plugin) = &database.auth_plugin {
        args.push(format!("--default-authentication-plugin={}", plugin));
    }

    let mut env = vec![
        ("MYSQL_ROOT_PASSWORD".to_string(), database.password.clone()),
        ("MYSQL_DATABASE".to_string(), database.database.clone()),
    ];
    // the image refuses MYSQL_USER=root
    if database.user != "root" {
        env.push(("MYSQL_USER".to_string(), database.user.clone()));
        env.push(("MYSQL_PASSWORD".to_string(), database.password.clone()));
    }

    ContainerSpec {
        env,
        ports: vec![PortMapping {
            host: database.host_port,
            container: database.container_port,
        }],
        args,
        ..ContainerSpec::new(&database.container_name, &database.image)
    }
}

/// Start the cache container unless it is already running.
pub async fn ensure_cache<R: CommandRunner>(
    cli: &ContainerCli<R>,
    cache: &CacheConfig,
) -> Result<()> {
    if cli.is_running(&cache.container_name).await {
        info!("Reusing running cache container {}", cache.container_name);
        return Ok(());
    }

    // a stopped container with the same name would block `run`
    cli.remove_force(&cache.container_name).await;

    info!(
        "Starting cache container {} ({}) on port {}",
        cache.container_name, cache.image, cache.host_port
    );
    cli.run_container(&cache_spec(cache)).await
}

/// Recreate the database container from scratch.
pub async fn ensure_database<R: CommandRunner>(
    cli: &ContainerCli<R>,
    database: &DatabaseConfig,
) -> Result<()> {
    cli.remove_force(&database.container_name).await;

    info!(
        "Starting database container {} ({}) on port {}",
        database.container_name, database.image, database.host_port
    );
    cli.run_container(&database_spec(database)).await
}
