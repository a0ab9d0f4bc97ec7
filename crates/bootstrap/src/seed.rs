//! Schema and seed data loading

use std::path::{Path, PathBuf};
use tracing::info;

use devstack_common::config::{DatabaseConfig, SeedConfig};
use devstack_common::{Error, Result};

use crate::command::CommandRunner;
use crate::runtime::ContainerCli;

/// Candidate SQL files on the host
#[derive(Debug, Clone)]
pub struct SeedFiles {
    /// Table definitions plus seed data
    pub dump: PathBuf,

    /// Table definitions only
    pub schema: PathBuf,
}

impl SeedFiles {
    pub fn from_config(repo_root: &Path, seed: &SeedConfig) -> Self {
        Self {
            dump: repo_root.join(&seed.dump),
            schema: repo_root.join(&seed.schema),
        }
    }

    /// Pick the full dump when present, otherwise the schema-only file.
    pub fn resolve(&self) -> Result<&Path> {
        if self.dump.exists() {
            return Ok(&self.dump);
        }
        if self.schema.exists() {
            return Ok(&self.schema);
        }
        Err(Error::MissingSchema(self.schema.clone()))
    }
}

/// Copy `sql_file` into the database container and execute it against the
/// configured database.
pub async fn load_sql_file<R: CommandRunner>(
    cli: &ContainerCli<R>,
    database: &DatabaseConfig,
    sql_file: &Path,
    container_dir: &str,
) -> Result<()> {
    let base = sql_file
        .file_name()
        .ok_or_else(|| Error::InvalidConfig(format!("not a file path: {}", sql_file.display())))?
        .to_string_lossy();
    let container_path = format!("{}/{}", container_dir.trim_end_matches('/'), base);

    info!("Loading {} into {}", sql_file.display(), database.database);

    cli.copy_into(sql_file, &database.container_name, &container_path).await?;

    let script = format!(
        "mysql -u{} -p{} {} < {}",
        database.user, database.password, database.database, container_path
    );
    cli.exec(
        &database.container_name,
        &["sh".to_string(), "-lc".to_string(), script],
    )
    .await
}

/// Resolve the seed file and load it. Nothing is copied or executed when
/// neither file exists.
pub async fn seed_database<R: CommandRunner>(
    cli: &ContainerCli<R>,
    database: &DatabaseConfig,
    files: &SeedFiles,
    container_dir: &str,
) -> Result<PathBuf> {
    let chosen = files.resolve()?;
    load_sql_file(cli, database, chosen, container_dir).await?;
    Ok(chosen.to_path_buf())
}
