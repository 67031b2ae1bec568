//! `image-orchestrator migrate`: apply embedded SQL migrations.

use anyhow::{Context, Result};

use crate::adapters::sqlite::{all_embedded_migrations, create_pool, Migrator, PoolConfig};
use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::config::Config;

#[derive(Debug, serde::Serialize)]
pub struct MigrateOutput {
    pub applied: usize,
}

impl CommandOutput for MigrateOutput {
    fn to_human(&self) -> String {
        if self.applied == 0 {
            "Database already up to date.".to_string()
        } else {
            format!("Applied {} migration(s).", self.applied)
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let database_url = format!("sqlite:{}", config.database.path);
    let pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        ..PoolConfig::default()
    };
    let pool = create_pool(&database_url, Some(pool_config))
        .await
        .context("failed to create sqlite pool")?;

    let migrator = Migrator::new(pool);
    let applied = migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("failed to run migrations")?;

    output(&MigrateOutput { applied }, json_mode);
    Ok(())
}
