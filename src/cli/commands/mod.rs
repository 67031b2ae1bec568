//! Command handlers, one module per top-level subcommand.

pub mod migrate;
pub mod monitor;
pub mod serve;
pub mod task;
pub mod worker;

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::notify::{HttpWebhookNotifier, LoggingNotifier};
use crate::adapters::redis::RedisQueueClient;
use crate::adapters::sqlite::{create_pool, PoolConfig, SqliteSubtaskRepository, SqliteTaskRepository};
use crate::application::expansion::Expander;
use crate::application::service::OrchestratorService;
use crate::domain::ports::{Notifier, QueueClient, SubtaskRepository, TaskRepository};
use crate::infrastructure::config::Config;

/// Everything a command handler needs: the shared SQLite pool (for
/// handlers that talk to repositories directly) plus a ready-to-use
/// service facade.
pub struct AppContext {
    pub pool: SqlitePool,
    pub service: Arc<OrchestratorService>,
    pub queue: Arc<RedisQueueClient>,
}

impl AppContext {
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        let database_url = format!("sqlite:{}", config.database.path);
        let pool_config = PoolConfig {
            max_connections: config.database.max_connections,
            idle_timeout: std::time::Duration::from_secs(config.database.stale_timeout_secs),
            ..PoolConfig::default()
        };
        let pool = create_pool(&database_url, Some(pool_config))
            .await
            .context("failed to create sqlite pool")?;

        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let subtasks: Arc<dyn SubtaskRepository> = Arc::new(SqliteSubtaskRepository::new(pool.clone()));

        let redis = RedisQueueClient::connect(&config.queue.redis_url, config.queue.key_prefix.clone())
            .await
            .context("failed to connect to redis")?;
        let queue = Arc::new(redis);
        let queue_port: Arc<dyn QueueClient> = queue.clone();

        let notifier: Arc<dyn Notifier> = match &config.notifier.webhook_url {
            Some(url) => Arc::new(HttpWebhookNotifier::new(url.clone())),
            None => Arc::new(LoggingNotifier),
        };

        let service = Arc::new(OrchestratorService::new(
            tasks,
            subtasks,
            queue_port,
            notifier,
            Expander::default(),
        ));

        Ok(Self { pool, service, queue })
    }
}
