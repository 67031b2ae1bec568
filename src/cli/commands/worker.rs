//! `image-orchestrator worker`: drains one logical queue through the
//! subtask-worker pool (C6), re-enqueuing on broker-retryable errors.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::adapters::image_api::{ImageApiConfig, ReqwestImageApiClient};
use crate::adapters::notify::{HttpWebhookNotifier, LoggingNotifier};
use crate::adapters::sqlite::{create_pool, PoolConfig, SqliteSubtaskRepository, SqliteTaskRepository};
use crate::application::worker::SubtaskWorker;
use crate::domain::ports::{ImageApiClient, Notifier, QueueName, SubtaskRepository, TaskRepository};
use crate::infrastructure::config::Config;

fn image_api_config(config: &Config) -> ImageApiConfig {
    ImageApiConfig {
        x_token: config.image_api.x_token.clone(),
        api_url: config.image_api.api_url.clone(),
        task_status_url: config.image_api.task_status_url.clone(),
        lumina_api_url: config.image_api.lumina_api_url.clone(),
        lumina_task_status_url: config.image_api.lumina_task_status_url.clone(),
        max_polling_attempts: config.image_api.max_polling_attempts,
        polling_interval: Duration::from_secs(config.image_api.polling_interval_secs),
        lumina_max_polling_attempts: config.image_api.lumina_max_polling_attempts,
        lumina_polling_interval: Duration::from_secs(config.image_api.lumina_polling_interval_secs),
        submit_timeout: Duration::from_secs(config.image_api.submit_timeout_secs),
        poll_timeout: Duration::from_secs(config.image_api.poll_timeout_secs),
        rate_limit_per_second: config.image_api.rate_limit_per_second,
    }
}

pub async fn execute(config: &Config, queue_arg: &str, concurrency: usize) -> Result<()> {
    let queue_name = match queue_arg {
        "normal" => QueueName::Normal,
        "ops" => QueueName::Ops,
        other => anyhow::bail!("unknown queue: {other} (expected \"normal\" or \"ops\")"),
    };

    let database_url = format!("sqlite:{}", config.database.path);
    let pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        ..PoolConfig::default()
    };
    let pool = create_pool(&database_url, Some(pool_config))
        .await
        .context("failed to create sqlite pool")?;

    let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let subtasks: Arc<dyn SubtaskRepository> = Arc::new(SqliteSubtaskRepository::new(pool));

    let redis = crate::adapters::redis::RedisQueueClient::connect(
        &config.queue.redis_url,
        config.queue.key_prefix.clone(),
    )
    .await
    .context("failed to connect to redis")?;

    let image_api: Arc<dyn ImageApiClient> = Arc::new(ReqwestImageApiClient::new(image_api_config(config)));
    let notifier: Arc<dyn Notifier> = match &config.notifier.webhook_url {
        Some(url) => Arc::new(HttpWebhookNotifier::new(url.clone())),
        None => Arc::new(LoggingNotifier),
    };

    let worker = Arc::new(SubtaskWorker::new(
        subtasks,
        tasks,
        image_api,
        notifier,
        config.dispatch.max_retries,
    ));
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    tracing::info!(queue = queue_arg, concurrency, "subtask worker pool started");

    loop {
        if let Err(err) = redis.promote_due(queue_name).await {
            warn!(error = %err, "failed to promote due delayed jobs");
        }

        match redis.pop(queue_name, 5.0).await {
            Ok(Some(job)) => {
                let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
                let worker = worker.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(err) = worker.process(job.subtask_id).await {
                        error!(subtask_id = %job.subtask_id, error = %err, "subtask processing failed, not redelivered (no broker redelivery in this adapter)");
                    }
                });
            }
            Ok(None) => {}
            Err(err) => {
                error!(error = %err, "queue pop failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
