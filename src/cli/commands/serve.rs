//! `image-orchestrator serve`: both subtask-worker pools (normal + ops)
//! and the task-monitor respawn sweep, in one process. The HTTP surface
//! itself lives in the `image-orchestrator-api` satellite crate (it
//! depends on this crate, so this crate cannot depend back on it) —
//! pair this with `image-orchestrator-serve` for a process that also
//! answers HTTP, or run this alone for a headless worker+monitor host.

use anyhow::{Context, Result};

use crate::cli::commands::AppContext;
use crate::infrastructure::config::Config;

pub async fn execute(config: &Config) -> Result<()> {
    let ctx = AppContext::bootstrap(config)
        .await
        .context("failed to bootstrap application context")?;

    ctx.service
        .respawn_monitors()
        .await
        .context("failed to respawn monitors for in-flight tasks")?;

    let normal_config = config.clone();
    let normal = tokio::spawn(async move {
        if let Err(err) = super::worker::execute(&normal_config, "normal", 4).await {
            tracing::error!(error = %err, "normal subtask worker pool exited");
        }
    });

    let ops_config = config.clone();
    let ops = tokio::spawn(async move {
        if let Err(err) = super::worker::execute(&ops_config, "ops", 2).await {
            tracing::error!(error = %err, "ops subtask worker pool exited");
        }
    });

    let monitor_config = config.clone();
    let monitor = tokio::spawn(async move {
        if let Err(err) = super::monitor::execute(&monitor_config).await {
            tracing::error!(error = %err, "monitor respawn sweep exited");
        }
    });

    let _ = tokio::try_join!(normal, ops, monitor);
    Ok(())
}
