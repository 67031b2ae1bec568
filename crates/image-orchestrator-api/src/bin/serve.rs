//! `image-orchestrator-serve`: the HTTP API, both subtask-worker pools
//! (normal + ops), and the task-monitor respawn sweep, all in one
//! process. Reuses the exact building blocks the `image-orchestrator`
//! core binary's `worker`/`monitor` subcommands use, so the two deployment
//! shapes (split processes vs. one process) share one implementation.

use anyhow::{Context, Result};
use image_orchestrator::cli::commands::{self, AppContext};
use image_orchestrator::infrastructure::config::ConfigLoader;
use image_orchestrator::infrastructure::logging::{LogConfig, LoggerImpl};
use image_orchestrator_api::{serve, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    let _logger =
        LoggerImpl::init(&LogConfig::from(&config.logging)).context("failed to initialize logging")?;

    let ctx = AppContext::bootstrap(&config)
        .await
        .context("failed to bootstrap application context")?;

    ctx.service
        .respawn_monitors()
        .await
        .context("failed to respawn monitors for in-flight tasks")?;

    let normal_config = config.clone();
    tokio::spawn(async move {
        if let Err(err) = commands::worker::execute(&normal_config, "normal", 4).await {
            tracing::error!(error = %err, "normal subtask worker pool exited");
        }
    });

    let ops_config = config.clone();
    tokio::spawn(async move {
        if let Err(err) = commands::worker::execute(&ops_config, "ops", 2).await {
            tracing::error!(error = %err, "ops subtask worker pool exited");
        }
    });

    let monitor_config = config.clone();
    tokio::spawn(async move {
        if let Err(err) = commands::monitor::execute(&monitor_config).await {
            tracing::error!(error = %err, "monitor respawn sweep exited");
        }
    });

    let state = AppState {
        service: ctx.service.clone(),
        bearer_token: config.server.bearer_token.clone(),
    };

    serve(&config.server.bind_address, state).await
}
