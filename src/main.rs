//! `image-orchestrator` CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use image_orchestrator::cli::commands::{migrate, monitor, serve, task, worker};
use image_orchestrator::cli::{Cli, Commands, TaskCommands};
use image_orchestrator::infrastructure::config::ConfigLoader;
use image_orchestrator::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };

    let _logger =
        LoggerImpl::init(&LogConfig::from(&config.logging)).context("failed to initialize logging")?;

    match cli.command {
        Commands::Serve => serve::execute(&config).await,
        Commands::Worker { queue, concurrency } => worker::execute(&config, &queue, concurrency).await,
        Commands::Monitor => monitor::execute(&config).await,
        Commands::Migrate => migrate::execute(&config, cli.json).await,
        Commands::Task(task_cmd) => match task_cmd {
            TaskCommands::Submit { spec_file, user } => {
                task::submit(&config, &spec_file, &user, cli.json).await
            }
            TaskCommands::List {
                status,
                page,
                page_size,
            } => task::list(&config, status, page, page_size, cli.json).await,
            TaskCommands::Show { id } => task::show(&config, &id, cli.json).await,
            TaskCommands::Cancel { id } => task::cancel(&config, &id, cli.json).await,
            TaskCommands::Matrix { id } => task::matrix(&config, &id).await,
        },
    }
}
