//! `image-orchestrator monitor`: respawns a `TaskMonitor` for every task
//! still `processing`, then stays up re-sweeping periodically so a task
//! whose monitor died for any reason is picked back up (Design Notes §9:
//! monitor respawn is idempotent, state lives in the database).

use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use crate::cli::commands::AppContext;
use crate::infrastructure::config::Config;

const RESWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub async fn execute(config: &Config) -> Result<()> {
    let ctx = AppContext::bootstrap(config).await?;

    loop {
        if let Err(err) = ctx.service.respawn_monitors().await {
            error!(error = %err, "monitor respawn sweep failed");
        } else {
            info!("monitor respawn sweep complete");
        }
        tokio::time::sleep(RESWEEP_INTERVAL).await;
    }
}
