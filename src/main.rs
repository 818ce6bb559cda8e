//! `ffmerge` server binary

use ffmerge::logging::{LogFormat, init_tracing};
use ffmerge::{Config, MergeService};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(LogFormat::from_env())?;

    let config = Arc::new(Config::from_env()?);
    tracing::info!(
        address = %config.server.bind_address(),
        work_dir = ?config.artifacts.work_dir,
        "ffmerge starting"
    );

    let service = Arc::new(MergeService::new((*config).clone()).await?);

    let served =
        ffmerge::api::start_api_server(service.clone(), config, ffmerge::shutdown_signal()).await;

    // Clean up artifacts even when the server failed
    service.shutdown().await;
    served?;
    Ok(())
}
