use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sol_mm_engine::{BotManager, Database, EngineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env().context("loading engine configuration")?;

    let store = Database::connect(&config.database_url).await.context("connecting to store")?;
    store.init_schema().await.context("initializing schema")?;

    let manager = BotManager::new(config, store)?;
    manager.resume_all().await.context("resuming workers")?;

    let stats = manager.aggregate_stats().await?;
    info!(
        active = stats.active_workers,
        total = stats.total_bots,
        "engine running; press ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested; workers stop with the process");
    Ok(())
}
