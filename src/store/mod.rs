//! Durable store.
//!
//! PostgreSQL keeps the three tables the engine needs to survive restarts:
//! bot records (one per token mint), vault records, and the append-only bot
//! log with its per-mint retention trim. Each worker writes only its own
//! rows; the manager reads across all of them at boot.

pub mod models;
pub mod queries;

use deadpool_postgres::{Config, Pool, Runtime};
use thiserror::Error;
use tokio_postgres::{Config as TokioConfig, NoTls};
use tracing::info;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("invalid database configuration: {0}")]
    Config(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Connection-pool wrapper shared by the manager and every worker.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let tokio_config = database_url
            .parse::<TokioConfig>()
            .map_err(|e| StoreError::Config(format!("invalid database URL: {e}")))?;

        let mut config = Config::new();
        if let Some(dbname) = tokio_config.get_dbname() {
            config.dbname = Some(dbname.to_string());
        }
        if let Some(user) = tokio_config.get_user() {
            config.user = Some(user.to_string());
        }
        if let Some(password) = tokio_config.get_password() {
            config.password = Some(String::from_utf8_lossy(password).to_string());
        }
        if let Some(tokio_postgres::config::Host::Tcp(host)) = tokio_config.get_hosts().first() {
            config.host = Some(host.clone());
        }
        if let Some(port) = tokio_config.get_ports().first() {
            config.port = Some(*port);
        }
        config.pool =
            Some(deadpool_postgres::PoolConfig { max_size: 10, ..Default::default() });

        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
        client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("database connection established");
        Ok(Self { pool })
    }

    /// Creates the schema when absent. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
        client.batch_execute(SCHEMA_SQL).await?;
        info!("database schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS bots (
    token_mint TEXT PRIMARY KEY,
    vault_state_address TEXT NOT NULL,
    owner TEXT NOT NULL,
    strategy_name TEXT NOT NULL DEFAULT 'volume',
    strategy_config TEXT NOT NULL DEFAULT '{}',
    total_trades BIGINT NOT NULL DEFAULT 0,
    total_volume_sol DOUBLE PRECISION NOT NULL DEFAULT 0,
    last_trade_time TIMESTAMPTZ,
    status TEXT NOT NULL DEFAULT 'running'
);
CREATE INDEX IF NOT EXISTS idx_bots_owner ON bots(owner);

CREATE TABLE IF NOT EXISTS vaults (
    vault_state_address TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    nonce INT NOT NULL,
    lock_until BIGINT NOT NULL DEFAULT 0,
    strategy_id SMALLINT NOT NULL DEFAULT 0,
    token_mint TEXT,
    is_creator BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE INDEX IF NOT EXISTS idx_vaults_owner ON vaults(owner);

CREATE TABLE IF NOT EXISTS bot_logs (
    id BIGSERIAL PRIMARY KEY,
    bot_id TEXT NOT NULL,
    token_mint TEXT NOT NULL,
    message TEXT NOT NULL,
    level TEXT NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_bot_logs_mint_time ON bot_logs(token_mint, timestamp DESC);
"#;

pub use models::*;
