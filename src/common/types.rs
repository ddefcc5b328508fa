//! Engine configuration, loaded once from the process environment.

use std::time::Duration;

use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub type SolanaRpcClient = solana_client::nonblocking::rpc_client::RpcClient;
pub type AnyResult<T> = anyhow::Result<T>;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Errors raised while reading the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Process-wide engine configuration.
///
/// | Variable | Meaning | Default |
/// |----------|---------|---------|
/// | `RPC_URL` | primary RPC endpoint | required |
/// | `RPC_WS_URL` | websocket endpoint for account subscriptions | none |
/// | `DATABASE_URL` | PostgreSQL connection string | required |
/// | `CUSTODY_PROGRAM_ID` | deployed custody program | required |
/// | `MIN_GAS_RESERVE_SOL` | SOL left untouched in every vault | `0.01` |
/// | `FEE_CLAIM_INTERVAL_HOURS` | creator-fee claim cadence | `24` |
/// | `COMMITMENT` | `processed` / `confirmed` / `finalized` | `confirmed` |
///
/// `OPERATOR_SECRET` is read separately by [`crate::common::signer`] so the
/// key material never lands in a `Debug`-printable struct.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub rpc_url: String,
    pub rpc_ws_url: Option<String>,
    pub database_url: String,
    pub custody_program: Pubkey,
    pub commitment: CommitmentConfig,
    pub min_gas_reserve_lamports: u64,
    pub fee_claim_interval: Duration,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc_url = require("RPC_URL")?;
        let database_url = require("DATABASE_URL")?;
        let custody_program = require("CUSTODY_PROGRAM_ID")?
            .parse::<Pubkey>()
            .map_err(|e| ConfigError::InvalidValue("CUSTODY_PROGRAM_ID".into(), e.to_string()))?;

        let rpc_ws_url = std::env::var("RPC_WS_URL").ok().filter(|s| !s.trim().is_empty());

        let min_gas_reserve_sol = optional_parse::<f64>("MIN_GAS_RESERVE_SOL")?.unwrap_or(0.01);
        if !(0.0..1_000.0).contains(&min_gas_reserve_sol) {
            return Err(ConfigError::InvalidValue(
                "MIN_GAS_RESERVE_SOL".into(),
                min_gas_reserve_sol.to_string(),
            ));
        }

        let fee_claim_hours = optional_parse::<u64>("FEE_CLAIM_INTERVAL_HOURS")?.unwrap_or(24);

        let commitment = match std::env::var("COMMITMENT").as_deref() {
            Ok("processed") => CommitmentConfig::processed(),
            Ok("finalized") => CommitmentConfig::finalized(),
            Ok("confirmed") | Err(_) => CommitmentConfig::confirmed(),
            Ok(other) => {
                return Err(ConfigError::InvalidValue("COMMITMENT".into(), other.to_string()));
            }
        };

        Ok(Self {
            rpc_url,
            rpc_ws_url,
            database_url,
            custody_program,
            commitment,
            min_gas_reserve_lamports: (min_gas_reserve_sol * LAMPORTS_PER_SOL as f64) as u64,
            fee_claim_interval: Duration::from_secs(fee_claim_hours * 3_600),
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        _ => Ok(None),
    }
}

/// Lamports for a SOL amount, flooring sub-lamport dust.
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64) as u64
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
