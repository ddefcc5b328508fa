//! Row types for the durable store.
//!
//! Pubkeys are stored as base58 text; the engine parses them at the edges
//! so a corrupted row surfaces as an error instead of a panic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Running,
    Stopped,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStatus::Running => "running",
            BotStatus::Stopped => "stopped",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "running" => BotStatus::Running,
            _ => BotStatus::Stopped,
        }
    }
}

/// One durable bot per token mint. Exactly one live worker exists per
/// record with `status = running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotRecord {
    pub token_mint: String,
    pub vault_state_address: String,
    pub owner: String,
    pub strategy_name: String,
    /// Opaque JSON blob; parsed by the engine into strategy settings.
    pub strategy_config: String,
    pub total_trades: i64,
    pub total_volume_sol: f64,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub status: BotStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRecord {
    pub vault_state_address: String,
    pub owner: String,
    /// 0..=99, unique per owner.
    pub nonce: i32,
    pub lock_until: i64,
    pub strategy_id: i16,
    pub token_mint: Option<String>,
    pub is_creator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotLogRecord {
    pub id: i64,
    pub bot_id: String,
    pub token_mint: String,
    pub message: String,
    pub level: String,
    pub timestamp: DateTime<Utc>,
}
