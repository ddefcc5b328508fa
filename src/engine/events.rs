//! Live log events.
//!
//! Every worker decision that touches durable state is emitted here first:
//! appended to the store (trimmed per mint) and broadcast to any number of
//! listeners. The broadcast side is best-effort and never blocks a worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Trade,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Trade => "trade",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub token_mint: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(token_mint: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self { token_mint: token_mint.into(), level, message: message.into(), timestamp: Utc::now() }
    }
}
