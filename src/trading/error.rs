//! Typed trade errors and the single classification point.
//!
//! Executors and the RPC facade produce free-text failures from many layers
//! (HTTP, JSON-RPC, program logs). `classify` is the one place that text is
//! interpreted; workers only ever branch on the resulting variant.

use std::time::Duration;
use thiserror::Error;

use crate::constants::trade::{
    BACKOFF_BASE_SECS, BACKOFF_CAP_SECS, BACKOFF_FACTOR, CURVE_COMPLETE_ERROR_CODE,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    /// RPC rate limiting that survived the facade's retry budget.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Timeouts, 5xx, refused connections.
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    /// The bonding curve signalled graduation; switch routing to the AMM.
    #[error("bonding curve complete")]
    PoolComplete,

    /// Pre-check or on-chain balance failure.
    #[error("insufficient funds: {0}")]
    FundsInsufficient(String),

    /// The venue rejected the price bounds.
    #[error("slippage exceeded: {0}")]
    SlippageExceeded(String),

    /// A required account does not exist.
    #[error("account missing: {0}")]
    AccountMissing(String),

    /// Invalid arguments, malformed data, unrecognized rejections.
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Maps raw failure text onto the taxonomy. Custom program error codes are
/// checked first; substring heuristics second; everything unrecognized is
/// fatal.
pub fn classify(text: &str) -> TradeError {
    if let Some(code) = custom_error_code(text) {
        if code == CURVE_COMPLETE_ERROR_CODE {
            return TradeError::PoolComplete;
        }
    }

    let lower = text.to_lowercase();
    if lower.contains("curve is complete") || lower.contains("bondingcurvecomplete") {
        return TradeError::PoolComplete;
    }
    if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit")
    {
        return TradeError::RateLimited(text.to_string());
    }
    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("503")
        || lower.contains("502")
        || lower.contains("unavailable")
    {
        return TradeError::TransientNetwork(text.to_string());
    }
    if lower.contains("insufficient") {
        return TradeError::FundsInsufficient(text.to_string());
    }
    if lower.contains("slippage") || lower.contains("price out of range") {
        return TradeError::SlippageExceeded(text.to_string());
    }
    if lower.contains("could not find account") || lower.contains("accountnotfound") {
        return TradeError::AccountMissing(text.to_string());
    }
    TradeError::Fatal(text.to_string())
}

/// Extracts `NNNN` from `custom program error: 0xNNNN`, the format the RPC
/// uses for Anchor error codes.
fn custom_error_code(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let idx = lower.find("custom program error: 0x")?;
    let hex = &lower[idx + "custom program error: 0x".len()..];
    let end = hex.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(hex.len());
    u32::from_str_radix(&hex[..end], 16).ok()
}

/// Per-worker failure backoff: `min(cap, base * factor^n)`.
pub fn failure_backoff(consecutive_failures: u32) -> Duration {
    let exp = BACKOFF_FACTOR.powi(consecutive_failures.min(20) as i32);
    let secs = (BACKOFF_BASE_SECS * exp).min(BACKOFF_CAP_SECS);
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_complete_code_maps_to_pool_complete() {
        let text = "Transaction simulation failed: Error processing Instruction 2: \
                    custom program error: 0x1775";
        assert_eq!(classify(text), TradeError::PoolComplete);
        assert_eq!(classify("Error: curve is complete"), TradeError::PoolComplete);
    }

    #[test]
    fn other_custom_codes_stay_fatal() {
        assert!(matches!(
            classify("custom program error: 0x1770"),
            TradeError::Fatal(_)
        ));
    }

    #[test]
    fn substring_heuristics() {
        assert!(matches!(classify("request timed out"), TradeError::TransientNetwork(_)));
        assert!(matches!(classify("HTTP 429 Too Many Requests"), TradeError::RateLimited(_)));
        assert!(matches!(
            classify("Transfer: insufficient lamports 12, need 100"),
            TradeError::FundsInsufficient(_)
        ));
        assert!(matches!(
            classify("exceeds desired slippage limit"),
            TradeError::SlippageExceeded(_)
        ));
        assert!(matches!(
            classify("Invalid param: could not find account"),
            TradeError::AccountMissing(_)
        ));
        assert!(matches!(classify("operator mismatch"), TradeError::Fatal(_)));
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(failure_backoff(0), Duration::from_secs_f64(5.0));
        assert_eq!(failure_backoff(1), Duration::from_secs_f64(7.5));
        assert!(failure_backoff(10) <= Duration::from_secs_f64(60.0));
        assert_eq!(failure_backoff(30), Duration::from_secs_f64(60.0));
    }
}
