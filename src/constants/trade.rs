//! Trading defaults and engine-wide tuning constants.

/// Default slippage tolerance in basis points (5%).
pub const DEFAULT_SLIPPAGE_BPS: u64 = 500;

/// DEX custom error code signalling that the bonding curve is complete.
pub const CURVE_COMPLETE_ERROR_CODE: u32 = 6005; // 0x1775

/// Protocol trading fee charged by the DEX, in basis points.
pub const DEX_FEE_BPS: u64 = 100;

/// Poll interval while a worker waits for funds.
pub const WAITING_POLL_SECS: u64 = 3;

/// Interval of the manager's background backfill scan.
pub const BACKFILL_SCAN_SECS: u64 = 10;

/// Consecutive 404s on the mint or curve token account before a bot is
/// marked inactive and its worker halts.
pub const ACCOUNT_MISSING_STRIKES: u32 = 3;

/// Per-worker failure backoff: `min(BACKOFF_CAP, BACKOFF_BASE * 1.5^n)`.
pub const BACKOFF_BASE_SECS: f64 = 5.0;
pub const BACKOFF_FACTOR: f64 = 1.5;
pub const BACKOFF_CAP_SECS: f64 = 60.0;

/// Rate-limit retry policy inside the RPC facade.
pub const RATE_LIMIT_MAX_RETRIES: u32 = 5;
pub const RATE_LIMIT_CAP_MS: u64 = 10_000;
pub const RATE_LIMIT_BASE_MS: u64 = 500;

/// Rows kept per mint in the bot log table.
pub const LOG_RETENTION_PER_MINT: i64 = 1_000;

/// Fallback expectation when reserves read back stale or zero: assume the
/// trade moves this many base-unit tokens, never less than one.
pub const NOMINAL_TOKENS_PER_TRADE: u64 = 100_000;

/// Compute-budget prologue applied to every composed transaction.
pub const COMPUTE_UNIT_LIMIT: u32 = 250_000;
pub const COMPUTE_UNIT_PRICE_MICRO_LAMPORTS: u64 = 100_000;

/// Safety margin applied under the on-chain trade-size ceiling so rounding
/// on the program side never rejects a boundary-sized trade.
pub const SIZE_CEILING_MARGIN: f64 = 0.95;

/// `get_multiple_accounts` batch width used by the brute-force pool scan.
pub const POOL_SCAN_BATCH: usize = 10;

/// Highest brute-force pool index probed (inclusive range `0..POOL_SCAN_MAX`).
pub const POOL_SCAN_MAX: u16 = 100;
