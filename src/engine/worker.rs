//! Per-token worker.
//!
//! One infinite, self-healing loop per token mint. The worker alternates
//! buys and sells through the custody executor, pauses itself the moment
//! funds run out, resumes within one poll of funds reappearing, and flips
//! its routing to the AMM exactly once when the token graduates. There is
//! no stop API: only process exit or the permanent-unreachability sentinel
//! (mint or curve token account gone three probes in a row) ends the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::common::types::{EngineConfig, lamports_to_sol, sol_to_lamports};
use crate::common::RpcFacade;
use crate::constants::accounts::TOKEN_PROGRAM_2022;
use crate::constants::trade::{
    ACCOUNT_MISSING_STRIKES, DEFAULT_SLIPPAGE_BPS, WAITING_POLL_SECS,
};
use crate::engine::events::{LogEvent, LogLevel};
use crate::instruction::utils::amm::find_pool_by_mint;
use crate::instruction::utils::dex::{get_bonding_curve_pda, get_bonding_curve_token_account};
use crate::instruction::utils::vault::StrategyConfig;
use crate::store::{Database, queries};
use crate::trading::direct::read_curve;
use crate::trading::{
    CustodyExecutor, TradeError, TradeExecutor, TradeRequest, TradeSide, Venue, classify,
    compute_trade_size, failure_backoff,
};

/// Bot-level strategy settings, persisted as an opaque JSON blob on the bot
/// record. Unknown fields are ignored; missing fields take defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StrategySettings {
    pub min_trade_sol: f64,
    pub max_trade_sol: f64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub trade_pct_min: u8,
    pub trade_pct_max: u8,
    pub slippage_bps: u64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            min_trade_sol: 0.005,
            max_trade_sol: 0.05,
            min_delay_ms: 8_000,
            max_delay_ms: 20_000,
            trade_pct_min: 25,
            trade_pct_max: 75,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        }
    }
}

impl StrategySettings {
    /// Lenient parse: a malformed blob falls back to defaults rather than
    /// halting a worker over a bad row.
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }
}

/// Buy when the confirmed-trade count is even or there is nothing to sell;
/// otherwise sell. The counter is hydrated from the store at spawn, so the
/// alternation survives restarts.
pub fn next_side(total_trades: u64, token_balance: u64) -> TradeSide {
    if total_trades % 2 == 0 || token_balance == 0 { TradeSide::Buy } else { TradeSide::Sell }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    pub total_trades: u64,
    pub total_volume_sol: f64,
    pub last_trade_time: Option<DateTime<Utc>>,
}

/// Worker state observable from outside the worker task.
pub struct WorkerShared {
    pub mint: Pubkey,
    pub stats: Mutex<WorkerStats>,
    pub strategy_name: Mutex<String>,
    pub strategy: Mutex<StrategySettings>,
    pub is_paused: AtomicBool,
    pub pause_reason: Mutex<Option<String>>,
    pub consecutive_failures: AtomicU32,
    pub graduated: AtomicBool,
    pub amm_pool: Mutex<Option<Pubkey>>,
    pub halted: AtomicBool,
}

impl WorkerShared {
    pub fn new(mint: Pubkey, strategy_name: String, strategy: StrategySettings, stats: WorkerStats) -> Arc<Self> {
        Arc::new(Self {
            mint,
            stats: Mutex::new(stats),
            strategy_name: Mutex::new(strategy_name),
            strategy: Mutex::new(strategy),
            is_paused: AtomicBool::new(false),
            pause_reason: Mutex::new(None),
            consecutive_failures: AtomicU32::new(0),
            graduated: AtomicBool::new(false),
            amm_pool: Mutex::new(None),
            halted: AtomicBool::new(false),
        })
    }
}

/// Cross-worker cooldown map keyed by vault SOL holder. Two tokens sharing
/// a vault cooperate through this so back-to-back trades never trip the
/// contract's own `min_delay_secs`. Last-trade-wins; no fairness promised.
#[derive(Default)]
pub struct VaultCooldowns {
    map: DashMap<Pubkey, Instant>,
}

impl VaultCooldowns {
    pub fn elapsed_since_last(&self, vault: &Pubkey) -> Option<Duration> {
        self.map.get(vault).map(|at| at.elapsed())
    }

    pub fn record(&self, vault: Pubkey) {
        self.map.insert(vault, Instant::now());
    }
}

/// Dependencies handed to a worker at spawn. Everything shared is behind an
/// `Arc`; the worker owns nothing it did not create.
pub struct WorkerContext {
    pub rpc: Arc<RpcFacade>,
    pub store: Database,
    pub events: broadcast::Sender<LogEvent>,
    pub executor: Arc<CustodyExecutor>,
    pub cooldowns: Arc<VaultCooldowns>,
    pub config: Arc<EngineConfig>,
    pub mint: Pubkey,
}

enum CycleOutcome {
    Traded,
    Waiting,
    Skipped,
    Failed,
    Halt(String),
}

pub struct TokenWorker {
    ctx: WorkerContext,
    shared: Arc<WorkerShared>,
    last_config: StrategyConfig,
    mint_missing_strikes: u32,
    curve_account_missing_strikes: u32,
    known_creator: Option<Pubkey>,
    creator_fallback_warned: bool,
    last_fee_claim: Option<Instant>,
    funds_watch: Option<mpsc::Receiver<u64>>,
}

impl TokenWorker {
    pub fn new(ctx: WorkerContext, shared: Arc<WorkerShared>) -> Self {
        Self {
            ctx,
            shared,
            last_config: StrategyConfig::default(),
            mint_missing_strikes: 0,
            curve_account_missing_strikes: 0,
            known_creator: None,
            creator_fallback_warned: false,
            last_fee_claim: None,
            funds_watch: None,
        }
    }

    pub async fn run(mut self) {
        let mint = self.ctx.mint;
        info!(%mint, "worker started");
        loop {
            if self.shared.halted.load(Ordering::Relaxed) {
                break;
            }
            match self.cycle().await {
                CycleOutcome::Traded | CycleOutcome::Skipped => {
                    tokio::time::sleep(self.cycle_delay()).await;
                }
                CycleOutcome::Waiting => {
                    self.wait_for_funds_tick().await;
                }
                CycleOutcome::Failed => {
                    let failures = self.shared.consecutive_failures.load(Ordering::Relaxed);
                    tokio::time::sleep(failure_backoff(failures)).await;
                }
                CycleOutcome::Halt(reason) => {
                    self.halt(&reason).await;
                    break;
                }
            }
        }
        info!(%mint, "worker loop ended");
    }

    /// One iteration of the trading loop.
    async fn cycle(&mut self) -> CycleOutcome {
        let mint = self.ctx.mint;
        let funds_account = self.ctx.executor.funds_account();
        let strategy = self.shared.strategy.lock().clone();
        let min_trade = sol_to_lamports(strategy.min_trade_sol);
        let max_trade = sol_to_lamports(strategy.max_trade_sol);
        let gas_reserve = self.ctx.config.min_gas_reserve_lamports;

        // Funds gate. One log per transition in either direction.
        let balance = match self.ctx.rpc.get_balance(&funds_account).await {
            Ok(balance) => balance,
            Err(e) => return self.trade_failed(classify(&e.to_string())).await,
        };
        if balance < gas_reserve + min_trade {
            // Same error class as a DEX-signaled shortfall; one policy.
            let reason = format!(
                "vault holds {:.6} SOL, needs {:.6}",
                lamports_to_sol(balance),
                lamports_to_sol(gas_reserve + min_trade)
            );
            return self.trade_failed(TradeError::FundsInsufficient(reason)).await;
        }
        if self.shared.is_paused.swap(false, Ordering::Relaxed) {
            *self.shared.pause_reason.lock() = None;
            self.funds_watch = None;
            self.emit(
                LogLevel::Info,
                &format!("funds detected: {:.6} SOL, resuming trading", lamports_to_sol(balance)),
            )
            .await;
        }

        // Cooperative cross-worker rate limit on the shared vault, using the
        // last config seen on chain.
        let min_delay = self.last_config.min_delay_secs as u64;
        if min_delay > 0
            && let Some(elapsed) = self.ctx.cooldowns.elapsed_since_last(&funds_account)
            && elapsed < Duration::from_secs(min_delay)
        {
            debug!(%mint, elapsed_secs = elapsed.as_secs(), min_delay, "vault cooldown, skipping cycle");
            return CycleOutcome::Skipped;
        }

        // On-chain vault state. Missing state is logged and skipped, never a
        // halt: the vault may be mid-creation.
        let state = match self.ctx.executor.read_vault_state().await {
            Ok(state) => state,
            Err(e) => {
                self.emit(LogLevel::Warn, &format!("vault state unavailable: {e}")).await;
                return CycleOutcome::Skipped;
            }
        };
        self.last_config = state.config;
        if state.paused {
            debug!(%mint, "vault paused on chain, skipping cycle");
            return CycleOutcome::Skipped;
        }

        // Mint liveness probe, three strikes.
        let token_program = match self.ctx.rpc.get_account_optional(&mint).await {
            Ok(Some(account)) => {
                self.mint_missing_strikes = 0;
                if account.owner == TOKEN_PROGRAM_2022 {
                    TOKEN_PROGRAM_2022
                } else {
                    crate::constants::accounts::TOKEN_PROGRAM
                }
            }
            Ok(None) => {
                self.mint_missing_strikes += 1;
                self.emit(
                    LogLevel::Warn,
                    &format!(
                        "mint account missing ({}/{})",
                        self.mint_missing_strikes, ACCOUNT_MISSING_STRIKES
                    ),
                )
                .await;
                if self.mint_missing_strikes >= ACCOUNT_MISSING_STRIKES {
                    return CycleOutcome::Halt("mint account unreachable".into());
                }
                return CycleOutcome::Skipped;
            }
            Err(e) => return self.trade_failed(classify(&e.to_string())).await,
        };

        // Graduation detection: the complete flag is one of three signals;
        // the executor error path covers the second, pool location the third.
        let graduated = self.shared.graduated.load(Ordering::Relaxed);
        if !graduated {
            match read_curve(&self.ctx.rpc, &mint).await {
                Ok(curve) => {
                    self.curve_account_missing_strikes = 0;
                    self.known_creator = curve.creator.or(self.known_creator);
                    if curve.complete {
                        self.emit(LogLevel::Info, "bonding curve complete, switching venue to AMM")
                            .await;
                        self.shared.graduated.store(true, Ordering::Relaxed);
                    } else {
                        // Curve token account liveness, same three-strike rule.
                        if let Some(curve_pda) = get_bonding_curve_pda(&mint) {
                            let curve_ata = get_bonding_curve_token_account(
                                &curve_pda,
                                &mint,
                                &token_program,
                            );
                            match self.ctx.rpc.get_account_optional(&curve_ata).await {
                                Ok(Some(_)) => self.curve_account_missing_strikes = 0,
                                Ok(None) => {
                                    self.curve_account_missing_strikes += 1;
                                    self.emit(
                                        LogLevel::Warn,
                                        &format!(
                                            "bonding curve token account missing ({}/{})",
                                            self.curve_account_missing_strikes,
                                            ACCOUNT_MISSING_STRIKES
                                        ),
                                    )
                                    .await;
                                    if self.curve_account_missing_strikes
                                        >= ACCOUNT_MISSING_STRIKES
                                    {
                                        return CycleOutcome::Halt(
                                            "bonding curve token account unreachable".into(),
                                        );
                                    }
                                    return CycleOutcome::Skipped;
                                }
                                Err(e) => {
                                    return self.trade_failed(classify(&e.to_string())).await;
                                }
                            }
                        }
                    }
                }
                Err(TradeError::AccountMissing(_)) => {
                    self.curve_account_missing_strikes += 1;
                    self.emit(
                        LogLevel::Warn,
                        &format!(
                            "bonding curve account missing ({}/{})",
                            self.curve_account_missing_strikes, ACCOUNT_MISSING_STRIKES
                        ),
                    )
                    .await;
                    if self.curve_account_missing_strikes >= ACCOUNT_MISSING_STRIKES {
                        return CycleOutcome::Halt("bonding curve unreachable".into());
                    }
                    return CycleOutcome::Skipped;
                }
                Err(e) => return self.trade_failed(e).await,
            }
        }

        // Locate the AMM pool once after graduation.
        let needs_pool = self.shared.graduated.load(Ordering::Relaxed)
            && self.shared.amm_pool.lock().is_none();
        if needs_pool {
            match find_pool_by_mint(&self.ctx.rpc, &mint).await {
                Ok((address, pool)) => {
                    self.known_creator = Some(pool.coin_creator);
                    *self.shared.amm_pool.lock() = Some(address);
                    self.emit(LogLevel::Info, &format!("located AMM pool {address}")).await;
                }
                Err(e) => {
                    self.emit(LogLevel::Warn, &format!("AMM pool not located yet: {e}")).await;
                    return self.trade_failed(TradeError::TransientNetwork(e.to_string())).await;
                }
            }
        }

        // Periodic creator-fee claim while the vault is this token's creator.
        if state.is_creator {
            self.maybe_claim_fees().await;
        }

        // Alternation: buys on even counts or empty inventory.
        let vault_token_account =
            get_associated_token_address_with_program_id(&funds_account, &mint, &token_program);
        let token_balance = match self.ctx.rpc.get_token_balance(&vault_token_account).await {
            Ok(balance) => balance,
            Err(e) => return self.trade_failed(classify(&e.to_string())).await,
        };
        let total_trades = self.shared.stats.lock().total_trades;
        let side = next_side(total_trades, token_balance);

        let amount = match side {
            TradeSide::Buy => {
                let roll: f64 = {
                    let mut rng = rand::rng();
                    rng.random_range(0.0..1.0)
                };
                match compute_trade_size(
                    balance,
                    gas_reserve,
                    state.config.trade_size_pct,
                    min_trade,
                    max_trade,
                    (strategy.trade_pct_min, strategy.trade_pct_max),
                    roll,
                ) {
                    Some(lamports) => Some(lamports),
                    None => {
                        debug!(%mint, "no tradable size this cycle");
                        return CycleOutcome::Skipped;
                    }
                }
            }
            // Sells clear the whole inventory.
            TradeSide::Sell => None,
        };

        let graduated = self.shared.graduated.load(Ordering::Relaxed);
        let amm_pool = { *self.shared.amm_pool.lock() };
        let token_creator = self.resolve_token_creator(funds_account).await;
        let request = TradeRequest {
            side,
            mint,
            amount,
            slippage_bps: if state.config.slippage_bps > 0 {
                state.config.slippage_bps as u64
            } else {
                strategy.slippage_bps
            },
            venue: if graduated { Venue::Amm } else { Venue::BondingCurve },
            amm_pool,
            token_creator,
        };

        match self.ctx.executor.execute(&request).await {
            Ok(outcome) => {
                self.shared.consecutive_failures.store(0, Ordering::Relaxed);
                self.ctx.cooldowns.record(funds_account);

                let (total_trades, total_volume, now) = {
                    let mut stats = self.shared.stats.lock();
                    stats.total_trades += 1;
                    stats.total_volume_sol += lamports_to_sol(outcome.lamports_notional);
                    let now = Utc::now();
                    stats.last_trade_time = Some(now);
                    (stats.total_trades, stats.total_volume_sol, now)
                };
                if let Err(e) = queries::update_bot_stats(
                    self.ctx.store.pool(),
                    &mint.to_string(),
                    total_trades as i64,
                    total_volume,
                    now,
                )
                .await
                {
                    error!(%mint, "failed to persist stats: {e}");
                }

                let signature = outcome.signature.to_string();
                self.emit(
                    LogLevel::Trade,
                    &format!(
                        "{} {:.6} SOL confirmed ({}…)",
                        outcome.side.as_str(),
                        lamports_to_sol(outcome.lamports_notional),
                        &signature[..8.min(signature.len())]
                    ),
                )
                .await;
                CycleOutcome::Traded
            }
            Err(TradeError::PoolComplete) => {
                // Graduation signalled by the DEX error code. Not a failure;
                // the next cycle retries on the AMM.
                self.emit(LogLevel::Info, "bonding curve complete, switching venue to AMM").await;
                self.shared.graduated.store(true, Ordering::Relaxed);
                CycleOutcome::Skipped
            }
            Err(e) => self.trade_failed(e).await,
        }
    }

    /// Resolves the token creator for creator-fee vault derivation. Falls
    /// back to the vault's own address — correct only for tokens the vault
    /// created — and says so once.
    async fn resolve_token_creator(&mut self, funds_account: Pubkey) -> Pubkey {
        if let Some(creator) = self.known_creator {
            return creator;
        }
        if !self.creator_fallback_warned {
            self.creator_fallback_warned = true;
            self.emit(
                LogLevel::Warn,
                "token creator unknown; assuming the vault created this token",
            )
            .await;
        }
        funds_account
    }

    async fn maybe_claim_fees(&mut self) {
        let due = self
            .last_fee_claim
            .map_or(true, |at| at.elapsed() >= self.ctx.config.fee_claim_interval);
        if !due {
            return;
        }
        self.last_fee_claim = Some(Instant::now());

        let creator = self.ctx.executor.funds_account();
        match self.ctx.executor.claim_creator_fees(&creator).await {
            Ok(signature) => {
                let signature = signature.to_string();
                self.emit(
                    LogLevel::Info,
                    &format!("claimed creator fees ({}…)", &signature[..8.min(signature.len())]),
                )
                .await;
            }
            Err(e) => {
                self.emit(LogLevel::Warn, &format!("creator fee claim failed: {e}")).await;
            }
        }
    }

    /// Classified-error policy. Fatal on-chain rejections back off and keep
    /// retrying (delegation can complete externally at any time); only the
    /// unreachability sentinel halts a worker.
    async fn trade_failed(&mut self, error: TradeError) -> CycleOutcome {
        match error {
            TradeError::FundsInsufficient(reason) => {
                // Not the worker's fault; ease the failure counter and wait.
                let failures = self.shared.consecutive_failures.load(Ordering::Relaxed);
                self.shared
                    .consecutive_failures
                    .store(failures.saturating_sub(1), Ordering::Relaxed);
                if !self.shared.is_paused.swap(true, Ordering::Relaxed) {
                    *self.shared.pause_reason.lock() = Some(reason.clone());
                    self.emit(LogLevel::Warn, &format!("waiting for funds: {reason}")).await;
                    self.funds_watch =
                        self.ctx.rpc.subscribe_account_lamports(self.ctx.executor.funds_account());
                }
                CycleOutcome::Waiting
            }
            TradeError::PoolComplete => {
                self.shared.graduated.store(true, Ordering::Relaxed);
                CycleOutcome::Skipped
            }
            error => {
                let failures =
                    self.shared.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                let level = match error {
                    TradeError::SlippageExceeded(_) => LogLevel::Warn,
                    _ => LogLevel::Error,
                };
                self.emit(level, &format!("trade failed ({failures} consecutive): {error}")).await;
                CycleOutcome::Failed
            }
        }
    }

    /// Marks the durable record inactive and stops the loop.
    async fn halt(&mut self, reason: &str) {
        self.shared.halted.store(true, Ordering::Relaxed);
        self.emit(LogLevel::Error, &format!("halting worker: {reason}")).await;
        if let Err(e) = queries::set_bot_status(
            self.ctx.store.pool(),
            &self.ctx.mint.to_string(),
            crate::store::BotStatus::Stopped,
        )
        .await
        {
            error!(mint = %self.ctx.mint, "failed to mark bot inactive: {e}");
        }
    }

    /// One waiting-state tick: the 3 s poll, cut short by an account-change
    /// notification when the websocket subscription is live.
    async fn wait_for_funds_tick(&mut self) {
        let poll = Duration::from_secs(WAITING_POLL_SECS);
        let mut subscription_ended = false;
        match self.funds_watch.as_mut() {
            Some(watch) => {
                tokio::select! {
                    _ = tokio::time::sleep(poll) => {}
                    update = watch.recv() => {
                        subscription_ended = update.is_none();
                    }
                }
            }
            None => tokio::time::sleep(poll).await,
        }
        if subscription_ended {
            // Subscription ended; fall back to pure polling.
            self.funds_watch = None;
        }
    }

    fn cycle_delay(&self) -> Duration {
        let strategy = self.shared.strategy.lock().clone();
        let min = strategy.min_delay_ms.min(strategy.max_delay_ms);
        let max = strategy.max_delay_ms.max(strategy.min_delay_ms);
        let millis: u64 = {
            let mut rng = rand::rng();
            rng.random_range(min..=max)
        };
        Duration::from_millis(millis)
    }

    /// Store (with trim) + broadcast + process log. Store and broadcast are
    /// both best-effort; a worker never blocks on observability.
    async fn emit(&self, level: LogLevel, message: &str) {
        let mint = self.ctx.mint.to_string();
        match level {
            LogLevel::Error => error!(%mint, "{message}"),
            LogLevel::Warn => warn!(%mint, "{message}"),
            _ => info!(%mint, "{message}"),
        }
        if let Err(e) =
            queries::insert_log(self.ctx.store.pool(), &mint, &mint, message, level.as_str()).await
        {
            warn!(%mint, "failed to persist log: {e}");
        }
        let _ = self.ctx.events.send(LogEvent::new(mint, level, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternation_rule() {
        // Even count buys, odd count sells while inventory exists.
        assert_eq!(next_side(0, 0), TradeSide::Buy);
        assert_eq!(next_side(1, 1_000), TradeSide::Sell);
        assert_eq!(next_side(2, 1_000), TradeSide::Buy);
        assert_eq!(next_side(40, 500), TradeSide::Buy);
        assert_eq!(next_side(41, 500), TradeSide::Sell);
    }

    #[test]
    fn zero_inventory_upgrades_sell_to_buy() {
        // Odd count would sell, but nothing is held.
        assert_eq!(next_side(3, 0), TradeSide::Buy);
    }

    #[test]
    fn strategy_settings_parse_leniently() {
        let parsed = StrategySettings::from_json(r#"{"minTradeSol":0.01,"tradePctMin":10}"#);
        assert_eq!(parsed.min_trade_sol, 0.01);
        assert_eq!(parsed.trade_pct_min, 10);
        assert_eq!(parsed.max_trade_sol, StrategySettings::default().max_trade_sol);

        let garbage = StrategySettings::from_json("not json");
        assert_eq!(garbage.min_trade_sol, StrategySettings::default().min_trade_sol);
    }

    #[test]
    fn cooldowns_record_and_elapse() {
        let cooldowns = VaultCooldowns::default();
        let vault = Pubkey::new_unique();
        assert!(cooldowns.elapsed_since_last(&vault).is_none());
        cooldowns.record(vault);
        assert!(cooldowns.elapsed_since_last(&vault).unwrap() < Duration::from_secs(1));
    }
}
