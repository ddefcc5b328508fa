//! Persistent bot manager.
//!
//! The supervisor: bootstraps the operator signer, resumes workers from
//! durable state at boot, backfills workers for vaults that registered a
//! token out-of-band, and keeps scanning for new ones in the background.
//! Also owns the only two pieces of cross-worker shared mutable state — the
//! vault cooldown map and the broadcast sink.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, anyhow};
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::common::types::EngineConfig;
use crate::common::{AnyResult, RpcFacade, signer};
use crate::constants::trade::BACKFILL_SCAN_SECS;
use crate::engine::events::LogEvent;
use crate::engine::worker::{
    StrategySettings, TokenWorker, VaultCooldowns, WorkerContext, WorkerShared, WorkerStats,
};
use crate::instruction::utils::vault::{get_vault_sol_holder_pda, get_vault_state_pda};
use crate::instruction::vault::VaultKeys;
use crate::store::{BotRecord, BotStatus, Database, queries};
use crate::trading::CustodyExecutor;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Totals across live workers and dormant records.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_volume_sol: f64,
    pub total_trades: u64,
    pub active_workers: usize,
    pub total_bots: usize,
}

struct WorkerHandle {
    shared: Arc<WorkerShared>,
    _task: JoinHandle<()>,
}

pub struct BotManager {
    rpc: Arc<RpcFacade>,
    store: Database,
    operator: Arc<Keypair>,
    config: Arc<EngineConfig>,
    workers: DashMap<Pubkey, WorkerHandle>,
    cooldowns: Arc<VaultCooldowns>,
    events: broadcast::Sender<LogEvent>,
}

impl BotManager {
    pub fn new(config: EngineConfig, store: Database) -> AnyResult<Arc<Self>> {
        let operator = Arc::new(signer::load_operator()?);
        info!(operator = %operator.pubkey(), "operator signer ready");

        let rpc = Arc::new(RpcFacade::new(
            config.rpc_url.clone(),
            config.rpc_ws_url.clone(),
            config.commitment,
        ));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Arc::new(Self {
            rpc,
            store,
            operator,
            config: Arc::new(config),
            workers: DashMap::new(),
            cooldowns: Arc::new(VaultCooldowns::default()),
            events,
        }))
    }

    pub fn operator_pubkey(&self) -> Pubkey {
        self.operator.pubkey()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }

    /// Resumes every running bot record, backfills vaults that hold a token
    /// but have no bot row, and starts the 10 s background scan that keeps
    /// doing the latter for newly-registered tokens.
    pub async fn resume_all(self: &Arc<Self>) -> AnyResult<()> {
        let bots = queries::get_bots_by_status(self.store.pool(), BotStatus::Running)
            .await
            .context("loading running bots")?;
        info!(count = bots.len(), "resuming workers from store");
        for bot in &bots {
            if let Err(e) = self.spawn_from_record(bot) {
                error!(mint = %bot.token_mint, "failed to resume worker: {e}");
            }
        }

        self.backfill_from_vaults().await?;

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(BACKFILL_SCAN_SECS));
            loop {
                ticker.tick().await;
                if let Err(e) = manager.backfill_from_vaults().await {
                    warn!("background vault scan failed: {e}");
                }
            }
        });

        Ok(())
    }

    /// Spawns workers for vault records that carry a token mint but have no
    /// bot record yet. Safe to call repeatedly.
    pub async fn backfill_from_vaults(&self) -> AnyResult<()> {
        let vaults = queries::vaults_without_bot(self.store.pool()).await?;
        for vault in vaults {
            let Some(mint) = vault.token_mint.as_deref() else { continue };
            let (mint, vault_state, owner) = match (
                mint.parse::<Pubkey>(),
                vault.vault_state_address.parse::<Pubkey>(),
                vault.owner.parse::<Pubkey>(),
            ) {
                (Ok(m), Ok(v), Ok(o)) => (m, v, o),
                _ => {
                    warn!(vault = %vault.vault_state_address, "skipping vault row with unparseable keys");
                    continue;
                }
            };
            if let Err(e) = self.ensure_worker(mint, vault_state, owner).await {
                error!(%mint, "backfill spawn failed: {e}");
            }
        }
        Ok(())
    }

    /// Idempotent worker start: returns the existing handle when a worker
    /// for `mint` is already live, otherwise upserts the durable record and
    /// spawns one hydrated from it.
    pub async fn ensure_worker(
        &self,
        mint: Pubkey,
        vault_state: Pubkey,
        owner: Pubkey,
    ) -> AnyResult<Arc<WorkerShared>> {
        if let Some(handle) = self.workers.get(&mint) {
            return Ok(handle.shared.clone());
        }

        let record = match queries::get_bot(self.store.pool(), &mint.to_string()).await? {
            Some(mut existing) => {
                existing.status = BotStatus::Running;
                existing
            }
            None => BotRecord {
                token_mint: mint.to_string(),
                vault_state_address: vault_state.to_string(),
                owner: owner.to_string(),
                strategy_name: "volume".to_string(),
                strategy_config: "{}".to_string(),
                total_trades: 0,
                total_volume_sol: 0.0,
                last_trade_time: None,
                status: BotStatus::Running,
            },
        };
        queries::upsert_bot(self.store.pool(), &record).await?;
        self.spawn_from_record(&record)
    }

    fn spawn_from_record(&self, record: &BotRecord) -> AnyResult<Arc<WorkerShared>> {
        let mint = record
            .token_mint
            .parse::<Pubkey>()
            .map_err(|e| anyhow!("bot record has invalid mint {}: {e}", record.token_mint))?;
        if let Some(handle) = self.workers.get(&mint) {
            return Ok(handle.shared.clone());
        }
        let vault_state = record
            .vault_state_address
            .parse::<Pubkey>()
            .map_err(|e| anyhow!("bot record has invalid vault address: {e}"))?;
        let owner = record
            .owner
            .parse::<Pubkey>()
            .map_err(|e| anyhow!("bot record has invalid owner: {e}"))?;

        let custody_program = self.config.custody_program;
        let nonce = resolve_vault_nonce(&custody_program, &owner, &vault_state)
            .ok_or_else(|| anyhow!("vault {vault_state} is not derivable from owner {owner}"))?;
        let vault_sol_holder = get_vault_sol_holder_pda(&custody_program, &owner, nonce)
            .ok_or_else(|| anyhow!("vault SOL holder derivation failed"))?;

        let executor = Arc::new(CustodyExecutor::new(
            self.rpc.clone(),
            self.operator.clone(),
            VaultKeys { program_id: custody_program, vault_state, vault_sol_holder },
            self.config.min_gas_reserve_lamports,
        ));

        let shared = WorkerShared::new(
            mint,
            record.strategy_name.clone(),
            StrategySettings::from_json(&record.strategy_config),
            WorkerStats {
                total_trades: record.total_trades.max(0) as u64,
                total_volume_sol: record.total_volume_sol,
                last_trade_time: record.last_trade_time,
            },
        );

        let worker = TokenWorker::new(
            WorkerContext {
                rpc: self.rpc.clone(),
                store: self.store.clone(),
                events: self.events.clone(),
                executor,
                cooldowns: self.cooldowns.clone(),
                config: self.config.clone(),
                mint,
            },
            shared.clone(),
        );
        let task = tokio::spawn(worker.run());
        self.workers.insert(mint, WorkerHandle { shared: shared.clone(), _task: task });
        info!(%mint, vault = %vault_state, nonce, "worker spawned");
        Ok(shared)
    }

    /// Updates a live worker's in-memory settings and persists the row.
    pub async fn update_strategy(
        &self,
        mint: &Pubkey,
        strategy_name: &str,
        strategy_config: &str,
    ) -> AnyResult<()> {
        if let Some(handle) = self.workers.get(mint) {
            *handle.shared.strategy_name.lock() = strategy_name.to_string();
            *handle.shared.strategy.lock() = StrategySettings::from_json(strategy_config);
        }
        queries::update_bot_strategy(
            self.store.pool(),
            &mint.to_string(),
            strategy_name,
            strategy_config,
        )
        .await?;
        Ok(())
    }

    /// Sums live worker counters, falling back to the durable row for bots
    /// without a live worker.
    pub async fn aggregate_stats(&self) -> AnyResult<EngineStats> {
        let bots = queries::get_all_bots(self.store.pool()).await?;
        let mut total_volume_sol = 0.0;
        let mut total_trades = 0u64;
        let mut active_workers = 0usize;

        for bot in &bots {
            let live = bot
                .token_mint
                .parse::<Pubkey>()
                .ok()
                .and_then(|mint| self.workers.get(&mint).map(|h| h.shared.clone()));
            match live {
                Some(shared) => {
                    let stats = shared.stats.lock().clone();
                    total_volume_sol += stats.total_volume_sol;
                    total_trades += stats.total_trades;
                    if !shared.halted.load(Ordering::Relaxed) {
                        active_workers += 1;
                    }
                }
                None => {
                    total_volume_sol += bot.total_volume_sol;
                    total_trades += bot.total_trades.max(0) as u64;
                }
            }
        }

        Ok(EngineStats {
            total_volume_sol,
            total_trades,
            active_workers,
            total_bots: bots.len(),
        })
    }

    pub fn worker(&self, mint: &Pubkey) -> Option<Arc<WorkerShared>> {
        self.workers.get(mint).map(|handle| handle.shared.clone())
    }
}

/// Recovers the nonce behind a vault-state address by walking the nonce
/// space. Pure derivation; 0..=99 is the contract's own nonce range.
pub fn resolve_vault_nonce(
    program_id: &Pubkey,
    owner: &Pubkey,
    vault_state: &Pubkey,
) -> Option<u64> {
    (0..100u64).find(|nonce| {
        get_vault_state_pda(program_id, owner, *nonce).as_ref() == Some(vault_state)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_recovery_round_trips() {
        let program = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        for nonce in [0u64, 1, 42, 99] {
            let vault_state = get_vault_state_pda(&program, &owner, nonce).unwrap();
            assert_eq!(resolve_vault_nonce(&program, &owner, &vault_state), Some(nonce));
        }
        assert_eq!(resolve_vault_nonce(&program, &owner, &Pubkey::new_unique()), None);
    }
}
