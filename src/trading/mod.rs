//! Trade executors.
//!
//! Two routing strategies implement [`TradeExecutor`]: [`DirectExecutor`]
//! signs with a wallet that owns its token account, [`CustodyExecutor`]
//! signs with the shared operator key while a vault PDA holds the funds.
//! Both translate a [`TradeRequest`] into a composed, signed, confirmed
//! transaction through the codec and the RPC facade.

pub mod custody;
pub mod direct;
pub mod error;

use async_trait::async_trait;
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

pub use custody::CustodyExecutor;
pub use direct::DirectExecutor;
pub use error::{TradeError, classify, failure_backoff};

use crate::common::RpcFacade;
use crate::constants::accounts::{AMM_GLOBAL_ACCOUNT, TOKEN_PROGRAM, TOKEN_PROGRAM_2022};
use crate::constants::trade::{
    COMPUTE_UNIT_LIMIT, COMPUTE_UNIT_PRICE_MICRO_LAMPORTS, SIZE_CEILING_MARGIN,
};
use crate::instruction::utils::amm::{Pool, active_fee_recipient, get_pool_by_address};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

/// Trading venue for one request. A token moves from the curve to the AMM
/// exactly once; the worker owns that transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    BondingCurve,
    Amm,
}

#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub side: TradeSide,
    pub mint: Pubkey,
    /// Buy: lamports to spend. Sell: base units to sell, `None` meaning the
    /// entire token balance.
    pub amount: Option<u64>,
    pub slippage_bps: u64,
    pub venue: Venue,
    /// Required when `venue` is [`Venue::Amm`].
    pub amm_pool: Option<Pubkey>,
    /// The token's creator, used to derive the mandatory creator-fee vault.
    /// Callers resolve this from the curve or pool state; it is never
    /// defaulted here.
    pub token_creator: Pubkey,
}

#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub signature: Signature,
    pub side: TradeSide,
    /// SOL notional of the trade in lamports (spent on buys, expected
    /// receipt on sells), used for volume accounting.
    pub lamports_notional: u64,
    pub venue: Venue,
}

/// The polymorphic seam between the worker and the two routing strategies.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// The account whose SOL balance funds trades through this executor.
    fn funds_account(&self) -> Pubkey;

    async fn execute(&self, request: &TradeRequest) -> Result<TradeOutcome, TradeError>;

    /// Claims accrued creator fees for `token_creator`'s fee vault.
    async fn claim_creator_fees(&self, token_creator: &Pubkey) -> Result<Signature, TradeError>;
}

/// Sizing rule shared by the worker and the custody executor's ceiling
/// check. `roll` is a uniform draw in `[0, 1)` mapped over the strategy's
/// percent range; keeping it a parameter keeps the function deterministic.
///
/// Returns `None` when the cycle should be skipped: nothing spendable, a
/// zero on-chain percentage, or a chosen size below the bot minimum.
pub fn compute_trade_size(
    balance_lamports: u64,
    gas_reserve_lamports: u64,
    on_chain_pct: u8,
    min_trade_lamports: u64,
    max_trade_lamports: u64,
    pct_range: (u8, u8),
    roll: f64,
) -> Option<u64> {
    let available = balance_lamports.saturating_sub(gas_reserve_lamports);
    if available == 0 || on_chain_pct == 0 {
        return None;
    }

    let allowed_max = (available as u128 * on_chain_pct as u128 / 100) as u64;
    let ceiling = (allowed_max as f64 * SIZE_CEILING_MARGIN) as u64;

    let (pct_min, pct_max) = pct_range;
    let pct = pct_min as f64 + roll.clamp(0.0, 1.0) * (pct_max.saturating_sub(pct_min)) as f64;
    let candidate = (available as f64 * pct / 100.0) as u64;

    let chosen = candidate.min(ceiling).min(max_trade_lamports);
    (chosen >= min_trade_lamports && chosen > 0).then_some(chosen)
}

/// Everything an AMM trade needs that lives on chain: the pool, its live
/// reserves, and the active fee recipient for its mode flag.
pub(crate) struct AmmTradeContext {
    pub pool_address: Pubkey,
    pub pool: Pool,
    pub base_reserve: u64,
    pub quote_reserve: u64,
    pub fee_recipient: Pubkey,
}

pub(crate) async fn load_amm_context(
    rpc: &RpcFacade,
    pool_address: &Pubkey,
) -> Result<AmmTradeContext, TradeError> {
    let pool =
        get_pool_by_address(rpc, pool_address).await.map_err(|e| classify(&e.to_string()))?;

    let base_reserve = rpc
        .get_token_balance(&pool.pool_base_token_account)
        .await
        .map_err(|e| classify(&e.to_string()))?;
    let quote_reserve = rpc
        .get_token_balance(&pool.pool_quote_token_account)
        .await
        .map_err(|e| classify(&e.to_string()))?;

    let global = rpc
        .get_account_optional(&AMM_GLOBAL_ACCOUNT)
        .await
        .map_err(|e| classify(&e.to_string()))?
        .ok_or_else(|| TradeError::AccountMissing("amm global config".into()))?;
    let fee_recipient = active_fee_recipient(&global.data, pool.fee_mode)
        .map_err(|e| TradeError::Fatal(e.to_string()))?;

    Ok(AmmTradeContext {
        pool_address: *pool_address,
        pool,
        base_reserve,
        quote_reserve,
        fee_recipient,
    })
}

/// The token program owning `mint` (legacy SPL or Token-2022), which every
/// ATA derivation and instruction meta must agree with.
pub(crate) async fn detect_token_program(
    rpc: &RpcFacade,
    mint: &Pubkey,
) -> Result<Pubkey, TradeError> {
    let account = rpc
        .get_account_optional(mint)
        .await
        .map_err(|e| classify(&e.to_string()))?
        .ok_or_else(|| TradeError::AccountMissing(format!("mint {mint}")))?;
    if account.owner == TOKEN_PROGRAM_2022 {
        Ok(TOKEN_PROGRAM_2022)
    } else {
        Ok(TOKEN_PROGRAM)
    }
}

/// Compute-budget prologue, sign, submit, confirm.
pub(crate) async fn sign_and_send(
    rpc: &RpcFacade,
    payer: &Keypair,
    trade_instructions: Vec<Instruction>,
) -> Result<Signature, TradeError> {
    sign_and_send_with(rpc, payer, &[], trade_instructions).await
}

pub(crate) async fn sign_and_send_with(
    rpc: &RpcFacade,
    payer: &Keypair,
    extra_signers: &[&Keypair],
    mut trade_instructions: Vec<Instruction>,
) -> Result<Signature, TradeError> {
    let mut instructions = vec![
        ComputeBudgetInstruction::set_compute_unit_limit(COMPUTE_UNIT_LIMIT),
        ComputeBudgetInstruction::set_compute_unit_price(COMPUTE_UNIT_PRICE_MICRO_LAMPORTS),
    ];
    instructions.append(&mut trade_instructions);

    let blockhash =
        rpc.get_latest_blockhash().await.map_err(|e| classify(&e.to_string()))?;

    let mut signers: Vec<&Keypair> = Vec::with_capacity(1 + extra_signers.len());
    signers.push(payer);
    signers.extend_from_slice(extra_signers);

    let transaction = Transaction::new_signed_with_payer(
        &instructions,
        Some(&payer.pubkey()),
        &signers,
        blockhash,
    );

    rpc.send_and_confirm(&transaction).await.map_err(|e| classify(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::sol_to_lamports;

    #[test]
    fn sizing_honors_on_chain_ceiling() {
        // Vault holds 0.1 SOL, reserve 0.01, pct 10 => allowed 0.009,
        // ceiling ~0.00855. Any roll in range lands on the ceiling.
        let chosen = compute_trade_size(
            sol_to_lamports(0.1),
            sol_to_lamports(0.01),
            10,
            sol_to_lamports(0.005),
            sol_to_lamports(0.05),
            (25, 75),
            0.5,
        )
        .unwrap();
        assert!((8_549_998..=8_550_001).contains(&chosen), "chosen = {chosen}");
    }

    #[test]
    fn zero_pct_never_trades() {
        assert_eq!(
            compute_trade_size(sol_to_lamports(1.0), 0, 0, 1, u64::MAX, (25, 75), 0.5),
            None
        );
    }

    #[test]
    fn below_minimum_skips() {
        // Allowed ceiling would be tiny; chosen falls under the bot minimum.
        assert_eq!(
            compute_trade_size(
                sol_to_lamports(0.02),
                sol_to_lamports(0.01),
                10,
                sol_to_lamports(0.005),
                sol_to_lamports(0.05),
                (25, 75),
                0.9,
            ),
            None
        );
    }

    #[test]
    fn bot_max_caps_large_vaults() {
        let chosen = compute_trade_size(
            sol_to_lamports(100.0),
            sol_to_lamports(0.01),
            50,
            sol_to_lamports(0.005),
            sol_to_lamports(0.05),
            (25, 75),
            1.0,
        )
        .unwrap();
        assert_eq!(chosen, sol_to_lamports(0.05));
    }
}
