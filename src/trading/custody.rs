//! Via-custody trade executor.
//!
//! The signer is the shared operator key; the funds live in a vault PDA
//! whose trading authority was delegated to that operator. The on-chain
//! strategy config is read every trade and its `trade_size_pct` enforced as
//! an absolute ceiling before anything is composed. The network fee and any
//! new-account rent come from the operator; trade funds and DEX fees come
//! from the vault.

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use crate::common::RpcFacade;
use crate::constants::trade::DEX_FEE_BPS;
use crate::instruction::utils::dex::get_creator_vault_pda;
use crate::instruction::utils::vault::VaultState;
use crate::instruction::vault::VaultKeys;
use crate::instruction::{amm, dex, vault};
use crate::trading::direct::read_curve;
use crate::trading::{
    TradeError, TradeExecutor, TradeOutcome, TradeRequest, TradeSide, Venue, classify,
    detect_token_program, load_amm_context, sign_and_send, sign_and_send_with,
};
use crate::utils::calc::common::{
    expected_base_out, expected_quote_out, max_amount_with_slippage, min_amount_with_slippage,
};

pub struct CustodyExecutor {
    rpc: Arc<RpcFacade>,
    operator: Arc<Keypair>,
    keys: VaultKeys,
    gas_reserve_lamports: u64,
}

impl CustodyExecutor {
    pub fn new(
        rpc: Arc<RpcFacade>,
        operator: Arc<Keypair>,
        keys: VaultKeys,
        gas_reserve_lamports: u64,
    ) -> Self {
        Self { rpc, operator, keys, gas_reserve_lamports }
    }

    pub fn vault_keys(&self) -> &VaultKeys {
        &self.keys
    }

    pub async fn read_vault_state(&self) -> Result<VaultState, TradeError> {
        let account = self
            .rpc
            .get_account_optional(&self.keys.vault_state)
            .await
            .map_err(|e| classify(&e.to_string()))?
            .ok_or_else(|| {
                TradeError::AccountMissing(format!("vault state {}", self.keys.vault_state))
            })?;
        VaultState::parse(&account.data).map_err(|e| TradeError::Fatal(e.to_string()))
    }

    /// The vault's ATA for `mint`, plus a create prologue (paid by the
    /// operator) when it does not exist yet.
    async fn vault_token_account(
        &self,
        mint: &Pubkey,
        token_program: &Pubkey,
    ) -> Result<(Pubkey, Option<Instruction>), TradeError> {
        let ata = get_associated_token_address_with_program_id(
            &self.keys.vault_sol_holder,
            mint,
            token_program,
        );
        let exists = self
            .rpc
            .get_account_optional(&ata)
            .await
            .map_err(|e| classify(&e.to_string()))?
            .is_some();
        let prologue = (!exists).then(|| {
            create_associated_token_account_idempotent(
                &self.operator.pubkey(),
                &self.keys.vault_sol_holder,
                mint,
                token_program,
            )
        });
        Ok((ata, prologue))
    }

    /// Ceiling from the on-chain config: `(balance - reserve) * pct / 100`.
    async fn enforce_buy_ceiling(
        &self,
        state: &VaultState,
        sol_amount: u64,
    ) -> Result<(), TradeError> {
        let balance = self
            .rpc
            .get_balance(&self.keys.vault_sol_holder)
            .await
            .map_err(|e| classify(&e.to_string()))?;
        let available = balance.saturating_sub(self.gas_reserve_lamports);
        let allowed_max = (available as u128 * state.config.trade_size_pct as u128 / 100) as u64;
        if sol_amount > allowed_max {
            return Err(TradeError::FundsInsufficient(format!(
                "trade of {sol_amount} lamports exceeds vault ceiling {allowed_max}"
            )));
        }
        Ok(())
    }

    async fn swap_on_curve(
        &self,
        request: &TradeRequest,
        state: &VaultState,
        token_program: &Pubkey,
    ) -> Result<TradeOutcome, TradeError> {
        let curve = read_curve(&self.rpc, &request.mint).await?;
        if curve.complete {
            return Err(TradeError::PoolComplete);
        }
        let creator_vault = get_creator_vault_pda(&request.token_creator)
            .ok_or_else(|| TradeError::Fatal("creator vault derivation failed".into()))?;
        let (vault_ata, ata_prologue) =
            self.vault_token_account(&request.mint, token_program).await?;

        match request.side {
            TradeSide::Buy => {
                let sol_amount = request
                    .amount
                    .ok_or_else(|| TradeError::Fatal("buy amount is required".into()))?;
                self.enforce_buy_ceiling(state, sol_amount).await?;

                let expected_tokens =
                    curve.get_buy_price(sol_amount).map_err(|_| TradeError::PoolComplete)?;
                let max_sol_cost = max_amount_with_slippage(sol_amount, request.slippage_bps);

                let inner = dex::build_buy_instruction(
                    &self.keys.vault_sol_holder,
                    &request.mint,
                    &creator_vault,
                    token_program,
                    expected_tokens.max(1),
                    max_sol_cost,
                )
                .map_err(|e| TradeError::Fatal(e.to_string()))?;
                let wrapped = vault::build_operator_buy_instruction(
                    &self.keys,
                    &self.operator.pubkey(),
                    &request.mint,
                    &vault_ata,
                    sol_amount,
                    max_sol_cost,
                    &inner,
                );

                let mut instructions = Vec::with_capacity(2);
                instructions.extend(ata_prologue);
                instructions.push(wrapped);

                let signature = sign_and_send(&self.rpc, &self.operator, instructions).await?;
                Ok(TradeOutcome {
                    signature,
                    side: TradeSide::Buy,
                    lamports_notional: sol_amount,
                    venue: Venue::BondingCurve,
                })
            }
            TradeSide::Sell => {
                let token_amount = match request.amount {
                    Some(amount) => amount,
                    None => self
                        .rpc
                        .get_token_balance(&vault_ata)
                        .await
                        .map_err(|e| classify(&e.to_string()))?,
                };
                if token_amount == 0 {
                    return Err(TradeError::FundsInsufficient("no token inventory to sell".into()));
                }

                let expected_sol = curve
                    .get_sell_price(token_amount, DEX_FEE_BPS)
                    .map_err(|_| TradeError::PoolComplete)?;
                let min_sol_output = min_amount_with_slippage(expected_sol, request.slippage_bps);

                let inner = dex::build_sell_instruction(
                    &self.keys.vault_sol_holder,
                    &request.mint,
                    &creator_vault,
                    token_program,
                    token_amount,
                    min_sol_output,
                )
                .map_err(|e| TradeError::Fatal(e.to_string()))?;
                let wrapped = vault::build_operator_sell_instruction(
                    &self.keys,
                    &self.operator.pubkey(),
                    &request.mint,
                    &vault_ata,
                    token_amount,
                    min_sol_output,
                    &inner,
                );

                let signature = sign_and_send(&self.rpc, &self.operator, vec![wrapped]).await?;
                Ok(TradeOutcome {
                    signature,
                    side: TradeSide::Sell,
                    lamports_notional: expected_sol,
                    venue: Venue::BondingCurve,
                })
            }
        }
    }

    async fn swap_on_amm(
        &self,
        request: &TradeRequest,
        state: &VaultState,
        token_program: &Pubkey,
    ) -> Result<TradeOutcome, TradeError> {
        let pool_address = request
            .amm_pool
            .ok_or_else(|| TradeError::Fatal("amm pool address not set".into()))?;
        let ctx = load_amm_context(&self.rpc, &pool_address).await?;
        let (vault_ata, ata_prologue) =
            self.vault_token_account(&request.mint, token_program).await?;
        // The AMM settles the quote side into the vault's WSOL account.
        let wsol_prologue = create_associated_token_account_idempotent(
            &self.operator.pubkey(),
            &self.keys.vault_sol_holder,
            &crate::constants::accounts::WSOL_MINT,
            &crate::constants::accounts::TOKEN_PROGRAM,
        );

        match request.side {
            TradeSide::Buy => {
                let sol_amount = request
                    .amount
                    .ok_or_else(|| TradeError::Fatal("buy amount is required".into()))?;
                self.enforce_buy_ceiling(state, sol_amount).await?;

                let base_out = expected_base_out(sol_amount, ctx.base_reserve, ctx.quote_reserve);
                let max_quote_in = max_amount_with_slippage(sol_amount, request.slippage_bps);

                let inner = amm::build_buy_instruction(
                    &self.keys.vault_sol_holder,
                    &ctx.pool_address,
                    &ctx.pool,
                    &ctx.fee_recipient,
                    token_program,
                    base_out,
                    max_quote_in,
                )
                .map_err(|e| TradeError::Fatal(e.to_string()))?;
                let wrapped = vault::build_operator_buy_instruction(
                    &self.keys,
                    &self.operator.pubkey(),
                    &request.mint,
                    &vault_ata,
                    sol_amount,
                    max_quote_in,
                    &inner,
                );

                let mut instructions = Vec::with_capacity(3);
                instructions.extend(ata_prologue);
                instructions.push(wsol_prologue);
                instructions.push(wrapped);

                let signature = sign_and_send(&self.rpc, &self.operator, instructions).await?;
                Ok(TradeOutcome {
                    signature,
                    side: TradeSide::Buy,
                    lamports_notional: sol_amount,
                    venue: Venue::Amm,
                })
            }
            TradeSide::Sell => {
                let token_amount = match request.amount {
                    Some(amount) => amount,
                    None => self
                        .rpc
                        .get_token_balance(&vault_ata)
                        .await
                        .map_err(|e| classify(&e.to_string()))?,
                };
                if token_amount == 0 {
                    return Err(TradeError::FundsInsufficient("no token inventory to sell".into()));
                }

                let expected_quote =
                    expected_quote_out(token_amount, ctx.base_reserve, ctx.quote_reserve);
                let min_quote_out = min_amount_with_slippage(expected_quote, request.slippage_bps);

                let inner = amm::build_sell_instruction(
                    &self.keys.vault_sol_holder,
                    &ctx.pool_address,
                    &ctx.pool,
                    &ctx.fee_recipient,
                    token_program,
                    token_amount,
                    min_quote_out,
                )
                .map_err(|e| TradeError::Fatal(e.to_string()))?;
                let wrapped = vault::build_operator_sell_instruction(
                    &self.keys,
                    &self.operator.pubkey(),
                    &request.mint,
                    &vault_ata,
                    token_amount,
                    min_quote_out,
                    &inner,
                );

                let signature =
                    sign_and_send(&self.rpc, &self.operator, vec![wsol_prologue, wrapped]).await?;
                Ok(TradeOutcome {
                    signature,
                    side: TradeSide::Sell,
                    lamports_notional: expected_quote,
                    venue: Venue::Amm,
                })
            }
        }
    }

    /// Creates a token through the vault; the vault becomes its creator.
    pub async fn create_token(
        &self,
        name: &str,
        symbol: &str,
        uri: &str,
    ) -> Result<(Pubkey, Signature), TradeError> {
        let mint = Keypair::new();
        let inner = dex::build_create_instruction(
            &mint.pubkey(),
            &self.keys.vault_sol_holder,
            name,
            symbol,
            uri,
        )
        .map_err(|e| TradeError::Fatal(e.to_string()))?;
        let wrapped = vault::build_create_token_instruction(
            &self.keys,
            &self.operator.pubkey(),
            name,
            symbol,
            uri,
            &inner,
        );
        let signature =
            sign_and_send_with(&self.rpc, &self.operator, &[&mint], vec![wrapped]).await?;
        Ok((mint.pubkey(), signature))
    }
}

#[async_trait]
impl TradeExecutor for CustodyExecutor {
    fn funds_account(&self) -> Pubkey {
        self.keys.vault_sol_holder
    }

    async fn execute(&self, request: &TradeRequest) -> Result<TradeOutcome, TradeError> {
        let token_program = detect_token_program(&self.rpc, &request.mint).await?;
        let state = self.read_vault_state().await?;
        match request.venue {
            Venue::BondingCurve => self.swap_on_curve(request, &state, &token_program).await,
            Venue::Amm => self.swap_on_amm(request, &state, &token_program).await,
        }
    }

    async fn claim_creator_fees(&self, token_creator: &Pubkey) -> Result<Signature, TradeError> {
        let creator_vault = get_creator_vault_pda(token_creator)
            .ok_or_else(|| TradeError::Fatal("creator vault derivation failed".into()))?;
        let inner =
            dex::build_claim_creator_fees_instruction(&self.keys.vault_sol_holder, &creator_vault);
        let wrapped =
            vault::build_claim_fees_instruction(&self.keys, &self.operator.pubkey(), &inner);
        sign_and_send(&self.rpc, &self.operator, vec![wrapped]).await
    }
}
