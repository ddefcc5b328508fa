//! Direct trade executor.
//!
//! The signer is a local keypair that owns its token account; trade funds,
//! network fees, and rent all come from the same wallet.

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use crate::common::RpcFacade;
use crate::common::bonding_curve::BondingCurveAccount;
use crate::constants::accounts::{TOKEN_PROGRAM, WSOL_MINT};
use crate::constants::trade::DEX_FEE_BPS;
use crate::instruction::utils::dex::{get_bonding_curve_pda, get_creator_vault_pda};
use crate::instruction::{amm, dex};
use crate::trading::{
    TradeError, TradeExecutor, TradeOutcome, TradeRequest, TradeSide, Venue, classify,
    detect_token_program, load_amm_context, sign_and_send,
};
use crate::utils::calc::common::{
    expected_base_out, expected_quote_out, max_amount_with_slippage, min_amount_with_slippage,
};

/// Lamports kept aside for the transaction fee in the funds pre-check.
const FEE_BUFFER_LAMPORTS: u64 = 1_000_000;

pub struct DirectExecutor {
    rpc: Arc<RpcFacade>,
    wallet: Arc<Keypair>,
}

impl DirectExecutor {
    pub fn new(rpc: Arc<RpcFacade>, wallet: Arc<Keypair>) -> Self {
        Self { rpc, wallet }
    }

    pub async fn read_curve(&self, mint: &Pubkey) -> Result<BondingCurveAccount, TradeError> {
        read_curve(&self.rpc, mint).await
    }

    async fn swap_on_curve(
        &self,
        request: &TradeRequest,
        token_program: &Pubkey,
    ) -> Result<TradeOutcome, TradeError> {
        let curve = read_curve(&self.rpc, &request.mint).await?;
        if curve.complete {
            return Err(TradeError::PoolComplete);
        }
        let creator_vault = get_creator_vault_pda(&request.token_creator)
            .ok_or_else(|| TradeError::Fatal("creator vault derivation failed".into()))?;
        let user = self.wallet.pubkey();

        match request.side {
            TradeSide::Buy => {
                let sol_amount = request
                    .amount
                    .ok_or_else(|| TradeError::Fatal("buy amount is required".into()))?;
                let balance = self
                    .rpc
                    .get_balance(&user)
                    .await
                    .map_err(|e| classify(&e.to_string()))?;
                if balance < sol_amount + FEE_BUFFER_LAMPORTS {
                    return Err(TradeError::FundsInsufficient(format!(
                        "wallet holds {balance} lamports, trade needs {sol_amount}"
                    )));
                }

                let expected_tokens =
                    curve.get_buy_price(sol_amount).map_err(|_| TradeError::PoolComplete)?;
                let max_sol_cost = max_amount_with_slippage(sol_amount, request.slippage_bps);

                let instructions = vec![
                    create_associated_token_account_idempotent(
                        &user,
                        &user,
                        &request.mint,
                        token_program,
                    ),
                    dex::build_buy_instruction(
                        &user,
                        &request.mint,
                        &creator_vault,
                        token_program,
                        expected_tokens.max(1),
                        max_sol_cost,
                    )
                    .map_err(|e| TradeError::Fatal(e.to_string()))?,
                ];

                let signature = sign_and_send(&self.rpc, &self.wallet, instructions).await?;
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
                    None => {
                        let ata = get_associated_token_address_with_program_id(
                            &user,
                            &request.mint,
                            token_program,
                        );
                        self.rpc
                            .get_token_balance(&ata)
                            .await
                            .map_err(|e| classify(&e.to_string()))?
                    }
                };
                if token_amount == 0 {
                    return Err(TradeError::FundsInsufficient("no token inventory to sell".into()));
                }

                let expected_sol = curve
                    .get_sell_price(token_amount, DEX_FEE_BPS)
                    .map_err(|_| TradeError::PoolComplete)?;
                let min_sol_output = min_amount_with_slippage(expected_sol, request.slippage_bps);

                let instructions = vec![
                    dex::build_sell_instruction(
                        &user,
                        &request.mint,
                        &creator_vault,
                        token_program,
                        token_amount,
                        min_sol_output,
                    )
                    .map_err(|e| TradeError::Fatal(e.to_string()))?,
                ];

                let signature = sign_and_send(&self.rpc, &self.wallet, instructions).await?;
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
        token_program: &Pubkey,
    ) -> Result<TradeOutcome, TradeError> {
        let pool_address = request
            .amm_pool
            .ok_or_else(|| TradeError::Fatal("amm pool address not set".into()))?;
        let ctx = load_amm_context(&self.rpc, &pool_address).await?;
        let user = self.wallet.pubkey();

        match request.side {
            TradeSide::Buy => {
                let sol_amount = request
                    .amount
                    .ok_or_else(|| TradeError::Fatal("buy amount is required".into()))?;
                let balance = self
                    .rpc
                    .get_balance(&user)
                    .await
                    .map_err(|e| classify(&e.to_string()))?;
                if balance < sol_amount + FEE_BUFFER_LAMPORTS {
                    return Err(TradeError::FundsInsufficient(format!(
                        "wallet holds {balance} lamports, trade needs {sol_amount}"
                    )));
                }

                let base_out = expected_base_out(sol_amount, ctx.base_reserve, ctx.quote_reserve);
                let max_quote_in = max_amount_with_slippage(sol_amount, request.slippage_bps);

                let mut instructions = wrap_sol_instructions(&user, sol_amount)?;
                instructions.push(create_associated_token_account_idempotent(
                    &user,
                    &user,
                    &request.mint,
                    token_program,
                ));
                instructions.push(
                    amm::build_buy_instruction(
                        &user,
                        &ctx.pool_address,
                        &ctx.pool,
                        &ctx.fee_recipient,
                        token_program,
                        base_out,
                        max_quote_in,
                    )
                    .map_err(|e| TradeError::Fatal(e.to_string()))?,
                );

                let signature = sign_and_send(&self.rpc, &self.wallet, instructions).await?;
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
                    None => {
                        let ata = get_associated_token_address_with_program_id(
                            &user,
                            &request.mint,
                            token_program,
                        );
                        self.rpc
                            .get_token_balance(&ata)
                            .await
                            .map_err(|e| classify(&e.to_string()))?
                    }
                };
                if token_amount == 0 {
                    return Err(TradeError::FundsInsufficient("no token inventory to sell".into()));
                }

                let expected_quote =
                    expected_quote_out(token_amount, ctx.base_reserve, ctx.quote_reserve);
                let min_quote_out = min_amount_with_slippage(expected_quote, request.slippage_bps);

                let instructions = vec![
                    create_associated_token_account_idempotent(
                        &user,
                        &user,
                        &WSOL_MINT,
                        &TOKEN_PROGRAM,
                    ),
                    amm::build_sell_instruction(
                        &user,
                        &ctx.pool_address,
                        &ctx.pool,
                        &ctx.fee_recipient,
                        token_program,
                        token_amount,
                        min_quote_out,
                    )
                    .map_err(|e| TradeError::Fatal(e.to_string()))?,
                ];

                let signature = sign_and_send(&self.rpc, &self.wallet, instructions).await?;
                Ok(TradeOutcome {
                    signature,
                    side: TradeSide::Sell,
                    lamports_notional: expected_quote,
                    venue: Venue::Amm,
                })
            }
        }
    }
}

#[async_trait]
impl TradeExecutor for DirectExecutor {
    fn funds_account(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    async fn execute(&self, request: &TradeRequest) -> Result<TradeOutcome, TradeError> {
        let token_program = detect_token_program(&self.rpc, &request.mint).await?;
        match request.venue {
            Venue::BondingCurve => self.swap_on_curve(request, &token_program).await,
            Venue::Amm => self.swap_on_amm(request, &token_program).await,
        }
    }

    async fn claim_creator_fees(&self, token_creator: &Pubkey) -> Result<Signature, TradeError> {
        let creator_vault = get_creator_vault_pda(token_creator)
            .ok_or_else(|| TradeError::Fatal("creator vault derivation failed".into()))?;
        let instruction =
            dex::build_claim_creator_fees_instruction(&self.wallet.pubkey(), &creator_vault);
        sign_and_send(&self.rpc, &self.wallet, vec![instruction]).await
    }
}

/// Reads and parses the bonding-curve state for `mint`.
pub(crate) async fn read_curve(
    rpc: &RpcFacade,
    mint: &Pubkey,
) -> Result<BondingCurveAccount, TradeError> {
    let curve_pda = get_bonding_curve_pda(mint)
        .ok_or_else(|| TradeError::Fatal("bonding curve derivation failed".into()))?;
    let account = rpc
        .get_account_optional(&curve_pda)
        .await
        .map_err(|e| classify(&e.to_string()))?
        .ok_or_else(|| TradeError::AccountMissing(format!("bonding curve {curve_pda}")))?;
    BondingCurveAccount::parse(curve_pda, &account.data)
        .map_err(|e| TradeError::Fatal(e.to_string()))
}

/// Funds the wallet's WSOL token account: idempotent ATA create, lamport
/// transfer, `sync_native`.
pub(crate) fn wrap_sol_instructions(
    wallet: &Pubkey,
    lamports: u64,
) -> Result<Vec<Instruction>, TradeError> {
    let wsol_ata =
        get_associated_token_address_with_program_id(wallet, &WSOL_MINT, &TOKEN_PROGRAM);
    Ok(vec![
        create_associated_token_account_idempotent(wallet, wallet, &WSOL_MINT, &TOKEN_PROGRAM),
        solana_system_interface::instruction::transfer(wallet, &wsol_ata, lamports),
        spl_token::instruction::sync_native(&TOKEN_PROGRAM, &wsol_ata)
            .map_err(|e| TradeError::Fatal(e.to_string()))?,
    ])
}
