//! AMM instruction builders for graduated tokens.
//!
//! Mirrors the bonding-curve builders but with the AMM's own account order
//! and per-pool fee-recipient routing. The quote side is always WSOL for
//! pools this engine trades.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;

use crate::common::AnyResult;
use crate::constants::accounts::{
    AMM_EVENT_AUTHORITY_META, AMM_GLOBAL_ACCOUNT_META, AMM_PROGRAM, AMM_PROGRAM_META,
    ASSOCIATED_TOKEN_PROGRAM_META, FEE_PROGRAM_META, SYSTEM_PROGRAM_META, TOKEN_PROGRAM,
    TOKEN_PROGRAM_2022, TOKEN_PROGRAM_2022_META, TOKEN_PROGRAM_META,
};
use crate::instruction::utils::amm::{
    Pool, coin_creator_vault_ata, coin_creator_vault_authority,
    get_amm_global_volume_accumulator_pda, get_amm_user_volume_accumulator_pda,
};
use crate::instruction::utils::dex::get_fee_config_pda;

pub use crate::instruction::utils::dex::{BUY_DISCRIMINATOR, SELL_DISCRIMINATOR};

fn token_program_meta(token_program: &Pubkey) -> AccountMeta {
    if *token_program == TOKEN_PROGRAM_2022 { TOKEN_PROGRAM_2022_META } else { TOKEN_PROGRAM_META }
}

/// Shared prefix of the buy and sell account lists (positions 0..19).
fn common_accounts(
    user: &Pubkey,
    pool_address: &Pubkey,
    pool: &Pool,
    fee_recipient: &Pubkey,
    base_token_program: &Pubkey,
) -> Vec<AccountMeta> {
    let user_base_token_account = get_associated_token_address_with_program_id(
        user,
        &pool.base_mint,
        base_token_program,
    );
    let user_quote_token_account =
        get_associated_token_address_with_program_id(user, &pool.quote_mint, &TOKEN_PROGRAM);
    let fee_recipient_ata =
        get_associated_token_address_with_program_id(fee_recipient, &pool.quote_mint, &TOKEN_PROGRAM);

    vec![
        AccountMeta::new(*pool_address, false),
        AccountMeta::new(*user, true),
        AMM_GLOBAL_ACCOUNT_META,
        AccountMeta::new_readonly(pool.base_mint, false),
        AccountMeta::new_readonly(pool.quote_mint, false),
        AccountMeta::new(user_base_token_account, false),
        AccountMeta::new(user_quote_token_account, false),
        AccountMeta::new(pool.pool_base_token_account, false),
        AccountMeta::new(pool.pool_quote_token_account, false),
        AccountMeta::new_readonly(*fee_recipient, false),
        AccountMeta::new(fee_recipient_ata, false),
        token_program_meta(base_token_program),
        TOKEN_PROGRAM_META,
        SYSTEM_PROGRAM_META,
        ASSOCIATED_TOKEN_PROGRAM_META,
        AMM_EVENT_AUTHORITY_META,
        AMM_PROGRAM_META,
        AccountMeta::new(coin_creator_vault_ata(&pool.coin_creator, &pool.quote_mint), false),
        AccountMeta::new_readonly(coin_creator_vault_authority(&pool.coin_creator), false),
    ]
}

/// Buy `base_amount_out` base tokens for at most `max_quote_in` lamports of
/// WSOL. Buys additionally touch the volume accumulators.
pub fn build_buy_instruction(
    user: &Pubkey,
    pool_address: &Pubkey,
    pool: &Pool,
    fee_recipient: &Pubkey,
    base_token_program: &Pubkey,
    base_amount_out: u64,
    max_quote_in: u64,
) -> AnyResult<Instruction> {
    let mut accounts = common_accounts(user, pool_address, pool, fee_recipient, base_token_program);
    let global_volume_accumulator = get_amm_global_volume_accumulator_pda()
        .ok_or_else(|| anyhow::anyhow!("failed to derive amm global volume accumulator"))?;
    let user_volume_accumulator = get_amm_user_volume_accumulator_pda(user)
        .ok_or_else(|| anyhow::anyhow!("failed to derive amm user volume accumulator"))?;
    let fee_config =
        get_fee_config_pda().ok_or_else(|| anyhow::anyhow!("failed to derive fee config"))?;
    accounts.push(AccountMeta::new(global_volume_accumulator, false));
    accounts.push(AccountMeta::new(user_volume_accumulator, false));
    accounts.push(AccountMeta::new_readonly(fee_config, false));
    accounts.push(FEE_PROGRAM_META);

    let mut data = [0u8; 24];
    data[..8].copy_from_slice(&BUY_DISCRIMINATOR);
    data[8..16].copy_from_slice(&base_amount_out.to_le_bytes());
    data[16..24].copy_from_slice(&max_quote_in.to_le_bytes());

    Ok(Instruction::new_with_bytes(AMM_PROGRAM, &data, accounts))
}

/// Sell `base_amount_in` base tokens for at least `min_quote_out` lamports
/// of WSOL.
pub fn build_sell_instruction(
    user: &Pubkey,
    pool_address: &Pubkey,
    pool: &Pool,
    fee_recipient: &Pubkey,
    base_token_program: &Pubkey,
    base_amount_in: u64,
    min_quote_out: u64,
) -> AnyResult<Instruction> {
    let mut accounts = common_accounts(user, pool_address, pool, fee_recipient, base_token_program);
    let fee_config =
        get_fee_config_pda().ok_or_else(|| anyhow::anyhow!("failed to derive fee config"))?;
    accounts.push(AccountMeta::new_readonly(fee_config, false));
    accounts.push(FEE_PROGRAM_META);

    let mut data = [0u8; 24];
    data[..8].copy_from_slice(&SELL_DISCRIMINATOR);
    data[8..16].copy_from_slice(&base_amount_in.to_le_bytes());
    data[16..24].copy_from_slice(&min_quote_out.to_le_bytes());

    Ok(Instruction::new_with_bytes(AMM_PROGRAM, &data, accounts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::accounts::WSOL_MINT;

    fn sample_pool() -> Pool {
        Pool {
            pool_bump: 255,
            index: 0,
            creator: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: WSOL_MINT,
            lp_mint: Pubkey::new_unique(),
            pool_base_token_account: Pubkey::new_unique(),
            pool_quote_token_account: Pubkey::new_unique(),
            lp_supply: 1,
            coin_creator: Pubkey::new_unique(),
            fee_mode: 0,
        }
    }

    #[test]
    fn buy_and_sell_share_prefix_but_differ_in_tail() {
        let user = Pubkey::new_unique();
        let pool_address = Pubkey::new_unique();
        let pool = sample_pool();
        let fee_recipient = Pubkey::new_unique();

        let buy = build_buy_instruction(
            &user, &pool_address, &pool, &fee_recipient, &TOKEN_PROGRAM, 100, 200,
        )
        .unwrap();
        let sell = build_sell_instruction(
            &user, &pool_address, &pool, &fee_recipient, &TOKEN_PROGRAM, 100, 200,
        )
        .unwrap();

        assert_eq!(&buy.data[..8], &BUY_DISCRIMINATOR);
        assert_eq!(&sell.data[..8], &SELL_DISCRIMINATOR);
        // Buys carry the two volume accumulators, sells do not.
        assert_eq!(buy.accounts.len(), sell.accounts.len() + 2);
        assert_eq!(buy.accounts[0].pubkey, pool_address);
        assert_eq!(buy.accounts[9].pubkey, fee_recipient);
        for (a, b) in buy.accounts.iter().zip(sell.accounts.iter()).take(19) {
            assert_eq!(a.pubkey, b.pubkey);
        }
    }
}
