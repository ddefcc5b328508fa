//! Bonding-curve DEX instruction builders.
//!
//! Account order is part of the on-chain ABI; the arrays below are the
//! single place it is written down. The `user` position is a signer here —
//! the custody wrapper clears that flag when the "user" is a vault PDA that
//! signs via CPI instead.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;

use crate::common::AnyResult;
use crate::constants::accounts::{
    DEX_EVENT_AUTHORITY_META, DEX_FEE_RECIPIENT_META, DEX_GLOBAL_ACCOUNT_META, DEX_PROGRAM,
    DEX_PROGRAM_META, FEE_PROGRAM_META, SYSTEM_PROGRAM_META, TOKEN_PROGRAM_2022,
    TOKEN_PROGRAM_2022_META, TOKEN_PROGRAM_META,
};
use crate::instruction::utils::dex::{
    BUY_DISCRIMINATOR, CLAIM_CREATOR_FEES_DISCRIMINATOR, SELL_DISCRIMINATOR,
    get_bonding_curve_pda, get_bonding_curve_token_account, get_fee_config_pda,
    get_global_volume_accumulator_pda, get_user_volume_accumulator_pda,
};

fn token_program_meta(token_program: &Pubkey) -> AccountMeta {
    if *token_program == TOKEN_PROGRAM_2022 { TOKEN_PROGRAM_2022_META } else { TOKEN_PROGRAM_META }
}

/// Buy `token_amount_out` of `mint` for at most `max_sol_cost` lamports.
pub fn build_buy_instruction(
    user: &Pubkey,
    mint: &Pubkey,
    creator_vault: &Pubkey,
    token_program: &Pubkey,
    token_amount_out: u64,
    max_sol_cost: u64,
) -> AnyResult<Instruction> {
    let bonding_curve = get_bonding_curve_pda(mint)
        .ok_or_else(|| anyhow::anyhow!("failed to derive bonding curve PDA"))?;
    let bonding_curve_token_account =
        get_bonding_curve_token_account(&bonding_curve, mint, token_program);
    let user_token_account =
        get_associated_token_address_with_program_id(user, mint, token_program);
    let user_volume_accumulator = get_user_volume_accumulator_pda(user)
        .ok_or_else(|| anyhow::anyhow!("failed to derive user volume accumulator"))?;
    let global_volume_accumulator = get_global_volume_accumulator_pda()
        .ok_or_else(|| anyhow::anyhow!("failed to derive global volume accumulator"))?;
    let fee_config =
        get_fee_config_pda().ok_or_else(|| anyhow::anyhow!("failed to derive fee config"))?;

    let mut data = [0u8; 24];
    data[..8].copy_from_slice(&BUY_DISCRIMINATOR);
    data[8..16].copy_from_slice(&token_amount_out.to_le_bytes());
    data[16..24].copy_from_slice(&max_sol_cost.to_le_bytes());

    let accounts: [AccountMeta; 16] = [
        DEX_GLOBAL_ACCOUNT_META,
        DEX_FEE_RECIPIENT_META,
        AccountMeta::new_readonly(*mint, false),
        AccountMeta::new(bonding_curve, false),
        AccountMeta::new(bonding_curve_token_account, false),
        AccountMeta::new(user_token_account, false),
        AccountMeta::new(*user, true),
        SYSTEM_PROGRAM_META,
        token_program_meta(token_program),
        AccountMeta::new(*creator_vault, false),
        DEX_EVENT_AUTHORITY_META,
        DEX_PROGRAM_META,
        AccountMeta::new(global_volume_accumulator, false),
        AccountMeta::new(user_volume_accumulator, false),
        AccountMeta::new_readonly(fee_config, false),
        FEE_PROGRAM_META,
    ];

    Ok(Instruction::new_with_bytes(DEX_PROGRAM, &data, accounts.to_vec()))
}

/// Sell `token_amount_in` of `mint` for at least `min_sol_output` lamports.
pub fn build_sell_instruction(
    user: &Pubkey,
    mint: &Pubkey,
    creator_vault: &Pubkey,
    token_program: &Pubkey,
    token_amount_in: u64,
    min_sol_output: u64,
) -> AnyResult<Instruction> {
    let bonding_curve = get_bonding_curve_pda(mint)
        .ok_or_else(|| anyhow::anyhow!("failed to derive bonding curve PDA"))?;
    let bonding_curve_token_account =
        get_bonding_curve_token_account(&bonding_curve, mint, token_program);
    let user_token_account =
        get_associated_token_address_with_program_id(user, mint, token_program);
    let fee_config =
        get_fee_config_pda().ok_or_else(|| anyhow::anyhow!("failed to derive fee config"))?;

    let mut data = [0u8; 24];
    data[..8].copy_from_slice(&SELL_DISCRIMINATOR);
    data[8..16].copy_from_slice(&token_amount_in.to_le_bytes());
    data[16..24].copy_from_slice(&min_sol_output.to_le_bytes());

    let accounts: [AccountMeta; 14] = [
        DEX_GLOBAL_ACCOUNT_META,
        DEX_FEE_RECIPIENT_META,
        AccountMeta::new_readonly(*mint, false),
        AccountMeta::new(bonding_curve, false),
        AccountMeta::new(bonding_curve_token_account, false),
        AccountMeta::new(user_token_account, false),
        AccountMeta::new(*user, true),
        SYSTEM_PROGRAM_META,
        AccountMeta::new(*creator_vault, false),
        token_program_meta(token_program),
        DEX_EVENT_AUTHORITY_META,
        DEX_PROGRAM_META,
        AccountMeta::new_readonly(fee_config, false),
        FEE_PROGRAM_META,
    ];

    Ok(Instruction::new_with_bytes(DEX_PROGRAM, &data, accounts.to_vec()))
}

/// Claim accrued creator fees from the creator-fee vault back to `creator`.
pub fn build_claim_creator_fees_instruction(
    creator: &Pubkey,
    creator_vault: &Pubkey,
) -> Instruction {
    let accounts: [AccountMeta; 5] = [
        AccountMeta::new(*creator, true),
        AccountMeta::new(*creator_vault, false),
        SYSTEM_PROGRAM_META,
        DEX_EVENT_AUTHORITY_META,
        DEX_PROGRAM_META,
    ];
    Instruction::new_with_bytes(
        DEX_PROGRAM,
        &*CLAIM_CREATOR_FEES_DISCRIMINATOR,
        accounts.to_vec(),
    )
}

/// Create a new token and initialize its bonding curve.
///
/// `creator` pays and receives update authority over the metadata; `mint`
/// must co-sign the enclosing transaction.
pub fn build_create_instruction(
    mint: &Pubkey,
    creator: &Pubkey,
    name: &str,
    symbol: &str,
    uri: &str,
) -> AnyResult<Instruction> {
    use crate::constants::accounts::{
        ASSOCIATED_TOKEN_PROGRAM_META, DEX_MINT_AUTHORITY, MPL_TOKEN_METADATA, RENT_META,
        TOKEN_PROGRAM,
    };
    use crate::instruction::utils::dex::{CREATE_DISCRIMINATOR, get_metadata_pda};
    use crate::instruction::utils::encode_str;

    let bonding_curve = get_bonding_curve_pda(mint)
        .ok_or_else(|| anyhow::anyhow!("failed to derive bonding curve PDA"))?;
    let bonding_curve_token_account =
        get_bonding_curve_token_account(&bonding_curve, mint, &TOKEN_PROGRAM);
    let metadata =
        get_metadata_pda(mint).ok_or_else(|| anyhow::anyhow!("failed to derive metadata PDA"))?;

    let mut data = Vec::with_capacity(8 + 12 + name.len() + symbol.len() + uri.len() + 32);
    data.extend_from_slice(&CREATE_DISCRIMINATOR);
    encode_str(&mut data, name);
    encode_str(&mut data, symbol);
    encode_str(&mut data, uri);
    data.extend_from_slice(creator.as_ref());

    let accounts: [AccountMeta; 14] = [
        AccountMeta::new(*mint, true),
        AccountMeta::new_readonly(DEX_MINT_AUTHORITY, false),
        AccountMeta::new(bonding_curve, false),
        AccountMeta::new(bonding_curve_token_account, false),
        DEX_GLOBAL_ACCOUNT_META,
        AccountMeta::new_readonly(MPL_TOKEN_METADATA, false),
        AccountMeta::new(metadata, false),
        AccountMeta::new(*creator, true),
        SYSTEM_PROGRAM_META,
        TOKEN_PROGRAM_META,
        ASSOCIATED_TOKEN_PROGRAM_META,
        RENT_META,
        DEX_EVENT_AUTHORITY_META,
        DEX_PROGRAM_META,
    ];

    Ok(Instruction::new_with_bytes(DEX_PROGRAM, &data, accounts.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_payload_layout() {
        let user = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let creator_vault = Pubkey::new_unique();
        let ix = build_buy_instruction(
            &user,
            &mint,
            &creator_vault,
            &crate::constants::TOKEN_PROGRAM,
            1_000_000,
            2_000_000,
        )
        .unwrap();

        assert_eq!(ix.program_id, DEX_PROGRAM);
        assert_eq!(&ix.data[..8], &BUY_DISCRIMINATOR);
        assert_eq!(u64::from_le_bytes(ix.data[8..16].try_into().unwrap()), 1_000_000);
        assert_eq!(u64::from_le_bytes(ix.data[16..24].try_into().unwrap()), 2_000_000);
        assert_eq!(ix.accounts.len(), 16);
        // User is the only signer on the direct path.
        let signers: Vec<_> = ix.accounts.iter().filter(|a| a.is_signer).collect();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].pubkey, user);
    }

    #[test]
    fn sell_payload_layout() {
        let ix = build_sell_instruction(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &crate::constants::TOKEN_PROGRAM,
            500,
            400,
        )
        .unwrap();
        assert_eq!(&ix.data[..8], &SELL_DISCRIMINATOR);
        assert_eq!(ix.accounts.len(), 14);
    }
}
