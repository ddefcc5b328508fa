//! Bonding-curve DEX PDAs and instruction discriminators.

use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;

use crate::constants::accounts::{DEX_PROGRAM, FEE_PROGRAM, MPL_TOKEN_METADATA};

/// Seeds for PDAs owned by the DEX and its satellite programs.
pub mod seeds {
    pub const BONDING_CURVE_SEED: &[u8] = b"bonding-curve";
    pub const CREATOR_VAULT_SEED: &[u8] = b"creator-vault";
    pub const USER_VOLUME_ACCUMULATOR_SEED: &[u8] = b"user_volume_accumulator";
    pub const GLOBAL_VOLUME_ACCUMULATOR_SEED: &[u8] = b"global_volume_accumulator";
    pub const FEE_CONFIG_SEED: &[u8] = b"fee_config";
    pub const METADATA_SEED: &[u8] = b"metadata";
    pub const MINT_AUTHORITY_SEED: &[u8] = b"mint-authority";
}

pub const BUY_DISCRIMINATOR: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
pub const SELL_DISCRIMINATOR: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];
pub const CREATE_DISCRIMINATOR: [u8; 8] = [24, 30, 200, 40, 5, 28, 7, 119];
pub static CLAIM_CREATOR_FEES_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| super::anchor_instruction_discriminator("collect_creator_fee"));

/// Account discriminator of the bonding-curve state account.
pub static BONDING_CURVE_ACCOUNT_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| super::anchor_account_discriminator("BondingCurve"));

pub fn get_bonding_curve_pda(mint: &Pubkey) -> Option<Pubkey> {
    let seeds: &[&[u8]] = &[seeds::BONDING_CURVE_SEED, mint.as_ref()];
    Pubkey::try_find_program_address(seeds, &DEX_PROGRAM).map(|(pda, _)| pda)
}

/// The curve's associated token account, which holds the tradable supply.
pub fn get_bonding_curve_token_account(
    bonding_curve: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Pubkey {
    get_associated_token_address_with_program_id(bonding_curve, mint, token_program)
}

/// Where the DEX deposits the token creator's share of trading fees.
pub fn get_creator_vault_pda(creator: &Pubkey) -> Option<Pubkey> {
    let seeds: &[&[u8]] = &[seeds::CREATOR_VAULT_SEED, creator.as_ref()];
    Pubkey::try_find_program_address(seeds, &DEX_PROGRAM).map(|(pda, _)| pda)
}

pub fn get_user_volume_accumulator_pda(user: &Pubkey) -> Option<Pubkey> {
    let seeds: &[&[u8]] = &[seeds::USER_VOLUME_ACCUMULATOR_SEED, user.as_ref()];
    Pubkey::try_find_program_address(seeds, &DEX_PROGRAM).map(|(pda, _)| pda)
}

pub fn get_global_volume_accumulator_pda() -> Option<Pubkey> {
    let seeds: &[&[u8]] = &[seeds::GLOBAL_VOLUME_ACCUMULATOR_SEED];
    Pubkey::try_find_program_address(seeds, &DEX_PROGRAM).map(|(pda, _)| pda)
}

pub fn get_fee_config_pda() -> Option<Pubkey> {
    let seeds: &[&[u8]] = &[seeds::FEE_CONFIG_SEED, DEX_PROGRAM.as_ref()];
    Pubkey::try_find_program_address(seeds, &FEE_PROGRAM).map(|(pda, _)| pda)
}

pub fn get_metadata_pda(mint: &Pubkey) -> Option<Pubkey> {
    let seeds: &[&[u8]] =
        &[seeds::METADATA_SEED, MPL_TOKEN_METADATA.as_ref(), mint.as_ref()];
    Pubkey::try_find_program_address(seeds, &MPL_TOKEN_METADATA).map(|(pda, _)| pda)
}

pub fn get_mint_authority_pda() -> Option<Pubkey> {
    let seeds: &[&[u8]] = &[seeds::MINT_AUTHORITY_SEED];
    Pubkey::try_find_program_address(seeds, &DEX_PROGRAM).map(|(pda, _)| pda)
}
