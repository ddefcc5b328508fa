//! Well-known program ids and accounts.
//!
//! Every address the engine hardcodes lives here; instruction builders never
//! spell out a base58 literal at a use site. The custody program id is the one
//! deliberate exception: it is deployment-specific and travels through
//! [`crate::common::EngineConfig`] instead.

use solana_sdk::instruction::AccountMeta;
use solana_sdk::{pubkey, pubkey::Pubkey};

/// Bonding-curve DEX program.
pub const DEX_PROGRAM: Pubkey = pubkey!("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P");

/// Post-graduation AMM program.
pub const AMM_PROGRAM: Pubkey = pubkey!("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA");

/// Fee program consulted for the fee-config PDA.
pub const FEE_PROGRAM: Pubkey = pubkey!("pfeeUxB6jkeY1Hxd7CsFCAjcbHA9rWtchMGdZ6VojVZ");

/// Token metadata program.
pub const MPL_TOKEN_METADATA: Pubkey = pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// DEX global configuration account.
pub const DEX_GLOBAL_ACCOUNT: Pubkey = pubkey!("4wTV1YmiEkRvAtNtsSGPtUrqRYQMe5SKy2uB4Jjaxnjf");

/// AMM global configuration account (holds the two candidate fee recipients).
pub const AMM_GLOBAL_ACCOUNT: Pubkey = pubkey!("ADyA8hdefvWN2dbGGWFotbzWxrAvLW83WG6QCVXvJKqw");

/// DEX protocol fee recipient.
pub const DEX_FEE_RECIPIENT: Pubkey = pubkey!("62qc2CNXwrYqQScmEdiZFFAnJR262PxWEuNQtxfafNgV");

/// Shared mint authority for all DEX-created tokens.
pub const DEX_MINT_AUTHORITY: Pubkey = pubkey!("TSLvdd1pWpHVjahSpsvCXUbgwsL3JAcvokwaKt1eokM");

/// DEX event authority.
pub const DEX_EVENT_AUTHORITY: Pubkey = pubkey!("Ce6TQqeHC9p8KetsN6JsjHK7UTZk7nasjjnr7XxXp9F1");

/// AMM event authority.
pub const AMM_EVENT_AUTHORITY: Pubkey = pubkey!("GS4CU59F31iL7aR2Q8zVS8DRrcRnXX1yjQ66TqNVQnaR");

pub const TOKEN_PROGRAM: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

pub const TOKEN_PROGRAM_2022: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

pub const ASSOCIATED_TOKEN_PROGRAM: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

pub const SYSTEM_PROGRAM: Pubkey = pubkey!("11111111111111111111111111111111");

pub const RENT_SYSVAR: Pubkey = pubkey!("SysvarRent111111111111111111111111111111111");

/// Wrapped SOL mint, the quote side of every AMM pool this engine trades.
pub const WSOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

// META

pub const DEX_GLOBAL_ACCOUNT_META: AccountMeta =
    AccountMeta { pubkey: DEX_GLOBAL_ACCOUNT, is_signer: false, is_writable: false };

pub const AMM_GLOBAL_ACCOUNT_META: AccountMeta =
    AccountMeta { pubkey: AMM_GLOBAL_ACCOUNT, is_signer: false, is_writable: false };

pub const DEX_FEE_RECIPIENT_META: AccountMeta =
    AccountMeta { pubkey: DEX_FEE_RECIPIENT, is_signer: false, is_writable: true };

pub const DEX_EVENT_AUTHORITY_META: AccountMeta =
    AccountMeta { pubkey: DEX_EVENT_AUTHORITY, is_signer: false, is_writable: false };

pub const AMM_EVENT_AUTHORITY_META: AccountMeta =
    AccountMeta { pubkey: AMM_EVENT_AUTHORITY, is_signer: false, is_writable: false };

pub const DEX_PROGRAM_META: AccountMeta =
    AccountMeta { pubkey: DEX_PROGRAM, is_signer: false, is_writable: false };

pub const AMM_PROGRAM_META: AccountMeta =
    AccountMeta { pubkey: AMM_PROGRAM, is_signer: false, is_writable: false };

pub const FEE_PROGRAM_META: AccountMeta =
    AccountMeta { pubkey: FEE_PROGRAM, is_signer: false, is_writable: false };

pub const TOKEN_PROGRAM_META: AccountMeta =
    AccountMeta { pubkey: TOKEN_PROGRAM, is_signer: false, is_writable: false };

pub const TOKEN_PROGRAM_2022_META: AccountMeta =
    AccountMeta { pubkey: TOKEN_PROGRAM_2022, is_signer: false, is_writable: false };

pub const ASSOCIATED_TOKEN_PROGRAM_META: AccountMeta =
    AccountMeta { pubkey: ASSOCIATED_TOKEN_PROGRAM, is_signer: false, is_writable: false };

pub const SYSTEM_PROGRAM_META: AccountMeta =
    AccountMeta { pubkey: SYSTEM_PROGRAM, is_signer: false, is_writable: false };

pub const RENT_META: AccountMeta =
    AccountMeta { pubkey: RENT_SYSVAR, is_signer: false, is_writable: false };
