//! AMM pool location, layout, and fee-recipient routing.
//!
//! A graduated token trades against exactly one canonical WSOL pool. Finding
//! it is a two-step fallback: a program-account index query when the RPC
//! supports it, otherwise brute-force PDA derivation over the pool index
//! space with batched verification reads. Either way the result is memoized
//! process-wide.

use anyhow::anyhow;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use solana_account_decoder::UiAccountEncoding;
use solana_rpc_client_api::config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_rpc_client_api::filter::RpcFilterType;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use tracing::debug;

use crate::common::{AnyResult, RpcFacade};
use crate::constants::accounts::{AMM_PROGRAM, TOKEN_PROGRAM, WSOL_MINT};
use crate::constants::trade::{POOL_SCAN_BATCH, POOL_SCAN_MAX};

/// Pool account layout offsets. Single source of truth; nothing else in the
/// crate spells these out.
pub const POOL_BUMP_OFFSET: usize = 8;
pub const POOL_INDEX_OFFSET: usize = 9;
pub const POOL_CREATOR_OFFSET: usize = 11;
pub const BASE_MINT_OFFSET: usize = 43;
pub const QUOTE_MINT_OFFSET: usize = 75;
pub const LP_MINT_OFFSET: usize = 107;
pub const POOL_BASE_TOKEN_ACCOUNT_OFFSET: usize = 139;
pub const POOL_QUOTE_TOKEN_ACCOUNT_OFFSET: usize = 171;
pub const LP_SUPPLY_OFFSET: usize = 203;
pub const COIN_CREATOR_OFFSET: usize = 211;
pub const POOL_FEE_MODE_OFFSET: usize = 243;
pub const POOL_LEN: usize = 244;

/// Offsets of the two candidate fee recipients in the AMM global config.
/// The active one is selected by the pool's fee-mode flag.
pub const GLOBAL_FEE_RECIPIENT_PRIMARY_OFFSET: usize = 40;
pub const GLOBAL_FEE_RECIPIENT_ALTERNATE_OFFSET: usize = 72;

pub mod seeds {
    pub const POOL_SEED: &[u8] = b"pool";
    pub const CREATOR_VAULT_SEED: &[u8] = b"creator_vault";
    pub const USER_VOLUME_ACCUMULATOR_SEED: &[u8] = b"user_volume_accumulator";
    pub const GLOBAL_VOLUME_ACCUMULATOR_SEED: &[u8] = b"global_volume_accumulator";
}

pub static POOL_ACCOUNT_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| super::anchor_account_discriminator("Pool"));

/// mint -> pool address, memoized for the life of the process.
static POOL_CACHE: Lazy<DashMap<Pubkey, Pubkey>> = Lazy::new(DashMap::new);

#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub pool_bump: u8,
    pub index: u16,
    pub creator: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub pool_base_token_account: Pubkey,
    pub pool_quote_token_account: Pubkey,
    pub lp_supply: u64,
    pub coin_creator: Pubkey,
    pub fee_mode: u8,
}

impl Pool {
    pub fn parse(data: &[u8]) -> AnyResult<Self> {
        if data.len() < POOL_LEN {
            anyhow::bail!("pool account too short: {} bytes", data.len());
        }
        if data[..8] != *POOL_ACCOUNT_DISCRIMINATOR {
            anyhow::bail!("not a pool account");
        }
        let key = |offset: usize| Pubkey::new_from_array(data[offset..offset + 32].try_into().unwrap());
        Ok(Self {
            pool_bump: data[POOL_BUMP_OFFSET],
            index: u16::from_le_bytes(data[POOL_INDEX_OFFSET..POOL_INDEX_OFFSET + 2].try_into().unwrap()),
            creator: key(POOL_CREATOR_OFFSET),
            base_mint: key(BASE_MINT_OFFSET),
            quote_mint: key(QUOTE_MINT_OFFSET),
            lp_mint: key(LP_MINT_OFFSET),
            pool_base_token_account: key(POOL_BASE_TOKEN_ACCOUNT_OFFSET),
            pool_quote_token_account: key(POOL_QUOTE_TOKEN_ACCOUNT_OFFSET),
            lp_supply: u64::from_le_bytes(data[LP_SUPPLY_OFFSET..LP_SUPPLY_OFFSET + 8].try_into().unwrap()),
            coin_creator: key(COIN_CREATOR_OFFSET),
            fee_mode: data[POOL_FEE_MODE_OFFSET],
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(POOL_LEN);
        out.extend_from_slice(&*POOL_ACCOUNT_DISCRIMINATOR);
        out.push(self.pool_bump);
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(self.creator.as_ref());
        out.extend_from_slice(self.base_mint.as_ref());
        out.extend_from_slice(self.quote_mint.as_ref());
        out.extend_from_slice(self.lp_mint.as_ref());
        out.extend_from_slice(self.pool_base_token_account.as_ref());
        out.extend_from_slice(self.pool_quote_token_account.as_ref());
        out.extend_from_slice(&self.lp_supply.to_le_bytes());
        out.extend_from_slice(self.coin_creator.as_ref());
        out.push(self.fee_mode);
        out
    }
}

/// Pool PDA for a given index and mint pair.
pub fn get_pool_pda(index: u16, base_mint: &Pubkey, quote_mint: &Pubkey) -> Option<Pubkey> {
    let index_bytes = index.to_le_bytes();
    let seeds: &[&[u8]] =
        &[seeds::POOL_SEED, &index_bytes, base_mint.as_ref(), quote_mint.as_ref()];
    Pubkey::try_find_program_address(seeds, &AMM_PROGRAM).map(|(pda, _)| pda)
}

pub fn get_amm_user_volume_accumulator_pda(user: &Pubkey) -> Option<Pubkey> {
    let seeds: &[&[u8]] = &[seeds::USER_VOLUME_ACCUMULATOR_SEED, user.as_ref()];
    Pubkey::try_find_program_address(seeds, &AMM_PROGRAM).map(|(pda, _)| pda)
}

pub fn get_amm_global_volume_accumulator_pda() -> Option<Pubkey> {
    let seeds: &[&[u8]] = &[seeds::GLOBAL_VOLUME_ACCUMULATOR_SEED];
    Pubkey::try_find_program_address(seeds, &AMM_PROGRAM).map(|(pda, _)| pda)
}

pub fn coin_creator_vault_authority(coin_creator: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[seeds::CREATOR_VAULT_SEED, coin_creator.as_ref()],
        &AMM_PROGRAM,
    )
    .0
}

pub fn coin_creator_vault_ata(coin_creator: &Pubkey, quote_mint: &Pubkey) -> Pubkey {
    let authority = coin_creator_vault_authority(coin_creator);
    get_associated_token_address_with_program_id(&authority, quote_mint, &TOKEN_PROGRAM)
}

/// Resolves the active fee recipient from the AMM global config bytes and
/// the pool's fee-mode flag.
pub fn active_fee_recipient(global_config: &[u8], fee_mode: u8) -> AnyResult<Pubkey> {
    let offset = if fee_mode == 0 {
        GLOBAL_FEE_RECIPIENT_PRIMARY_OFFSET
    } else {
        GLOBAL_FEE_RECIPIENT_ALTERNATE_OFFSET
    };
    let bytes: [u8; 32] = global_config
        .get(offset..offset + 32)
        .ok_or_else(|| anyhow!("amm global config too short for fee recipients"))?
        .try_into()
        .unwrap();
    Ok(Pubkey::new_from_array(bytes))
}

pub fn cached_pool_for_mint(mint: &Pubkey) -> Option<Pubkey> {
    POOL_CACHE.get(mint).map(|entry| *entry)
}

/// Reads and parses a pool account, verifying program ownership.
pub async fn get_pool_by_address(rpc: &RpcFacade, pool_address: &Pubkey) -> AnyResult<Pool> {
    let account = rpc
        .get_account_optional(pool_address)
        .await?
        .ok_or_else(|| anyhow!("pool account {pool_address} does not exist"))?;
    if account.owner != AMM_PROGRAM {
        anyhow::bail!("account {pool_address} is not owned by the AMM program");
    }
    Pool::parse(&account.data)
}

/// Locates the WSOL pool for `mint`: cache, then program-account index
/// query, then brute-force PDA derivation.
pub async fn find_pool_by_mint(rpc: &RpcFacade, mint: &Pubkey) -> AnyResult<(Pubkey, Pool)> {
    if let Some(address) = cached_pool_for_mint(mint) {
        let pool = get_pool_by_address(rpc, &address).await?;
        return Ok((address, pool));
    }

    let located = match find_pool_via_index(rpc, mint).await {
        Ok(found) => Some(found),
        Err(e) => {
            debug!(%mint, "program-account pool query failed, falling back to PDA scan: {e}");
            None
        }
    };
    let (address, pool) = match located {
        Some(found) => found,
        None => find_pool_via_pda_scan(rpc, mint).await?,
    };

    POOL_CACHE.insert(*mint, address);
    Ok((address, pool))
}

/// One `getProgramAccounts` call with a memcmp filter at the base-mint
/// offset. Picks the deepest pool when several match.
async fn find_pool_via_index(rpc: &RpcFacade, mint: &Pubkey) -> AnyResult<(Pubkey, Pool)> {
    let filters = vec![RpcFilterType::Memcmp(
        solana_client::rpc_filter::Memcmp::new_base58_encoded(BASE_MINT_OFFSET, &mint.to_bytes()),
    )];
    let config = RpcProgramAccountsConfig {
        filters: Some(filters),
        account_config: RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            data_slice: None,
            commitment: None,
            min_context_slot: None,
        },
        with_context: None,
        sort_results: None,
    };

    let accounts = rpc.get_program_accounts_with_config(&AMM_PROGRAM, config).await?;
    accounts
        .into_iter()
        .filter_map(|(address, account)| {
            let pool = Pool::parse(&account.data).ok()?;
            (pool.base_mint == *mint).then_some((address, pool))
        })
        .max_by_key(|(_, pool)| pool.lp_supply)
        .ok_or_else(|| anyhow!("no pool found for mint {mint}"))
}

/// Derives candidate pool PDAs over the index space and verifies them with
/// batched reads, checking the base mint back out of each hit.
async fn find_pool_via_pda_scan(rpc: &RpcFacade, mint: &Pubkey) -> AnyResult<(Pubkey, Pool)> {
    let candidates: Vec<Pubkey> = (0..POOL_SCAN_MAX)
        .filter_map(|index| get_pool_pda(index, mint, &WSOL_MINT))
        .collect();

    for batch in candidates.chunks(POOL_SCAN_BATCH) {
        let accounts = rpc.get_multiple_accounts(batch).await?;
        for (address, account) in batch.iter().zip(accounts) {
            let Some(account) = account else { continue };
            if account.owner != AMM_PROGRAM {
                continue;
            }
            let Ok(pool) = Pool::parse(&account.data) else { continue };
            if pool.base_mint == *mint {
                return Ok((*address, pool));
            }
        }
    }
    Err(anyhow!("no pool found for mint {mint} in index range 0..{POOL_SCAN_MAX}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pool() -> Pool {
        Pool {
            pool_bump: 254,
            index: 3,
            creator: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: WSOL_MINT,
            lp_mint: Pubkey::new_unique(),
            pool_base_token_account: Pubkey::new_unique(),
            pool_quote_token_account: Pubkey::new_unique(),
            lp_supply: 123_456_789,
            coin_creator: Pubkey::new_unique(),
            fee_mode: 1,
        }
    }

    #[test]
    fn pool_layout_round_trips_at_documented_offsets() {
        let pool = sample_pool();
        let bytes = pool.to_bytes();
        assert_eq!(bytes.len(), POOL_LEN);
        assert_eq!(&bytes[BASE_MINT_OFFSET..BASE_MINT_OFFSET + 32], pool.base_mint.as_ref());
        assert_eq!(bytes[POOL_FEE_MODE_OFFSET], 1);
        assert_eq!(Pool::parse(&bytes).unwrap(), pool);
    }

    #[test]
    fn pool_pda_is_deterministic_per_index() {
        let base = Pubkey::new_unique();
        let a = get_pool_pda(0, &base, &WSOL_MINT).unwrap();
        let b = get_pool_pda(0, &base, &WSOL_MINT).unwrap();
        let c = get_pool_pda(1, &base, &WSOL_MINT).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fee_recipient_routing_follows_mode_flag() {
        let primary = Pubkey::new_unique();
        let alternate = Pubkey::new_unique();
        let mut config = vec![0u8; 120];
        config[GLOBAL_FEE_RECIPIENT_PRIMARY_OFFSET..GLOBAL_FEE_RECIPIENT_PRIMARY_OFFSET + 32]
            .copy_from_slice(primary.as_ref());
        config[GLOBAL_FEE_RECIPIENT_ALTERNATE_OFFSET..GLOBAL_FEE_RECIPIENT_ALTERNATE_OFFSET + 32]
            .copy_from_slice(alternate.as_ref());

        assert_eq!(active_fee_recipient(&config, 0).unwrap(), primary);
        assert_eq!(active_fee_recipient(&config, 1).unwrap(), alternate);
        assert!(active_fee_recipient(&config[..50], 0).is_err());
    }
}
