//! Custody-program PDAs, state layout, and discriminators.
//!
//! A vault is a pair of PDAs under the custody program, both derived from
//! `(owner, nonce)`: the state account (config + counters) and the SOL
//! holder that actually funds trades. Trading authority over the holder can
//! be delegated to an operator key distinct from the owner.

use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;

use crate::common::AnyResult;

pub mod seeds {
    pub const VAULT_STATE_SEED: &[u8] = b"mm_wallet";
    pub const VAULT_SOL_HOLDER_SEED: &[u8] = b"vault";
}

pub static OPERATOR_BUY_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| super::anchor_instruction_discriminator("operator_buy"));
pub static OPERATOR_SELL_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| super::anchor_instruction_discriminator("operator_sell"));
pub static CLAIM_FEES_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| super::anchor_instruction_discriminator("claim_fees"));
pub static CREATE_TOKEN_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| super::anchor_instruction_discriminator("create_token"));

pub static VAULT_STATE_ACCOUNT_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| super::anchor_account_discriminator("VaultState"));

/// Serialized width of [`StrategyConfig`].
pub const STRATEGY_CONFIG_LEN: usize = 45;
/// Serialized width of [`VaultState`], reserved tail included.
pub const VAULT_STATE_LEN: usize = 251;

const VAULT_STATE_RESERVED: usize = 40;

/// Vault-state PDA: `["mm_wallet", owner, nonce as u64-le]`.
pub fn get_vault_state_pda(program_id: &Pubkey, owner: &Pubkey, nonce: u64) -> Option<Pubkey> {
    let nonce_bytes = nonce.to_le_bytes();
    let seeds: &[&[u8]] = &[seeds::VAULT_STATE_SEED, owner.as_ref(), &nonce_bytes];
    Pubkey::try_find_program_address(seeds, program_id).map(|(pda, _)| pda)
}

/// SOL-holder PDA: `["vault", owner, nonce as u64-le]`.
pub fn get_vault_sol_holder_pda(program_id: &Pubkey, owner: &Pubkey, nonce: u64) -> Option<Pubkey> {
    let nonce_bytes = nonce.to_le_bytes();
    let seeds: &[&[u8]] = &[seeds::VAULT_SOL_HOLDER_SEED, owner.as_ref(), &nonce_bytes];
    Pubkey::try_find_program_address(seeds, program_id).map(|(pda, _)| pda)
}

/// On-chain strategy configuration the custody contract enforces.
///
/// Wire layout, 45 bytes exact:
/// `u8 trade_size_pct | u16 min_delay_secs | u16 max_delay_secs |
///  u16 slippage_bps | u16 param1 | u16 param2 | u16 param3 | [u8; 32] reserved`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrategyConfig {
    /// Ceiling on a single trade, as percent of spendable vault balance.
    pub trade_size_pct: u8,
    /// Minimum seconds the contract requires between trades on one vault.
    pub min_delay_secs: u16,
    pub max_delay_secs: u16,
    pub slippage_bps: u16,
    pub param1: u16,
    pub param2: u16,
    pub param3: u16,
}

impl StrategyConfig {
    pub fn encode(&self) -> [u8; STRATEGY_CONFIG_LEN] {
        let mut out = [0u8; STRATEGY_CONFIG_LEN];
        out[0] = self.trade_size_pct;
        out[1..3].copy_from_slice(&self.min_delay_secs.to_le_bytes());
        out[3..5].copy_from_slice(&self.max_delay_secs.to_le_bytes());
        out[5..7].copy_from_slice(&self.slippage_bps.to_le_bytes());
        out[7..9].copy_from_slice(&self.param1.to_le_bytes());
        out[9..11].copy_from_slice(&self.param2.to_le_bytes());
        out[11..13].copy_from_slice(&self.param3.to_le_bytes());
        out
    }

    pub fn decode(data: &[u8]) -> AnyResult<Self> {
        if data.len() < STRATEGY_CONFIG_LEN {
            anyhow::bail!("strategy config too short: {} bytes", data.len());
        }
        let u16_at = |offset: usize| u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap());
        Ok(Self {
            trade_size_pct: data[0],
            min_delay_secs: u16_at(1),
            max_delay_secs: u16_at(3),
            slippage_bps: u16_at(5),
            param1: u16_at(7),
            param2: u16_at(9),
            param3: u16_at(11),
        })
    }
}

/// Parsed custody vault state account.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultState {
    pub version: u8,
    pub bump: u8,
    pub vault_bump: u8,
    pub owner: Pubkey,
    pub operator: Pubkey,
    /// `Pubkey::default()` when no token has been assigned yet.
    pub token_mint: Pubkey,
    pub nonce: u64,
    pub strategy: u8,
    pub config: StrategyConfig,
    pub lock_until: i64,
    pub paused: bool,
    pub is_creator: bool,
    pub total_volume: u64,
    pub total_trades: u64,
    pub total_fees_claimed: u64,
    pub last_trade: i64,
    pub created_at: i64,
}

impl VaultState {
    pub fn token_mint(&self) -> Option<Pubkey> {
        (self.token_mint != Pubkey::default()).then_some(self.token_mint)
    }

    pub fn parse(data: &[u8]) -> AnyResult<Self> {
        if data.len() < VAULT_STATE_LEN {
            anyhow::bail!("vault state too short: {} bytes", data.len());
        }
        if data[..8] != *VAULT_STATE_ACCOUNT_DISCRIMINATOR {
            anyhow::bail!("not a vault state account");
        }

        let mut cursor = Reader { data, offset: 8 };
        Ok(Self {
            version: cursor.u8(),
            bump: cursor.u8(),
            vault_bump: cursor.u8(),
            owner: cursor.pubkey(),
            operator: cursor.pubkey(),
            token_mint: cursor.pubkey(),
            nonce: cursor.u64(),
            strategy: cursor.u8(),
            config: StrategyConfig::decode(cursor.bytes(STRATEGY_CONFIG_LEN))?,
            lock_until: cursor.i64(),
            paused: cursor.u8() == 1,
            is_creator: cursor.u8() == 1,
            total_volume: cursor.u64(),
            total_trades: cursor.u64(),
            total_fees_claimed: cursor.u64(),
            last_trade: cursor.i64(),
            created_at: cursor.i64(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(VAULT_STATE_LEN);
        out.extend_from_slice(&*VAULT_STATE_ACCOUNT_DISCRIMINATOR);
        out.push(self.version);
        out.push(self.bump);
        out.push(self.vault_bump);
        out.extend_from_slice(self.owner.as_ref());
        out.extend_from_slice(self.operator.as_ref());
        out.extend_from_slice(self.token_mint.as_ref());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.push(self.strategy);
        out.extend_from_slice(&self.config.encode());
        out.extend_from_slice(&self.lock_until.to_le_bytes());
        out.push(self.paused as u8);
        out.push(self.is_creator as u8);
        out.extend_from_slice(&self.total_volume.to_le_bytes());
        out.extend_from_slice(&self.total_trades.to_le_bytes());
        out.extend_from_slice(&self.total_fees_claimed.to_le_bytes());
        out.extend_from_slice(&self.last_trade.to_le_bytes());
        out.extend_from_slice(&self.created_at.to_le_bytes());
        out.extend_from_slice(&[0u8; VAULT_STATE_RESERVED]);
        out
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> u8 {
        let value = self.data[self.offset];
        self.offset += 1;
        value
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.bytes(8).try_into().unwrap())
    }

    fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.bytes(8).try_into().unwrap())
    }

    fn pubkey(&mut self) -> Pubkey {
        Pubkey::new_from_array(self.bytes(32).try_into().unwrap())
    }

    fn bytes(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> StrategyConfig {
        StrategyConfig {
            trade_size_pct: 10,
            min_delay_secs: 30,
            max_delay_secs: 120,
            slippage_bps: 500,
            param1: 1,
            param2: 2,
            param3: 3,
        }
    }

    fn sample_state() -> VaultState {
        VaultState {
            version: 1,
            bump: 255,
            vault_bump: 254,
            owner: Pubkey::new_unique(),
            operator: Pubkey::new_unique(),
            token_mint: Pubkey::new_unique(),
            nonce: 7,
            strategy: 1,
            config: sample_config(),
            lock_until: 1_700_000_000,
            paused: false,
            is_creator: true,
            total_volume: 42_000_000_000,
            total_trades: 12,
            total_fees_claimed: 5_000,
            last_trade: 1_699_999_000,
            created_at: 1_690_000_000,
        }
    }

    #[test]
    fn config_encodes_to_exactly_45_bytes_and_round_trips() {
        let config = sample_config();
        let bytes = config.encode();
        assert_eq!(bytes.len(), STRATEGY_CONFIG_LEN);
        assert_eq!(StrategyConfig::decode(&bytes).unwrap(), config);
        // Reserved tail stays zeroed.
        assert!(bytes[13..].iter().all(|b| *b == 0));
    }

    #[test]
    fn vault_state_round_trips_at_full_width() {
        let state = sample_state();
        let bytes = state.to_bytes();
        assert_eq!(bytes.len(), VAULT_STATE_LEN);
        assert_eq!(VaultState::parse(&bytes).unwrap(), state);
    }

    #[test]
    fn vault_state_rejects_short_or_foreign_data() {
        let bytes = sample_state().to_bytes();
        assert!(VaultState::parse(&bytes[..200]).is_err());
        let mut wrong = bytes.clone();
        wrong[0] ^= 0x01;
        assert!(VaultState::parse(&wrong).is_err());
    }

    #[test]
    fn unset_mint_reads_as_none() {
        let mut state = sample_state();
        state.token_mint = Pubkey::default();
        assert_eq!(state.token_mint(), None);
    }

    #[test]
    fn vault_pdas_are_deterministic_and_distinct() {
        let program = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        for nonce in 0..100u64 {
            let state = get_vault_state_pda(&program, &owner, nonce).unwrap();
            let holder = get_vault_sol_holder_pda(&program, &owner, nonce).unwrap();
            assert_ne!(state, holder);
            assert_eq!(state, get_vault_state_pda(&program, &owner, nonce).unwrap());
        }
    }
}
