//! Bonding-curve state account.
//!
//! Pre-graduation liquidity lives on a virtual constant-product curve; price
//! is `virtual_sol / virtual_token`. The `complete` byte flips once when the
//! curve fills, after which the token trades on the AMM and this account is
//! only read for the graduation signal.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::common::AnyResult;
use crate::instruction::utils::dex::{BONDING_CURVE_ACCOUNT_DISCRIMINATOR, get_creator_vault_pda};

/// Byte length of the fixed (legacy) layout: discriminator + five u64 + flag.
pub const BONDING_CURVE_LEGACY_LEN: usize = 49;
/// Extended layout carries the creator key and the mayhem-mode flag.
pub const BONDING_CURVE_EXTENDED_LEN: usize = BONDING_CURVE_LEGACY_LEN + 32 + 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BondingCurveAccount {
    /// Address of the state account (not part of the serialized layout).
    #[serde(skip)]
    pub account: Pubkey,
    /// Virtual token reserves used for price calculations.
    pub virtual_token_reserves: u64,
    /// Virtual SOL reserves used for price calculations.
    pub virtual_sol_reserves: u64,
    /// Actual token reserves available for trading.
    pub real_token_reserves: u64,
    /// Actual SOL reserves accrued from trading.
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    /// Set once the curve fills; gates graduation.
    pub complete: bool,
    /// Present only in the extended layout.
    pub creator: Option<Pubkey>,
    /// Mayhem-mode tokens live under the Token-2022 program.
    pub is_mayhem_mode: bool,
}

impl BondingCurveAccount {
    /// Parses the on-chain layout, accepting both the legacy 49-byte form and
    /// the extended form with creator and mayhem flag.
    pub fn parse(account: Pubkey, data: &[u8]) -> AnyResult<Self> {
        if data.len() < BONDING_CURVE_LEGACY_LEN {
            anyhow::bail!(
                "bonding curve account {account} too short: {} bytes",
                data.len()
            );
        }
        if data[..8] != *BONDING_CURVE_ACCOUNT_DISCRIMINATOR {
            anyhow::bail!("account {account} is not a bonding curve state account");
        }

        let read_u64 =
            |offset: usize| u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap());

        let (creator, is_mayhem_mode) = if data.len() >= BONDING_CURVE_EXTENDED_LEN {
            let creator = Pubkey::new_from_array(data[49..81].try_into().unwrap());
            (Some(creator), data[81] == 1)
        } else {
            (None, false)
        };

        Ok(Self {
            account,
            virtual_token_reserves: read_u64(8),
            virtual_sol_reserves: read_u64(16),
            real_token_reserves: read_u64(24),
            real_sol_reserves: read_u64(32),
            token_total_supply: read_u64(40),
            complete: data[48] == 1,
            creator,
            is_mayhem_mode,
        })
    }

    /// Serializes back into the on-chain layout. Emits the extended form iff
    /// a creator is present.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BONDING_CURVE_EXTENDED_LEN);
        out.extend_from_slice(&*BONDING_CURVE_ACCOUNT_DISCRIMINATOR);
        out.extend_from_slice(&self.virtual_token_reserves.to_le_bytes());
        out.extend_from_slice(&self.virtual_sol_reserves.to_le_bytes());
        out.extend_from_slice(&self.real_token_reserves.to_le_bytes());
        out.extend_from_slice(&self.real_sol_reserves.to_le_bytes());
        out.extend_from_slice(&self.token_total_supply.to_le_bytes());
        out.push(self.complete as u8);
        if let Some(creator) = &self.creator {
            out.extend_from_slice(creator.as_ref());
            out.push(self.is_mayhem_mode as u8);
        }
        out
    }

    pub fn creator_vault_pda(&self) -> Option<Pubkey> {
        self.creator.as_ref().and_then(get_creator_vault_pda)
    }

    /// Tokens received for `amount` lamports, capped by real reserves.
    pub fn get_buy_price(&self, amount: u64) -> Result<u64, &'static str> {
        if self.complete {
            return Err("curve is complete");
        }
        if amount == 0 {
            return Ok(0);
        }

        // Constant-product in u128 to avoid overflow.
        let n = (self.virtual_sol_reserves as u128) * (self.virtual_token_reserves as u128);
        let i = (self.virtual_sol_reserves as u128) + (amount as u128);
        let r = n / i + 1;
        let s = (self.virtual_token_reserves as u128).saturating_sub(r) as u64;

        Ok(s.min(self.real_token_reserves))
    }

    /// Lamports received for selling `amount` tokens, net of `fee_basis_points`.
    pub fn get_sell_price(&self, amount: u64, fee_basis_points: u64) -> Result<u64, &'static str> {
        if self.complete {
            return Err("curve is complete");
        }
        if amount == 0 {
            return Ok(0);
        }

        let n = ((amount as u128) * (self.virtual_sol_reserves as u128))
            / ((self.virtual_token_reserves as u128) + (amount as u128));
        let fee = (n * (fee_basis_points as u128)) / 10_000;
        Ok((n - fee) as u64)
    }

    /// Mid-price in lamports per base-unit token, from virtual reserves.
    pub fn mid_price(&self) -> f64 {
        if self.virtual_token_reserves == 0 {
            return 0.0;
        }
        self.virtual_sol_reserves as f64 / self.virtual_token_reserves as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BondingCurveAccount {
        BondingCurveAccount {
            account: Pubkey::new_unique(),
            virtual_token_reserves: 1_073_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 793_100_000_000_000,
            real_sol_reserves: 0,
            token_total_supply: 1_000_000_000_000_000,
            complete: false,
            creator: Some(Pubkey::new_unique()),
            is_mayhem_mode: false,
        }
    }

    #[test]
    fn parse_round_trips_extended_layout() {
        let curve = sample();
        let bytes = curve.to_bytes();
        assert_eq!(bytes.len(), BONDING_CURVE_EXTENDED_LEN);
        let parsed = BondingCurveAccount::parse(curve.account, &bytes).unwrap();
        assert_eq!(parsed, curve);
    }

    #[test]
    fn parse_round_trips_legacy_layout() {
        let mut curve = sample();
        curve.creator = None;
        let bytes = curve.to_bytes();
        assert_eq!(bytes.len(), BONDING_CURVE_LEGACY_LEN);
        let parsed = BondingCurveAccount::parse(curve.account, &bytes).unwrap();
        assert_eq!(parsed, curve);
    }

    #[test]
    fn rejects_wrong_discriminator() {
        let mut bytes = sample().to_bytes();
        bytes[0] ^= 0xff;
        assert!(BondingCurveAccount::parse(Pubkey::new_unique(), &bytes).is_err());
    }

    #[test]
    fn buy_price_respects_real_reserves() {
        let mut curve = sample();
        curve.real_token_reserves = 10;
        assert_eq!(curve.get_buy_price(1_000_000_000).unwrap(), 10);
    }

    #[test]
    fn complete_curve_refuses_pricing() {
        let mut curve = sample();
        curve.complete = true;
        assert!(curve.get_buy_price(1).is_err());
        assert!(curve.get_sell_price(1, 100).is_err());
    }
}
