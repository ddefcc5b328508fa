//! Slippage arithmetic shared by every instruction builder.
//!
//! All helpers floor toward the caller-favourable side: a buy bound rounds
//! the maximum cost down, a sell bound rounds the minimum receipt down.

use crate::constants::trade::NOMINAL_TOKENS_PER_TRADE;

/// Maximum input the caller is willing to pay for a buy:
/// `floor(amount * (1 + slippage))`.
pub fn max_amount_with_slippage(amount: u64, slippage_bps: u64) -> u64 {
    let amount = amount as u128;
    (amount + amount * slippage_bps as u128 / 10_000) as u64
}

/// Minimum output the caller will accept from a sell:
/// `floor(amount * (1 - slippage))`.
///
/// Single division: subtracting a floored term would round the wrong way.
pub fn min_amount_with_slippage(amount: u64, slippage_bps: u64) -> u64 {
    let remaining_bps = 10_000u128.saturating_sub(slippage_bps as u128);
    (amount as u128 * remaining_bps / 10_000) as u64
}

/// Expected base-token output for `quote_in` against constant-product
/// reserves: `floor(quote_in * base / (quote + quote_in))`.
///
/// Falls back to a fixed nominal expectation when either reserve reads back
/// zero (stale account, fresh pool), so a trade can still be composed with
/// the configured slippage doing the real protection.
pub fn expected_base_out(quote_in: u64, base_reserve: u64, quote_reserve: u64) -> u64 {
    if base_reserve == 0 || quote_reserve == 0 {
        return NOMINAL_TOKENS_PER_TRADE.max(1);
    }
    let out = (quote_in as u128) * (base_reserve as u128)
        / ((quote_reserve as u128) + (quote_in as u128));
    (out as u64).max(1)
}

/// Expected quote output for selling `base_in` against constant-product
/// reserves: `floor(base_in * quote / (base + base_in))`.
pub fn expected_quote_out(base_in: u64, base_reserve: u64, quote_reserve: u64) -> u64 {
    if base_reserve == 0 || quote_reserve == 0 {
        return 1;
    }
    let out = (base_in as u128) * (quote_reserve as u128)
        / ((base_reserve as u128) + (base_in as u128));
    (out as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_bound_adds_tolerance() {
        assert_eq!(max_amount_with_slippage(1_000_000, 500), 1_050_000);
        assert_eq!(max_amount_with_slippage(0, 500), 0);
    }

    #[test]
    fn sell_bound_subtracts_tolerance() {
        assert_eq!(min_amount_with_slippage(1_000_000, 500), 950_000);
        // Non-divisible case floors the product, not the subtracted term:
        // floor(7 * 6667 / 10000) = 4, not 7 - floor(7 * 3333 / 10000) = 5.
        assert_eq!(min_amount_with_slippage(7, 3_333), 4);
        // 100% slippage floors at zero rather than underflowing.
        assert_eq!(min_amount_with_slippage(7, 10_000), 0);
    }

    #[test]
    fn zero_reserves_fall_back_to_nominal() {
        assert_eq!(expected_base_out(1_000, 0, 0), NOMINAL_TOKENS_PER_TRADE);
        assert!(expected_quote_out(1_000, 0, 5) >= 1);
    }

    #[test]
    fn constant_product_shape() {
        // Buying with quote equal to the quote reserve yields half the base.
        assert_eq!(expected_base_out(100, 1_000, 100), 500);
    }
}
