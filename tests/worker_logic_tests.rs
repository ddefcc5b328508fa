//! Worker decision logic: alternation, sizing, and error classification,
//! checked against the engine's documented boundary behaviors.

use sol_mm_engine::common::types::sol_to_lamports;
use sol_mm_engine::engine::next_side;
use sol_mm_engine::trading::error::{classify, failure_backoff};
use sol_mm_engine::trading::{TradeError, TradeSide, compute_trade_size};

/// Simulates a worker's life: each confirmed trade bumps the counter and
/// moves inventory the way the venue would.
fn run_cycles(start_trades: u64, start_inventory: u64, cycles: usize) -> Vec<TradeSide> {
    let mut trades = start_trades;
    let mut inventory = start_inventory;
    let mut sides = Vec::with_capacity(cycles);
    for _ in 0..cycles {
        let side = next_side(trades, inventory);
        match side {
            TradeSide::Buy => inventory += 1_000,
            TradeSide::Sell => inventory = 0,
        }
        trades += 1;
        sides.push(side);
    }
    sides
}

#[test]
fn alternation_is_strict_from_a_cold_start() {
    let sides = run_cycles(0, 0, 8);
    let expected: Vec<TradeSide> = (0..8)
        .map(|i| if i % 2 == 0 { TradeSide::Buy } else { TradeSide::Sell })
        .collect();
    assert_eq!(sides, expected);
}

#[test]
fn restart_with_hydrated_counter_preserves_alternation() {
    // A worker died after 40 confirmed trades and sold out its inventory.
    // The replacement hydrates total_trades = 40 from the store: 40 is even,
    // so the next trade is a buy, then the alternation continues unbroken.
    let sides = run_cycles(40, 0, 4);
    assert_eq!(
        sides,
        vec![TradeSide::Buy, TradeSide::Sell, TradeSide::Buy, TradeSide::Sell]
    );
}

#[test]
fn zero_inventory_allows_at_most_one_extra_buy() {
    // Odd counter but empty inventory (e.g. tokens swept externally):
    // the sell upgrades to a buy once, then normal alternation resumes.
    let sides = run_cycles(1, 0, 3);
    assert_eq!(sides[0], TradeSide::Buy);
    assert_eq!(sides[1], TradeSide::Buy); // counter now even, still buys
    assert_eq!(sides[2], TradeSide::Sell);
    // Never two sells in a row anywhere.
    for pair in sides.windows(2) {
        assert!(!(pair[0] == TradeSide::Sell && pair[1] == TradeSide::Sell));
    }
}

#[test]
fn cold_start_sizing_matches_the_ceiling() {
    // Vault 0.1 SOL, reserve 0.01, on-chain pct 10: available 0.09, ceiling
    // 0.009 * 0.95 = 0.00855. The roll cannot push past the ceiling.
    for roll in [0.0, 0.25, 0.5, 0.99] {
        let chosen = compute_trade_size(
            sol_to_lamports(0.1),
            sol_to_lamports(0.01),
            10,
            sol_to_lamports(0.005),
            sol_to_lamports(0.05),
            (25, 75),
            roll,
        )
        .unwrap();
        assert!(chosen <= sol_to_lamports(0.00855));
        assert!(chosen >= sol_to_lamports(0.005));
    }
}

#[test]
fn zero_trade_size_pct_never_trades() {
    for roll in [0.0, 0.5, 1.0] {
        assert_eq!(
            compute_trade_size(
                sol_to_lamports(10.0),
                sol_to_lamports(0.01),
                0,
                sol_to_lamports(0.005),
                sol_to_lamports(0.05),
                (25, 75),
                roll,
            ),
            None
        );
    }
}

#[test]
fn drained_vault_produces_no_size() {
    assert_eq!(
        compute_trade_size(
            sol_to_lamports(0.008),
            sol_to_lamports(0.01),
            10,
            sol_to_lamports(0.005),
            sol_to_lamports(0.05),
            (25, 75),
            0.5,
        ),
        None
    );
}

#[test]
fn graduation_error_code_is_not_a_failure_class() {
    // The exact text an RPC returns for the curve-complete rejection.
    let rpc_text = "Error processing Instruction 1: custom program error: 0x1775";
    assert_eq!(classify(rpc_text), TradeError::PoolComplete);

    // Decimal rendering in program logs classifies the same way only via
    // the named message, not the bare number.
    assert_eq!(classify("BondingCurveComplete"), TradeError::PoolComplete);
}

#[test]
fn classifier_table() {
    assert!(matches!(classify("dns error: connection timed out"), TradeError::TransientNetwork(_)));
    assert!(matches!(classify("HTTP 502 Bad Gateway"), TradeError::TransientNetwork(_)));
    assert!(matches!(classify("429 Too Many Requests"), TradeError::RateLimited(_)));
    assert!(matches!(
        classify("Transfer: insufficient lamports 833, need 9000000"),
        TradeError::FundsInsufficient(_)
    ));
    assert!(matches!(
        classify("slippage: output below minimum"),
        TradeError::SlippageExceeded(_)
    ));
    assert!(matches!(
        classify("Invalid param: could not find account"),
        TradeError::AccountMissing(_)
    ));
    // On-chain rejections the engine does not recognize stay fatal and are
    // retried with backoff rather than halting the worker.
    assert!(matches!(classify("operator mismatch"), TradeError::Fatal(_)));
}

#[test]
fn backoff_schedule_is_bounded() {
    let mut previous = std::time::Duration::ZERO;
    for failures in 0..30 {
        let delay = failure_backoff(failures);
        assert!(delay >= previous, "backoff must be monotonic");
        assert!(delay <= std::time::Duration::from_secs(60));
        previous = delay;
    }
    assert_eq!(failure_backoff(0), std::time::Duration::from_secs(5));
}
