//! Scripted end-to-end run of the lending pool.
//!
//! Builds a small in-memory market, walks one borrower through a supply,
//! borrow, floor-price crash, Dutch auction and liquidation, and logs the
//! account state at every step. Time is driven by a manual clock so the
//! auction decay is visible without waiting for wall-clock ticks.
//!
//! Set `RISK_PARAMS=/path/to/params.toml` to override the protocol
//! parameters; `RUST_LOG=lendpool_core=debug` shows individual ledger
//! writes.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use anyhow::Result;
use lendpool_core::math::{f64_to_wad, wad_to_f64};
use lendpool_core::{
    AuctionStrategy, LendingPool, ReserveConfig, ReserveId, ReserveRegistry, RiskParams,
};
use lendpool_oracle::{Clock, ManualClock, StaticOracle};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const USDC: Address = Address::repeat_byte(0x01);
const APES: Address = Address::repeat_byte(0x03);
const TREASURY: Address = Address::repeat_byte(0xF0);

const ALICE: Address = Address::repeat_byte(0xA1);
const BOB: Address = Address::repeat_byte(0xB1);
const LIQUIDATOR: Address = Address::repeat_byte(0xD1);

fn usdc(units: u64) -> U256 {
    U256::from(units) * U256::from(1_000_000u64)
}

/// 8-decimal oracle price from whole dollars.
fn dollars(units: u64) -> U256 {
    U256::from(units) * U256::from(100_000_000u64)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lendpool_core=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let params = match std::env::var("RISK_PARAMS") {
        Ok(path) => RiskParams::from_toml_file(&path)?,
        Err(_) => RiskParams::new(ReserveId(0), TREASURY),
    };
    info!(?params, "risk parameters");

    let mut registry = ReserveRegistry::new();
    registry.add(
        ReserveConfig::fungible(ReserveId(0), USDC, 6)
            .with_risk_params(8_000, 8_500, 10_500)
            .with_protocol_fee(1_000)
            .with_borrowing(true),
    )?;
    // 300% opening multiplier, 50% floor, 5% drop per 60s tick.
    let strategy = AuctionStrategy::new(f64_to_wad(3.0), f64_to_wad(0.5), 60, f64_to_wad(0.05))?;
    registry.add(
        ReserveConfig::non_fungible(ReserveId(2), APES, Some(strategy))
            .with_risk_params(4_000, 6_000, 10_500),
    )?;

    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let oracle = Arc::new(StaticOracle::new(clock.clone()));
    oracle.set_price(USDC, dollars(1));
    oracle.set_floor_price(APES, dollars(100));

    let mut pool = LendingPool::new(registry, params, oracle.clone(), clock.clone());

    // Bob provides lending liquidity; Alice borrows against one ape.
    pool.supply(BOB, USDC, usdc(1_000_000), BOB)?;
    let token = U256::from(7u64);
    pool.supply_nft(ALICE, APES, &[token], ALICE)?;
    pool.borrow(ALICE, USDC, usdc(40), ALICE)?;

    let data = pool.get_user_account_data(ALICE)?;
    info!(
        collateral = wad_to_f64(data.total_collateral_value),
        debt = wad_to_f64(data.total_debt_value),
        hf = wad_to_f64(data.health_factor),
        "position opened"
    );

    // The floor halves and the NFT layer can no longer cover the debt.
    oracle.set_floor_price(APES, dollars(50));
    let data = pool.get_user_account_data(ALICE)?;
    info!(
        hf = wad_to_f64(data.health_factor),
        erc721_hf = wad_to_f64(data.erc721_health_factor),
        "floor crashed"
    );

    pool.start_auction(LIQUIDATOR, APES, token)?;
    for _ in 0..5 {
        clock.advance(240);
        if let Some(status) = pool.get_auction_data(APES, token)? {
            info!(
                elapsed = clock.now() - status.start_ts,
                multiplier = wad_to_f64(status.current_price_multiplier),
                "auction decaying"
            );
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    // 20 minutes in the multiplier has reached 2.0: the ape sells for $100.
    let outcome = pool.liquidate_erc721(LIQUIDATOR, APES, token, usdc(200), false)?;
    info!(
        price = %outcome.price,
        repaid = %outcome.debt_repaid,
        excess = %outcome.excess_supplied,
        "erc721 liquidation settled"
    );

    let data = pool.get_user_account_data(ALICE)?;
    info!(
        debt = wad_to_f64(data.total_debt_value),
        usdc_collateral = %pool.ledger().snapshot(ALICE).collateral_of(ReserveId(0)),
        events = pool.drain_events().len(),
        "final borrower state"
    );
    Ok(())
}
