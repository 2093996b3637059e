//! Shared test fixtures.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use lendpool_oracle::{ManualClock, StaticOracle};

use crate::auction::AuctionStrategy;
use crate::config::RiskParams;
use crate::engine::LendingPool;
use crate::math::f64_to_wad;
use crate::reserve::{ReserveConfig, ReserveId, ReserveRegistry};

pub(crate) const USDC: Address = Address::repeat_byte(0x01);
pub(crate) const WETH: Address = Address::repeat_byte(0x02);
pub(crate) const APES: Address = Address::repeat_byte(0x03);
pub(crate) const PUNKS: Address = Address::repeat_byte(0x04);
pub(crate) const TREASURY: Address = Address::repeat_byte(0xF0);

pub(crate) const ALICE: Address = Address::repeat_byte(0xA1);
pub(crate) const BOB: Address = Address::repeat_byte(0xB1);
pub(crate) const LIQUIDATOR: Address = Address::repeat_byte(0xD1);

pub(crate) struct Harness {
    pub pool: LendingPool,
    pub oracle: Arc<StaticOracle>,
    pub clock: Arc<ManualClock>,
}

/// Four reserves:
/// - r0 USDC, 6 dec, borrowable, 10% liquidation protocol fee
/// - r1 WETH, 18 dec, borrowable
/// - r2 APES, NFT with an auction strategy (300% -> 50%, 5% per 60s tick)
/// - r3 PUNKS, NFT without a strategy (direct liquidation path)
///
/// Prices: USDC $1, WETH $2000, APES floor $100, PUNKS floor $200.
pub(crate) fn harness() -> Harness {
    let mut registry = ReserveRegistry::new();
    registry
        .add(
            ReserveConfig::fungible(ReserveId(0), USDC, 6)
                .with_risk_params(8_000, 8_500, 10_500)
                .with_protocol_fee(1_000)
                .with_borrowing(true),
        )
        .unwrap();
    registry
        .add(
            ReserveConfig::fungible(ReserveId(1), WETH, 18)
                .with_risk_params(7_000, 8_000, 10_500)
                .with_borrowing(true),
        )
        .unwrap();
    let strategy =
        AuctionStrategy::new(f64_to_wad(3.0), f64_to_wad(0.5), 60, f64_to_wad(0.05)).unwrap();
    registry
        .add(
            ReserveConfig::non_fungible(ReserveId(2), APES, Some(strategy))
                .with_risk_params(4_000, 6_000, 10_500),
        )
        .unwrap();
    registry
        .add(
            ReserveConfig::non_fungible(ReserveId(3), PUNKS, None)
                .with_risk_params(3_000, 5_000, 11_000),
        )
        .unwrap();

    let clock = Arc::new(ManualClock::new(1_000));
    let oracle = Arc::new(StaticOracle::new(clock.clone()));
    oracle.set_price(USDC, U256::from(100_000_000u64)); // $1
    oracle.set_price(WETH, U256::from(200_000_000_000u64)); // $2000
    oracle.set_floor_price(APES, U256::from(10_000_000_000u64)); // $100
    oracle.set_floor_price(PUNKS, U256::from(20_000_000_000u64)); // $200

    let params = RiskParams::new(ReserveId(0), TREASURY);
    let pool = LendingPool::new(registry, params, oracle.clone(), clock.clone());
    Harness { pool, oracle, clock }
}

pub(crate) fn usdc(units: u64) -> U256 {
    U256::from(units) * U256::from(1_000_000u64)
}

pub(crate) fn weth(milli: u64) -> U256 {
    U256::from(milli) * U256::from(1_000_000_000_000_000u64)
}

/// Bob supplies deep USDC liquidity so others can borrow.
pub(crate) fn seed_liquidity(h: &mut Harness) {
    h.pool.supply(BOB, USDC, usdc(1_000_000), BOB).unwrap();
}
