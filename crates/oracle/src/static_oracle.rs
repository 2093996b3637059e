//! Writable in-memory price oracle.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use tracing::debug;

use crate::time::Clock;
use crate::types::{OracleError, PriceOracle, PricePoint};

/// In-memory oracle backed by a concurrent price table.
///
/// Used by tests and the demo binary; prices are pushed in by whoever owns
/// the oracle and read synchronously by the engine. An optional max age
/// turns reads of old observations into `StalePrice` errors.
pub struct StaticOracle {
    prices: DashMap<Address, PricePoint>,
    floors: DashMap<Address, PricePoint>,
    max_age_secs: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl StaticOracle {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            prices: DashMap::new(),
            floors: DashMap::new(),
            max_age_secs: None,
            clock,
        }
    }

    /// Enable staleness checking with the given threshold.
    pub fn with_max_age(mut self, max_age_secs: u64) -> Self {
        self.max_age_secs = Some(max_age_secs);
        self
    }

    /// Set the unit price of a fungible asset (8 decimals).
    pub fn set_price(&self, asset: Address, price: U256) {
        let now = self.clock.now();
        debug!(%asset, %price, now, "oracle price updated");
        self.prices.insert(asset, PricePoint::new(price, now));
    }

    /// Set the floor price of an NFT collection (8 decimals).
    pub fn set_floor_price(&self, collection: Address, price: U256) {
        let now = self.clock.now();
        debug!(%collection, %price, now, "floor price updated");
        self.floors.insert(collection, PricePoint::new(price, now));
    }

    fn read(&self, table: &DashMap<Address, PricePoint>, asset: Address) -> Result<U256, OracleError> {
        let point = table
            .get(&asset)
            .map(|p| *p)
            .ok_or(OracleError::MissingPrice(asset))?;
        if let Some(max_age) = self.max_age_secs {
            if point.is_stale(max_age, self.clock.now()) {
                return Err(OracleError::StalePrice(asset));
            }
        }
        if point.price.is_zero() {
            return Err(OracleError::ZeroPrice(asset));
        }
        Ok(point.price)
    }
}

impl PriceOracle for StaticOracle {
    fn asset_price(&self, asset: Address) -> Result<U256, OracleError> {
        self.read(&self.prices, asset)
    }

    fn nft_floor_price(&self, collection: Address) -> Result<U256, OracleError> {
        self.read(&self.floors, collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    fn setup() -> (Arc<ManualClock>, StaticOracle) {
        let clock = Arc::new(ManualClock::new(1_000));
        let oracle = StaticOracle::new(clock.clone()).with_max_age(600);
        (clock, oracle)
    }

    #[test]
    fn missing_price_errors() {
        let (_, oracle) = setup();
        let asset = Address::repeat_byte(1);
        assert_eq!(
            oracle.asset_price(asset),
            Err(OracleError::MissingPrice(asset))
        );
    }

    #[test]
    fn stale_price_errors_after_max_age() {
        let (clock, oracle) = setup();
        let asset = Address::repeat_byte(1);
        oracle.set_price(asset, U256::from(100_000_000u64));
        assert_eq!(oracle.asset_price(asset), Ok(U256::from(100_000_000u64)));

        clock.advance(601);
        assert_eq!(oracle.asset_price(asset), Err(OracleError::StalePrice(asset)));
    }

    #[test]
    fn zero_price_errors() {
        let (_, oracle) = setup();
        let collection = Address::repeat_byte(2);
        oracle.set_floor_price(collection, U256::ZERO);
        assert_eq!(
            oracle.nft_floor_price(collection),
            Err(OracleError::ZeroPrice(collection))
        );
    }
}
