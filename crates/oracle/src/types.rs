//! Oracle type definitions.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Decimals carried by every oracle price (base-currency units).
pub const PRICE_DECIMALS: u8 = 8;

/// Errors surfaced by price lookups.
///
/// The engine treats any of these as fatal for the current call: a missing
/// or stale price aborts the whole operation, nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("no price feed for asset {0}")]
    MissingPrice(Address),
    #[error("price for asset {0} is stale")]
    StalePrice(Address),
    #[error("price for asset {0} is zero")]
    ZeroPrice(Address),
    #[error("submitted price for asset {0} deviates too far from the last accepted floor")]
    DeviationTooLarge(Address),
}

/// Synchronous price source consumed by the risk engine.
///
/// Both lookups return a unit price with [`PRICE_DECIMALS`] decimals. For
/// NFT collections the price is the floor price of a single item.
pub trait PriceOracle: Send + Sync {
    fn asset_price(&self, asset: Address) -> Result<U256, OracleError>;

    fn nft_floor_price(&self, collection: Address) -> Result<U256, OracleError>;
}

/// A price observation with its update time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePoint {
    /// Price in base-currency units (8 decimals)
    pub price: U256,
    /// Timestamp of the update (unix seconds)
    pub updated_at: u64,
}

impl PricePoint {
    pub fn new(price: U256, updated_at: u64) -> Self {
        Self { price, updated_at }
    }

    /// Age of the observation in seconds.
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.updated_at)
    }

    /// Check whether the observation is older than `threshold_secs`.
    pub fn is_stale(&self, threshold_secs: u64, now: u64) -> bool {
        self.age_secs(now) > threshold_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_is_measured_from_update_time() {
        let point = PricePoint::new(U256::from(100_000_000u64), 1_000);
        assert!(!point.is_stale(60, 1_050));
        assert!(!point.is_stale(60, 1_060));
        assert!(point.is_stale(60, 1_061));
        // Clock going backwards never reports stale
        assert!(!point.is_stale(60, 900));
    }
}
