//! Decentralized floor-price aggregation for NFT collections.
//!
//! A set of whitelisted feeders pushes floor observations; the feed keeps
//! the latest observation per feeder, aggregates fresh ones with a median,
//! rejects submissions that jump too far from the last accepted floor, and
//! exposes the accepted history as a spot floor and a time-weighted
//! average.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::static_oracle::StaticOracle;
use crate::time::Clock;
use crate::types::{OracleError, PriceOracle, PricePoint};

const BPS: u64 = 10_000;

/// Aggregation and validity rules for one collection feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorFeedConfig {
    /// Feeder observations and accepted floors older than this are ignored
    pub max_age_secs: u64,
    /// Maximum allowed jump against the last accepted floor
    pub max_deviation_bps: u16,
    /// Fresh observations required before a floor is accepted
    pub min_observations: usize,
    /// Accepted floors kept for TWAP computation
    pub history: usize,
}

impl Default for FloorFeedConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 1_800,
            max_deviation_bps: 2_000,
            min_observations: 3,
            history: 128,
        }
    }
}

#[derive(Debug, Default)]
struct FeedState {
    /// Latest observation per feeder
    submissions: BTreeMap<Address, PricePoint>,
    /// Accepted aggregated floors, oldest first
    accepted: VecDeque<PricePoint>,
}

/// Floor-price feed for a single NFT collection.
pub struct FloorPriceFeed {
    collection: Address,
    config: FloorFeedConfig,
    state: RwLock<FeedState>,
}

impl FloorPriceFeed {
    pub fn new(collection: Address, config: FloorFeedConfig) -> Self {
        Self {
            collection,
            config,
            state: RwLock::new(FeedState::default()),
        }
    }

    pub fn collection(&self) -> Address {
        self.collection
    }

    /// Record one feeder observation.
    ///
    /// Returns the newly accepted floor when enough fresh observations are
    /// present, `None` while the quorum is still forming.
    pub fn submit(
        &self,
        feeder: Address,
        price: U256,
        now: u64,
    ) -> Result<Option<U256>, OracleError> {
        if price.is_zero() {
            return Err(OracleError::ZeroPrice(self.collection));
        }

        let mut state = self.state.write();

        // Deviation guard on the submission itself, against the last
        // accepted floor, unless that floor has expired. Rejected
        // submissions leave no trace.
        let last_accepted = state.accepted.back().copied();
        if let Some(last) = last_accepted {
            if !last.is_stale(self.config.max_age_secs, now)
                && deviation_bps(last.price, price) > u64::from(self.config.max_deviation_bps)
            {
                warn!(
                    collection = %self.collection,
                    last = %last.price,
                    submitted = %price,
                    "floor submission rejected: deviation too large"
                );
                return Err(OracleError::DeviationTooLarge(self.collection));
            }
        }
        state.submissions.insert(feeder, PricePoint::new(price, now));

        let mut fresh: Vec<U256> = state
            .submissions
            .values()
            .filter(|p| !p.is_stale(self.config.max_age_secs, now))
            .map(|p| p.price)
            .collect();
        if fresh.len() < self.config.min_observations {
            return Ok(None);
        }

        let floor = median(&mut fresh);

        if state.accepted.len() == self.config.history {
            state.accepted.pop_front();
        }
        state.accepted.push_back(PricePoint::new(floor, now));
        debug!(collection = %self.collection, %floor, now, "floor accepted");
        Ok(Some(floor))
    }

    /// Latest accepted floor, or an error when none exists or it expired.
    pub fn current_floor(&self, now: u64) -> Result<U256, OracleError> {
        let state = self.state.read();
        let last = state
            .accepted
            .back()
            .ok_or(OracleError::MissingPrice(self.collection))?;
        if last.is_stale(self.config.max_age_secs, now) {
            return Err(OracleError::StalePrice(self.collection));
        }
        Ok(last.price)
    }

    /// Time-weighted average of accepted floors over the trailing window.
    ///
    /// Each accepted floor is weighted by the time it was in effect, clipped
    /// to the window. A single accepted point degenerates to the spot floor.
    pub fn twap(&self, window_secs: u64, now: u64) -> Result<U256, OracleError> {
        let state = self.state.read();
        if state.accepted.is_empty() {
            return Err(OracleError::MissingPrice(self.collection));
        }
        let window_start = now.saturating_sub(window_secs);

        let mut weighted = U256::ZERO;
        let mut total_weight = 0u64;
        let mut effective_until = now;
        for point in state.accepted.iter().rev() {
            if effective_until <= window_start {
                break;
            }
            let from = point.updated_at.max(window_start);
            let weight = effective_until.saturating_sub(from);
            weighted += point.price * U256::from(weight);
            total_weight += weight;
            effective_until = point.updated_at;
        }

        if total_weight == 0 {
            // All points share a timestamp on the window edge; use the spot.
            return self.current_floor(now);
        }
        Ok(weighted / U256::from(total_weight))
    }
}

/// Sorted middle, or the average of the two middle elements.
fn median(values: &mut [U256]) -> U256 {
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / U256::from(2u8)
    } else {
        values[mid]
    }
}

/// Absolute deviation between two prices in basis points of the reference.
fn deviation_bps(reference: U256, value: U256) -> u64 {
    if reference.is_zero() {
        return u64::MAX;
    }
    let diff = if value >= reference {
        value - reference
    } else {
        reference - value
    };
    let bps = diff * U256::from(BPS) / reference;
    bps.try_into().unwrap_or(u64::MAX)
}

/// Oracle combining a writable fungible price table with per-collection
/// floor feeds.
pub struct FloorOracle {
    fungibles: StaticOracle,
    feeds: DashMap<Address, Arc<FloorPriceFeed>>,
    clock: Arc<dyn Clock>,
}

impl FloorOracle {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            fungibles: StaticOracle::new(clock.clone()),
            feeds: DashMap::new(),
            clock,
        }
    }

    /// Register a feed for a collection, replacing any existing one.
    pub fn register_feed(&self, collection: Address, config: FloorFeedConfig) -> Arc<FloorPriceFeed> {
        let feed = Arc::new(FloorPriceFeed::new(collection, config));
        self.feeds.insert(collection, feed.clone());
        feed
    }

    /// Push one feeder observation for a collection.
    pub fn submit_floor(
        &self,
        collection: Address,
        feeder: Address,
        price: U256,
    ) -> Result<Option<U256>, OracleError> {
        let feed = self
            .feeds
            .get(&collection)
            .map(|f| f.clone())
            .ok_or(OracleError::MissingPrice(collection))?;
        feed.submit(feeder, price, self.clock.now())
    }

    /// Writable fungible-asset price table.
    pub fn fungibles(&self) -> &StaticOracle {
        &self.fungibles
    }
}

impl PriceOracle for FloorOracle {
    fn asset_price(&self, asset: Address) -> Result<U256, OracleError> {
        self.fungibles.asset_price(asset)
    }

    fn nft_floor_price(&self, collection: Address) -> Result<U256, OracleError> {
        let feed = self
            .feeds
            .get(&collection)
            .map(|f| f.clone())
            .ok_or(OracleError::MissingPrice(collection))?;
        feed.current_floor(self.clock.now())
    }
}
