//! Dutch-auction state for NFT collateral.
//!
//! One entry per auctioned (reserve, token id). The price multiplier is
//! derived from elapsed ticks at read time; nothing is ticked by a clock
//! process. Entries are created by `start_auction`, removed by liquidation,
//! manual end, or transfer out of the ledger, and lazily invalidated in
//! bulk by the owner's `auction_validity_ts`.

use std::collections::BTreeMap;

use alloy::primitives::U256;

use crate::error::PoolError;
use crate::math::WAD;
use crate::reserve::ReserveId;

/// Price-decay parameters attached to an NFT reserve.
///
/// The multiplier starts at `max_price_multiplier` (WAD, > 100%), drops by
/// `price_drop_per_tick` for every fully elapsed `tick_length_secs`, and is
/// floored at `min_price_multiplier` (<= 100%).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionStrategy {
    pub max_price_multiplier: U256,
    pub min_price_multiplier: U256,
    pub tick_length_secs: u64,
    pub price_drop_per_tick: U256,
}

impl AuctionStrategy {
    pub fn new(
        max_price_multiplier: U256,
        min_price_multiplier: U256,
        tick_length_secs: u64,
        price_drop_per_tick: U256,
    ) -> Result<Self, PoolError> {
        if max_price_multiplier <= WAD
            || min_price_multiplier > WAD
            || min_price_multiplier.is_zero()
            || tick_length_secs == 0
            || price_drop_per_tick.is_zero()
        {
            return Err(PoolError::InvalidAuctionStrategy);
        }
        Ok(Self {
            max_price_multiplier,
            min_price_multiplier,
            tick_length_secs,
            price_drop_per_tick,
        })
    }
}

/// Live auction record for one NFT instance.
///
/// Strategy parameters are frozen into the entry at start time so a later
/// admin retune never changes a running auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionEntry {
    pub start_ts: u64,
    pub reserve: ReserveId,
    pub token_id: U256,
    pub tick_length_secs: u64,
    pub max_price_multiplier: U256,
    pub min_price_multiplier: U256,
    pub price_drop_per_tick: U256,
}

impl AuctionEntry {
    pub fn new(start_ts: u64, reserve: ReserveId, token_id: U256, strategy: &AuctionStrategy) -> Self {
        Self {
            start_ts,
            reserve,
            token_id,
            tick_length_secs: strategy.tick_length_secs,
            max_price_multiplier: strategy.max_price_multiplier,
            min_price_multiplier: strategy.min_price_multiplier,
            price_drop_per_tick: strategy.price_drop_per_tick,
        }
    }

    /// Decayed multiplier after the ticks elapsed by `now`.
    ///
    /// Non-increasing in `now` and never below the floor.
    pub fn current_price_multiplier(&self, now: u64) -> U256 {
        let elapsed = now.saturating_sub(self.start_ts);
        let ticks = elapsed / self.tick_length_secs;
        let drop = self.price_drop_per_tick * U256::from(ticks);
        let decayed = self.max_price_multiplier.saturating_sub(drop);
        decayed.max(self.min_price_multiplier)
    }

    /// Whether the entry survives the owner's batch invalidation stamp.
    pub fn is_valid_against(&self, auction_validity_ts: u64) -> bool {
        self.start_ts > auction_validity_ts
    }
}

/// Snapshot of an auction returned by the read view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionStatus {
    pub start_ts: u64,
    pub reserve: ReserveId,
    pub token_id: U256,
    pub tick_length_secs: u64,
    pub current_price_multiplier: U256,
    pub max_price_multiplier: U256,
    pub min_price_multiplier: U256,
}

impl AuctionStatus {
    pub fn of(entry: &AuctionEntry, now: u64) -> Self {
        Self {
            start_ts: entry.start_ts,
            reserve: entry.reserve,
            token_id: entry.token_id,
            tick_length_secs: entry.tick_length_secs,
            current_price_multiplier: entry.current_price_multiplier(now),
            max_price_multiplier: entry.max_price_multiplier,
            min_price_multiplier: entry.min_price_multiplier,
        }
    }
}

/// All live auction entries, keyed by (reserve, token id).
///
/// Sole writer of entries; the pool decides validity against the owner's
/// `auction_validity_ts` before trusting one.
#[derive(Debug, Default)]
pub struct AuctionBook {
    entries: BTreeMap<(ReserveId, U256), AuctionEntry>,
}

impl AuctionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reserve: ReserveId, token_id: U256) -> Option<&AuctionEntry> {
        self.entries.get(&(reserve, token_id))
    }

    pub fn insert(&mut self, entry: AuctionEntry) {
        self.entries.insert((entry.reserve, entry.token_id), entry);
    }

    pub fn remove(&mut self, reserve: ReserveId, token_id: U256) -> Option<AuctionEntry> {
        self.entries.remove(&(reserve, token_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::f64_to_wad;

    fn strategy() -> AuctionStrategy {
        // 300% start, 50% floor, 5% drop per 60s tick
        AuctionStrategy::new(f64_to_wad(3.0), f64_to_wad(0.5), 60, f64_to_wad(0.05)).unwrap()
    }

    #[test]
    fn strategy_validation() {
        assert_eq!(
            AuctionStrategy::new(f64_to_wad(0.9), f64_to_wad(0.5), 60, f64_to_wad(0.05)),
            Err(PoolError::InvalidAuctionStrategy)
        );
        assert_eq!(
            AuctionStrategy::new(f64_to_wad(3.0), f64_to_wad(1.2), 60, f64_to_wad(0.05)),
            Err(PoolError::InvalidAuctionStrategy)
        );
        assert_eq!(
            AuctionStrategy::new(f64_to_wad(3.0), f64_to_wad(0.5), 0, f64_to_wad(0.05)),
            Err(PoolError::InvalidAuctionStrategy)
        );
    }

    #[test]
    fn multiplier_starts_at_max_and_decays_per_tick() {
        let entry = AuctionEntry::new(1_000, ReserveId(2), U256::from(7u64), &strategy());
        assert_eq!(entry.current_price_multiplier(1_000), f64_to_wad(3.0));
        // Mid-tick: unchanged
        assert_eq!(entry.current_price_multiplier(1_059), f64_to_wad(3.0));
        // One tick
        assert_eq!(entry.current_price_multiplier(1_060), f64_to_wad(2.95));
        // Ten ticks
        assert_eq!(entry.current_price_multiplier(1_600), f64_to_wad(2.5));
    }

    #[test]
    fn multiplier_is_monotone_and_floored() {
        let entry = AuctionEntry::new(0, ReserveId(2), U256::from(7u64), &strategy());
        let mut last = entry.current_price_multiplier(0);
        for now in (0..100_000).step_by(37) {
            let current = entry.current_price_multiplier(now);
            assert!(current <= last, "multiplier increased at t={now}");
            assert!(current >= f64_to_wad(0.5), "multiplier crossed floor at t={now}");
            last = current;
        }
        // Deep into the auction the floor holds exactly.
        assert_eq!(entry.current_price_multiplier(10_000_000), f64_to_wad(0.5));
    }

    #[test]
    fn validity_stamp_cuts_off_older_starts() {
        let entry = AuctionEntry::new(500, ReserveId(2), U256::from(7u64), &strategy());
        assert!(entry.is_valid_against(0));
        assert!(entry.is_valid_against(499));
        // A stamp at or after the start invalidates it.
        assert!(!entry.is_valid_against(500));
        assert!(!entry.is_valid_against(600));
    }

    #[test]
    fn book_insert_get_remove() {
        let mut book = AuctionBook::new();
        let entry = AuctionEntry::new(10, ReserveId(1), U256::from(3u64), &strategy());
        book.insert(entry);
        assert_eq!(book.get(ReserveId(1), U256::from(3u64)), Some(&entry));
        assert!(book.get(ReserveId(1), U256::from(4u64)).is_none());
        assert_eq!(book.remove(ReserveId(1), U256::from(3u64)), Some(entry));
        assert!(book.is_empty());
    }
}
