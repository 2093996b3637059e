//! Reserve configuration and registry.
//!
//! The registry is read-only from the engine's perspective: it is built up
//! front by the admin collaborator and never mutated during a call.

use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::{Address, U256};

use crate::auction::AuctionStrategy;
use crate::error::PoolError;
use crate::math::pow10;

/// Dense reserve index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReserveId(pub u16);

impl fmt::Display for ReserveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Fungible vs. NFT reserve, with the auction strategy riding on the NFT
/// variant. A strategy of `None` routes the reserve through the direct
/// (non-auction) ERC721 liquidation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveKind {
    Fungible { decimals: u8 },
    NonFungible { auction_strategy: Option<AuctionStrategy> },
}

impl ReserveKind {
    pub fn is_nft(&self) -> bool {
        matches!(self, Self::NonFungible { .. })
    }

    /// Token decimals; NFT counts are whole units.
    pub fn decimals(&self) -> u8 {
        match self {
            Self::Fungible { decimals } => *decimals,
            Self::NonFungible { .. } => 0,
        }
    }

    pub fn auction_strategy(&self) -> Option<&AuctionStrategy> {
        match self {
            Self::NonFungible { auction_strategy } => auction_strategy.as_ref(),
            Self::Fungible { .. } => None,
        }
    }
}

/// Per-asset risk parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveConfig {
    pub id: ReserveId,
    pub asset: Address,
    pub kind: ReserveKind,
    /// Loan-to-value in basis points
    pub ltv: u16,
    /// Liquidation threshold in basis points, >= `ltv`
    pub liquidation_threshold: u16,
    /// Liquidation bonus in basis points, >= 10000
    pub liquidation_bonus: u16,
    /// Share of the liquidation bonus routed to the protocol
    pub liquidation_protocol_fee_bps: u16,
    /// Supply cap in whole tokens (NFT count for collections); 0 = uncapped
    pub supply_cap: u64,
    /// Borrow cap in whole tokens; 0 = uncapped
    pub borrow_cap: u64,
    pub active: bool,
    pub frozen: bool,
    pub borrowing_enabled: bool,
}

impl ReserveConfig {
    pub fn fungible(id: ReserveId, asset: Address, decimals: u8) -> Self {
        Self {
            id,
            asset,
            kind: ReserveKind::Fungible { decimals },
            ltv: 0,
            liquidation_threshold: 0,
            liquidation_bonus: 10_000,
            liquidation_protocol_fee_bps: 0,
            supply_cap: 0,
            borrow_cap: 0,
            active: true,
            frozen: false,
            borrowing_enabled: false,
        }
    }

    pub fn non_fungible(id: ReserveId, asset: Address, auction_strategy: Option<AuctionStrategy>) -> Self {
        Self {
            id,
            asset,
            kind: ReserveKind::NonFungible { auction_strategy },
            ltv: 0,
            liquidation_threshold: 0,
            liquidation_bonus: 10_000,
            liquidation_protocol_fee_bps: 0,
            supply_cap: 0,
            borrow_cap: 0,
            active: true,
            frozen: false,
            borrowing_enabled: false,
        }
    }

    pub fn with_risk_params(mut self, ltv: u16, liquidation_threshold: u16, liquidation_bonus: u16) -> Self {
        self.ltv = ltv;
        self.liquidation_threshold = liquidation_threshold;
        self.liquidation_bonus = liquidation_bonus;
        self
    }

    pub fn with_protocol_fee(mut self, fee_bps: u16) -> Self {
        self.liquidation_protocol_fee_bps = fee_bps;
        self
    }

    pub fn with_caps(mut self, supply_cap: u64, borrow_cap: u64) -> Self {
        self.supply_cap = supply_cap;
        self.borrow_cap = borrow_cap;
        self
    }

    pub fn with_borrowing(mut self, enabled: bool) -> Self {
        self.borrowing_enabled = enabled;
        self
    }

    fn validate(&self) -> Result<(), PoolError> {
        if self.liquidation_threshold < self.ltv
            || self.liquidation_threshold > 10_000
            || self.liquidation_bonus < 10_000
            || self.liquidation_protocol_fee_bps > 10_000
        {
            return Err(PoolError::InvalidReserveConfig);
        }
        if self.kind.is_nft() && self.borrowing_enabled {
            return Err(PoolError::InvalidReserveConfig);
        }
        Ok(())
    }

    /// Supply cap in native units.
    pub fn supply_cap_units(&self) -> Option<U256> {
        (self.supply_cap > 0).then(|| U256::from(self.supply_cap) * pow10(self.kind.decimals()))
    }

    /// Borrow cap in native units.
    pub fn borrow_cap_units(&self) -> Option<U256> {
        (self.borrow_cap > 0).then(|| U256::from(self.borrow_cap) * pow10(self.kind.decimals()))
    }
}

/// Read-only per-asset configuration table.
#[derive(Debug, Default)]
pub struct ReserveRegistry {
    by_id: BTreeMap<ReserveId, ReserveConfig>,
    by_asset: BTreeMap<Address, ReserveId>,
}

impl ReserveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reserve; ids and asset addresses are unique.
    pub fn add(&mut self, config: ReserveConfig) -> Result<(), PoolError> {
        config.validate()?;
        if self.by_id.contains_key(&config.id) || self.by_asset.contains_key(&config.asset) {
            return Err(PoolError::InvalidReserveConfig);
        }
        self.by_asset.insert(config.asset, config.id);
        self.by_id.insert(config.id, config);
        Ok(())
    }

    pub fn get(&self, id: ReserveId) -> Result<&ReserveConfig, PoolError> {
        self.by_id.get(&id).ok_or(PoolError::ReserveNotFound)
    }

    pub fn by_asset(&self, asset: Address) -> Result<&ReserveConfig, PoolError> {
        let id = self.by_asset.get(&asset).ok_or(PoolError::ReserveNotFound)?;
        self.get(*id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReserveConfig> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_must_cover_ltv() {
        let mut registry = ReserveRegistry::new();
        let bad = ReserveConfig::fungible(ReserveId(0), Address::repeat_byte(1), 18)
            .with_risk_params(8000, 7000, 10500);
        assert_eq!(registry.add(bad), Err(PoolError::InvalidReserveConfig));

        let good = ReserveConfig::fungible(ReserveId(0), Address::repeat_byte(1), 18)
            .with_risk_params(7000, 8000, 10500);
        assert!(registry.add(good).is_ok());
    }

    #[test]
    fn bonus_below_par_is_rejected() {
        let mut registry = ReserveRegistry::new();
        let bad = ReserveConfig::fungible(ReserveId(0), Address::repeat_byte(1), 18)
            .with_risk_params(7000, 8000, 9_999);
        assert_eq!(registry.add(bad), Err(PoolError::InvalidReserveConfig));
    }

    #[test]
    fn duplicate_ids_and_assets_are_rejected() {
        let mut registry = ReserveRegistry::new();
        registry
            .add(ReserveConfig::fungible(ReserveId(0), Address::repeat_byte(1), 18))
            .unwrap();
        assert_eq!(
            registry.add(ReserveConfig::fungible(ReserveId(0), Address::repeat_byte(2), 18)),
            Err(PoolError::InvalidReserveConfig)
        );
        assert_eq!(
            registry.add(ReserveConfig::fungible(ReserveId(1), Address::repeat_byte(1), 18)),
            Err(PoolError::InvalidReserveConfig)
        );
    }

    #[test]
    fn nft_reserves_cannot_enable_borrowing() {
        let mut registry = ReserveRegistry::new();
        let bad = ReserveConfig::non_fungible(ReserveId(0), Address::repeat_byte(1), None)
            .with_borrowing(true);
        assert_eq!(registry.add(bad), Err(PoolError::InvalidReserveConfig));
    }

    #[test]
    fn caps_convert_to_native_units() {
        let config = ReserveConfig::fungible(ReserveId(0), Address::repeat_byte(1), 6)
            .with_caps(1_000, 500);
        assert_eq!(config.supply_cap_units(), Some(U256::from(1_000_000_000u64)));
        assert_eq!(config.borrow_cap_units(), Some(U256::from(500_000_000u64)));

        let uncapped = ReserveConfig::fungible(ReserveId(1), Address::repeat_byte(2), 6);
        assert_eq!(uncapped.supply_cap_units(), None);
    }
}
