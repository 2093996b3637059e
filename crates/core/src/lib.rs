//! Risk and liquidation engine for a pooled lending market with fungible
//! and NFT collateral.
//!
//! The crate is a deterministic in-memory core: a [`LendingPool`] owns the
//! position ledger, the reserve registry and the Dutch-auction book, and
//! exposes synchronous entry points that validate fully before writing.
//! Prices and time come in through the traits in `lendpool-oracle`; nothing
//! here performs I/O.

pub mod auction;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod health;
pub mod ledger;
pub mod liquidation;
pub mod math;
pub mod reserve;

#[cfg(test)]
mod testutil;

pub use auction::{AuctionBook, AuctionEntry, AuctionStatus, AuctionStrategy};
pub use config::{RiskParams, RiskParamsFile};
pub use engine::{LendingPool, NoopTransfer, ValueTransfer};
pub use error::PoolError;
pub use events::Event;
pub use health::{account_data, AccountData, ReserveValue};
pub use ledger::{
    FungibleBalance, NftSlot, PositionLedger, ReserveFlags, ReserveTotals, UserConfig, UserPosition,
};
pub use liquidation::{Erc20Liquidation, Erc721Liquidation};
pub use reserve::{ReserveConfig, ReserveId, ReserveKind, ReserveRegistry};
