//! Price oracle layer for the lending pool.
//!
//! This crate provides:
//! - The `PriceOracle` trait consumed by the risk engine (fungible unit
//!   prices and NFT floor prices, both in the 8-decimal base currency)
//! - A writable in-memory oracle for tests and local runs
//! - A decentralized floor-price feed with median aggregation, expiry and
//!   deviation guards, and a TWAP view
//! - The `Clock` abstraction the engine uses for auction decay

mod feed;
mod static_oracle;
mod time;
mod types;

pub use feed::{FloorFeedConfig, FloorOracle, FloorPriceFeed};
pub use static_oracle::StaticOracle;
pub use time::{Clock, ManualClock, SystemClock};
pub use types::{OracleError, PriceOracle, PricePoint, PRICE_DECIMALS};
