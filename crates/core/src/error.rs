//! Revert reasons surfaced by the pool.
//!
//! Every mutating entry point validates before it writes: a returned error
//! always implies an untouched ledger. Callers are expected to re-simulate
//! and resubmit; nothing is retried internally.

use lendpool_oracle::OracleError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    // Configuration
    #[error("reserve is not registered")]
    ReserveNotFound,
    #[error("reserve is inactive")]
    ReserveInactive,
    #[error("reserve is frozen")]
    ReserveFrozen,
    #[error("reserve configuration is invalid")]
    InvalidReserveConfig,
    #[error("auction strategy parameters are invalid")]
    InvalidAuctionStrategy,
    #[error("reserve has no auction strategy configured")]
    AuctionStrategyNotConfigured,
    #[error("operation requires a fungible reserve")]
    NotFungibleReserve,
    #[error("operation requires an NFT reserve")]
    NotNftReserve,

    // Authorization / ownership
    #[error("caller is not the position owner")]
    NotTheOwner,
    #[error("token is not held in the ledger for this borrower")]
    TokenNotFound,
    #[error("token is already supplied to the ledger")]
    TokenAlreadySupplied,
    #[error("token is not flagged as collateral")]
    TokenNotCollateral,

    // Solvency gates
    #[error("health factor is not below the liquidation threshold")]
    HealthFactorNotBelowThreshold,
    #[error("resulting health factor would fall below the liquidation threshold")]
    HealthFactorLowerThanLiquidationThreshold,
    #[error("ERC721 health factor is not below the liquidation threshold")]
    Erc721HealthFactorNotBelowThreshold,
    #[error("ERC721 health factor is not above the recovery threshold")]
    Erc721HealthFactorNotAboveThreshold,

    // Auction state machine
    #[error("auction has already been started for this token")]
    AuctionAlreadyStarted,
    #[error("no auction is active for this token")]
    AuctionNotStarted,
    #[error("token is under an active auction")]
    TokenInAuction,

    // Economic / amount
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("not enough balance to cover the request")]
    NotEnoughAvailableBalance,
    #[error("underlying balance is zero")]
    UnderlyingBalanceZero,
    #[error("borrowing is not enabled on this reserve")]
    BorrowingNotEnabled,
    #[error("supply cap exceeded")]
    SupplyCapExceeded,
    #[error("borrow cap exceeded")]
    BorrowCapExceeded,
    #[error("collateral balance is zero")]
    CollateralBalanceIsZero,
    #[error("collateral cannot cover the new borrow")]
    CollateralCannotCoverNewBorrow,
    #[error("borrower has no debt in the specified currency")]
    SpecifiedCurrencyNotBorrowed,
    #[error("supplied amount does not reach the liquidation price")]
    LiquidationAmountNotEnough,

    // Call discipline
    #[error("re-entrant call into a mutating entry point")]
    ReentrantCall,

    #[error(transparent)]
    Oracle(#[from] OracleError),
}
