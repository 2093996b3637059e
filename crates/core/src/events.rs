//! State-change events emitted by the pool.
//!
//! One event per successful mutating entry point. The pool keeps them in an
//! in-memory log that the surrounding indexing layer drains; the engine
//! itself never reads them back.

use alloy::primitives::{Address, U256};

use crate::reserve::ReserveId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Supplied {
        reserve: ReserveId,
        caller: Address,
        on_behalf_of: Address,
        amount: U256,
    },
    NftSupplied {
        reserve: ReserveId,
        caller: Address,
        on_behalf_of: Address,
        token_ids: Vec<U256>,
    },
    Withdrawn {
        reserve: ReserveId,
        caller: Address,
        to: Address,
        amount: U256,
    },
    NftWithdrawn {
        reserve: ReserveId,
        caller: Address,
        to: Address,
        token_ids: Vec<U256>,
    },
    CollateralToggled {
        reserve: ReserveId,
        user: Address,
        enabled: bool,
    },
    NftCollateralToggled {
        reserve: ReserveId,
        user: Address,
        token_ids: Vec<U256>,
        enabled: bool,
    },
    Borrowed {
        reserve: ReserveId,
        caller: Address,
        on_behalf_of: Address,
        amount: U256,
    },
    Repaid {
        reserve: ReserveId,
        caller: Address,
        on_behalf_of: Address,
        amount: U256,
    },
    AuctionStarted {
        reserve: ReserveId,
        borrower: Address,
        token_id: U256,
        start_ts: u64,
        starting_price_multiplier: U256,
    },
    AuctionEnded {
        reserve: ReserveId,
        borrower: Address,
        token_id: U256,
    },
    AuctionsInvalidated {
        borrower: Address,
        valid_from: u64,
    },
    Erc20Liquidated {
        collateral_reserve: ReserveId,
        debt_reserve: ReserveId,
        borrower: Address,
        liquidator: Address,
        debt_repaid: U256,
        collateral_seized: U256,
        protocol_fee: U256,
        received_share_token: bool,
    },
    Erc721Liquidated {
        reserve: ReserveId,
        borrower: Address,
        liquidator: Address,
        token_id: U256,
        price: U256,
        debt_repaid: U256,
        excess_supplied: U256,
        received_share_token: bool,
    },
}
