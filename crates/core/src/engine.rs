//! Pool entry points.
//!
//! `LendingPool` owns every mutable piece of state (ledger, auction book,
//! event log) behind a single-writer discipline: callers serialize access
//! externally and a re-entrancy flag rejects nested mutating calls. Every
//! operation validates fully before the first ledger write, so an error
//! return always leaves the pool untouched.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use lendpool_oracle::{Clock, PriceOracle};
use tracing::{debug, info};

use crate::auction::{AuctionBook, AuctionEntry, AuctionStatus};
use crate::config::RiskParams;
use crate::error::PoolError;
use crate::events::Event;
use crate::health::{self, AccountData};
use crate::ledger::{PositionLedger, UserConfig, UserPosition};
use crate::math::{self, WAD};
use crate::reserve::{ReserveConfig, ReserveId, ReserveRegistry};

/// Outbound settlement hook.
///
/// Invoked strictly after all ledger writes of an operation; implementations
/// must not call back into the pool.
pub trait ValueTransfer: Send + Sync {
    fn transfer_asset(&self, asset: Address, to: Address, amount: U256);
    fn transfer_nft(&self, collection: Address, to: Address, token_id: U256);
}

/// Default hook that settles nothing.
pub struct NoopTransfer;

impl ValueTransfer for NoopTransfer {
    fn transfer_asset(&self, _asset: Address, _to: Address, _amount: U256) {}
    fn transfer_nft(&self, _collection: Address, _to: Address, _token_id: U256) {}
}

pub struct LendingPool {
    pub(crate) registry: ReserveRegistry,
    pub(crate) params: RiskParams,
    pub(crate) ledger: PositionLedger,
    pub(crate) auctions: AuctionBook,
    pub(crate) oracle: Arc<dyn PriceOracle>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) transfers: Arc<dyn ValueTransfer>,
    pub(crate) events: Vec<Event>,
    in_call: bool,
}

impl LendingPool {
    pub fn new(
        registry: ReserveRegistry,
        params: RiskParams,
        oracle: Arc<dyn PriceOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            params,
            ledger: PositionLedger::new(),
            auctions: AuctionBook::new(),
            oracle,
            clock,
            transfers: Arc::new(NoopTransfer),
            events: Vec::new(),
            in_call: false,
        }
    }

    pub fn with_transfers(mut self, transfers: Arc<dyn ValueTransfer>) -> Self {
        self.transfers = transfers;
        self
    }

    // --- views ---

    pub fn registry(&self) -> &ReserveRegistry {
        &self.registry
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn get_user_account_data(&self, user: Address) -> Result<AccountData, PoolError> {
        self.account_data_for(&self.ledger.snapshot(user))
    }

    pub fn get_user_configuration(&self, user: Address) -> UserConfig {
        self.ledger.snapshot(user).config
    }

    /// Auction snapshot for a token; `None` when no effective auction exists
    /// (absent, or voided by the owner's validity stamp).
    pub fn get_auction_data(
        &self,
        collection: Address,
        token_id: U256,
    ) -> Result<Option<AuctionStatus>, PoolError> {
        let config = *self.registry.by_asset(collection)?;
        if !config.kind.is_nft() {
            return Err(PoolError::NotNftReserve);
        }
        let Some(entry) = self.auctions.get(config.id, token_id) else {
            return Ok(None);
        };
        let Some(owner) = self.ledger.owner_of(config.id, token_id) else {
            return Ok(None);
        };
        let validity = self.ledger.snapshot(owner).config.auction_validity_ts;
        if !entry.is_valid_against(validity) {
            return Ok(None);
        }
        Ok(Some(AuctionStatus::of(entry, self.clock.now())))
    }

    /// Drain the accumulated event log.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // --- fungible supply side ---

    pub fn supply(
        &mut self,
        caller: Address,
        asset: Address,
        amount: U256,
        on_behalf_of: Address,
    ) -> Result<(), PoolError> {
        self.locked(|pool| {
            if amount.is_zero() {
                return Err(PoolError::InvalidAmount);
            }
            let config = pool.fungible_reserve(asset)?;
            require_usable(&config)?;
            if let Some(cap) = config.supply_cap_units() {
                if pool.ledger.totals(config.id).supplied + amount > cap {
                    return Err(PoolError::SupplyCapExceeded);
                }
            }

            let first = pool.ledger.credit_collateral(on_behalf_of, config.id, amount);
            if first {
                // First supply enables the balance as collateral.
                pool.ledger
                    .position_mut(on_behalf_of)
                    .config
                    .set_collateral_enabled(config.id, true);
            }
            debug!(reserve = %config.id, user = %on_behalf_of, %amount, "supplied");
            pool.events.push(Event::Supplied {
                reserve: config.id,
                caller,
                on_behalf_of,
                amount,
            });
            Ok(())
        })
    }

    /// Withdraw supplied collateral. `U256::MAX` withdraws the full balance.
    /// Returns the amount withdrawn.
    pub fn withdraw(
        &mut self,
        caller: Address,
        asset: Address,
        amount: U256,
        to: Address,
    ) -> Result<U256, PoolError> {
        self.locked(|pool| {
            if amount.is_zero() {
                return Err(PoolError::InvalidAmount);
            }
            let config = pool.fungible_reserve(asset)?;
            require_active(&config)?;

            let balance = pool.ledger.snapshot(caller).collateral_of(config.id);
            if balance.is_zero() {
                return Err(PoolError::UnderlyingBalanceZero);
            }
            let amount = if amount == U256::MAX { balance } else { amount };
            if amount > balance {
                return Err(PoolError::NotEnoughAvailableBalance);
            }

            let mut simulated = pool.ledger.snapshot(caller);
            let counted = simulated.config.is_collateral_enabled(config.id);
            simulated.debit_collateral(config.id, amount);
            if counted && simulated.has_any_debt() {
                let data = pool.account_data_for(&simulated)?;
                if data.health_factor < WAD {
                    return Err(PoolError::HealthFactorLowerThanLiquidationThreshold);
                }
            }

            pool.ledger.debit_collateral(caller, config.id, amount, true);
            pool.transfers.transfer_asset(asset, to, amount);
            debug!(reserve = %config.id, user = %caller, %amount, "withdrawn");
            pool.events.push(Event::Withdrawn {
                reserve: config.id,
                caller,
                to,
                amount,
            });
            Ok(amount)
        })
    }

    pub fn set_collateral(
        &mut self,
        caller: Address,
        asset: Address,
        enabled: bool,
    ) -> Result<(), PoolError> {
        self.locked(|pool| {
            let config = pool.fungible_reserve(asset)?;
            require_active(&config)?;

            let snapshot = pool.ledger.snapshot(caller);
            if snapshot.collateral_of(config.id).is_zero() {
                return Err(PoolError::UnderlyingBalanceZero);
            }
            if !enabled && snapshot.has_any_debt() {
                let mut simulated = snapshot;
                simulated.config.set_collateral_enabled(config.id, false);
                let data = pool.account_data_for(&simulated)?;
                if data.health_factor < WAD {
                    return Err(PoolError::HealthFactorLowerThanLiquidationThreshold);
                }
            }

            pool.ledger
                .position_mut(caller)
                .config
                .set_collateral_enabled(config.id, enabled);
            pool.events.push(Event::CollateralToggled {
                reserve: config.id,
                user: caller,
                enabled,
            });
            Ok(())
        })
    }

    // --- NFT supply side ---

    pub fn supply_nft(
        &mut self,
        caller: Address,
        collection: Address,
        token_ids: &[U256],
        on_behalf_of: Address,
    ) -> Result<(), PoolError> {
        self.locked(|pool| {
            if token_ids.is_empty() {
                return Err(PoolError::InvalidAmount);
            }
            let config = pool.nft_reserve(collection)?;
            require_usable(&config)?;
            if let Some(cap) = config.supply_cap_units() {
                let incoming = U256::from(token_ids.len() as u64);
                if pool.ledger.totals(config.id).supplied + incoming > cap {
                    return Err(PoolError::SupplyCapExceeded);
                }
            }
            for token_id in token_ids {
                if pool.ledger.owner_of(config.id, *token_id).is_some() {
                    return Err(PoolError::TokenAlreadySupplied);
                }
            }

            for token_id in token_ids {
                // Incoming tokens count as collateral until toggled off.
                pool.ledger.insert_nft(on_behalf_of, config.id, *token_id, true);
            }
            debug!(reserve = %config.id, user = %on_behalf_of, count = token_ids.len(), "nfts supplied");
            pool.events.push(Event::NftSupplied {
                reserve: config.id,
                caller,
                on_behalf_of,
                token_ids: token_ids.to_vec(),
            });
            Ok(())
        })
    }

    pub fn withdraw_nft(
        &mut self,
        caller: Address,
        collection: Address,
        token_ids: &[U256],
        to: Address,
    ) -> Result<(), PoolError> {
        self.locked(|pool| {
            if token_ids.is_empty() {
                return Err(PoolError::InvalidAmount);
            }
            let config = pool.nft_reserve(collection)?;
            require_active(&config)?;

            for token_id in token_ids {
                match pool.ledger.owner_of(config.id, *token_id) {
                    Some(owner) if owner == caller => {}
                    Some(_) => return Err(PoolError::NotTheOwner),
                    None => return Err(PoolError::TokenNotFound),
                }
                pool.require_not_auctioned(caller, config.id, *token_id)?;
            }

            let mut simulated = pool.ledger.snapshot(caller);
            for token_id in token_ids {
                simulated.remove_nft(config.id, *token_id);
            }
            if simulated.has_any_debt() {
                let data = pool.account_data_for(&simulated)?;
                if data.health_factor < WAD {
                    return Err(PoolError::HealthFactorLowerThanLiquidationThreshold);
                }
            }

            for token_id in token_ids {
                pool.ledger.remove_nft(caller, config.id, *token_id);
                pool.transfers.transfer_nft(collection, to, *token_id);
            }
            debug!(reserve = %config.id, user = %caller, count = token_ids.len(), "nfts withdrawn");
            pool.events.push(Event::NftWithdrawn {
                reserve: config.id,
                caller,
                to,
                token_ids: token_ids.to_vec(),
            });
            Ok(())
        })
    }

    pub fn set_nft_collateral(
        &mut self,
        caller: Address,
        collection: Address,
        token_ids: &[U256],
        enabled: bool,
    ) -> Result<(), PoolError> {
        self.locked(|pool| {
            if token_ids.is_empty() {
                return Err(PoolError::InvalidAmount);
            }
            let config = pool.nft_reserve(collection)?;
            require_active(&config)?;

            let snapshot = pool.ledger.snapshot(caller);
            for token_id in token_ids {
                if snapshot.nft_slot(config.id, *token_id).is_none() {
                    return Err(PoolError::TokenNotFound);
                }
                if !enabled {
                    pool.require_not_auctioned(caller, config.id, *token_id)?;
                }
            }

            if !enabled && snapshot.has_any_debt() {
                let mut simulated = snapshot;
                for token_id in token_ids {
                    simulated.set_nft_collateral(config.id, *token_id, false);
                }
                let data = pool.account_data_for(&simulated)?;
                if data.health_factor < WAD {
                    return Err(PoolError::HealthFactorLowerThanLiquidationThreshold);
                }
            }

            let position = pool.ledger.position_mut(caller);
            for token_id in token_ids {
                position.set_nft_collateral(config.id, *token_id, enabled);
            }
            pool.events.push(Event::NftCollateralToggled {
                reserve: config.id,
                user: caller,
                token_ids: token_ids.to_vec(),
                enabled,
            });
            Ok(())
        })
    }

    // --- borrow side ---

    pub fn borrow(
        &mut self,
        caller: Address,
        asset: Address,
        amount: U256,
        on_behalf_of: Address,
    ) -> Result<(), PoolError> {
        self.locked(|pool| {
            if amount.is_zero() {
                return Err(PoolError::InvalidAmount);
            }
            let config = pool.fungible_reserve(asset)?;
            require_usable(&config)?;
            if !config.borrowing_enabled {
                return Err(PoolError::BorrowingNotEnabled);
            }

            let totals = pool.ledger.totals(config.id);
            if let Some(cap) = config.borrow_cap_units() {
                if totals.debt + amount > cap {
                    return Err(PoolError::BorrowCapExceeded);
                }
            }
            if totals.supplied.saturating_sub(totals.debt) < amount {
                return Err(PoolError::NotEnoughAvailableBalance);
            }

            let data = pool.get_user_account_data(on_behalf_of)?;
            if data.total_collateral_value.is_zero() {
                return Err(PoolError::CollateralBalanceIsZero);
            }
            if data.health_factor < WAD {
                return Err(PoolError::HealthFactorLowerThanLiquidationThreshold);
            }
            let price = pool.oracle.asset_price(asset)?;
            let borrow_value = math::value_wad(amount, price, config.kind.decimals());
            if borrow_value > data.available_borrow_value {
                return Err(PoolError::CollateralCannotCoverNewBorrow);
            }

            pool.ledger.credit_debt(on_behalf_of, config.id, amount);
            pool.transfers.transfer_asset(asset, caller, amount);
            info!(reserve = %config.id, user = %on_behalf_of, %amount, "borrowed");
            pool.events.push(Event::Borrowed {
                reserve: config.id,
                caller,
                on_behalf_of,
                amount,
            });
            Ok(())
        })
    }

    /// Repay outstanding debt, clamped to the balance. Returns the amount
    /// actually repaid.
    pub fn repay(
        &mut self,
        caller: Address,
        asset: Address,
        amount: U256,
        on_behalf_of: Address,
    ) -> Result<U256, PoolError> {
        self.locked(|pool| {
            if amount.is_zero() {
                return Err(PoolError::InvalidAmount);
            }
            let config = pool.fungible_reserve(asset)?;
            require_active(&config)?;

            let debt = pool.ledger.snapshot(on_behalf_of).debt_of(config.id);
            if debt.is_zero() {
                return Err(PoolError::SpecifiedCurrencyNotBorrowed);
            }
            let repaid = amount.min(debt);

            pool.ledger.debit_debt(on_behalf_of, config.id, repaid);
            info!(reserve = %config.id, user = %on_behalf_of, amount = %repaid, "repaid");
            pool.events.push(Event::Repaid {
                reserve: config.id,
                caller,
                on_behalf_of,
                amount: repaid,
            });
            Ok(repaid)
        })
    }

    // --- auction state machine ---

    /// Open a Dutch auction on an NFT whose owner's ERC721 health factor is
    /// below par. Strategy parameters are frozen into the entry at start.
    pub fn start_auction(
        &mut self,
        caller: Address,
        collection: Address,
        token_id: U256,
    ) -> Result<(), PoolError> {
        self.locked(|pool| {
            let config = pool.nft_reserve(collection)?;
            require_active(&config)?;
            let strategy = *config
                .kind
                .auction_strategy()
                .ok_or(PoolError::AuctionStrategyNotConfigured)?;

            let owner = pool
                .ledger
                .owner_of(config.id, token_id)
                .ok_or(PoolError::TokenNotFound)?;
            let position = pool.ledger.snapshot(owner);
            let slot = position
                .nft_slot(config.id, token_id)
                .ok_or(PoolError::TokenNotFound)?;
            if !slot.use_as_collateral {
                return Err(PoolError::TokenNotCollateral);
            }
            if pool
                .effective_auction(config.id, token_id, position.config.auction_validity_ts)
                .is_some()
            {
                return Err(PoolError::AuctionAlreadyStarted);
            }

            let data = pool.account_data_for(&position)?;
            if data.erc721_health_factor >= WAD {
                return Err(PoolError::Erc721HealthFactorNotBelowThreshold);
            }

            let now = pool.clock.now();
            let entry = AuctionEntry::new(now, config.id, token_id, &strategy);
            pool.auctions.insert(entry);
            info!(
                reserve = %config.id,
                %token_id,
                borrower = %owner,
                by = %caller,
                start_ts = now,
                "auction started"
            );
            pool.events.push(Event::AuctionStarted {
                reserve: config.id,
                borrower: owner,
                token_id,
                start_ts: now,
                starting_price_multiplier: strategy.max_price_multiplier,
            });
            Ok(())
        })
    }

    /// Close an auction on a token the caller owns, once the position has
    /// recovered to the configured threshold.
    pub fn end_auction(
        &mut self,
        caller: Address,
        collection: Address,
        token_id: U256,
    ) -> Result<(), PoolError> {
        self.locked(|pool| {
            let config = pool.nft_reserve(collection)?;
            require_active(&config)?;

            let owner = pool
                .ledger
                .owner_of(config.id, token_id)
                .ok_or(PoolError::TokenNotFound)?;
            if owner != caller {
                return Err(PoolError::NotTheOwner);
            }
            let position = pool.ledger.snapshot(owner);
            if pool
                .effective_auction(config.id, token_id, position.config.auction_validity_ts)
                .is_none()
            {
                return Err(PoolError::AuctionNotStarted);
            }

            let data = pool.account_data_for(&position)?;
            if data.erc721_health_factor < pool.params.recovery_hf_wad() {
                return Err(PoolError::Erc721HealthFactorNotAboveThreshold);
            }

            pool.auctions.remove(config.id, token_id);
            info!(reserve = %config.id, %token_id, borrower = %owner, "auction ended");
            pool.events.push(Event::AuctionEnded {
                reserve: config.id,
                borrower: owner,
                token_id,
            });
            Ok(())
        })
    }

    /// Void all of the caller's running auctions in one write by stamping
    /// the validity timestamp. Stale entries are pruned lazily when next
    /// touched. Returns the stamp.
    pub fn set_auction_validity_time(&mut self, caller: Address) -> Result<u64, PoolError> {
        self.locked(|pool| {
            let data = pool.get_user_account_data(caller)?;
            if data.erc721_health_factor < pool.params.recovery_hf_wad() {
                return Err(PoolError::Erc721HealthFactorNotAboveThreshold);
            }

            let now = pool.clock.now();
            pool.ledger.position_mut(caller).config.auction_validity_ts = now;
            info!(borrower = %caller, valid_from = now, "auctions invalidated");
            pool.events.push(Event::AuctionsInvalidated {
                borrower: caller,
                valid_from: now,
            });
            Ok(now)
        })
    }

    // --- internals ---

    pub(crate) fn locked<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        if self.in_call {
            return Err(PoolError::ReentrantCall);
        }
        self.in_call = true;
        let out = f(self);
        self.in_call = false;
        out
    }

    pub(crate) fn account_data_for(&self, position: &UserPosition) -> Result<AccountData, PoolError> {
        health::account_data(&self.registry, self.oracle.as_ref(), position)
    }

    pub(crate) fn fungible_reserve(&self, asset: Address) -> Result<ReserveConfig, PoolError> {
        let config = *self.registry.by_asset(asset)?;
        if config.kind.is_nft() {
            return Err(PoolError::NotFungibleReserve);
        }
        Ok(config)
    }

    pub(crate) fn nft_reserve(&self, collection: Address) -> Result<ReserveConfig, PoolError> {
        let config = *self.registry.by_asset(collection)?;
        if !config.kind.is_nft() {
            return Err(PoolError::NotNftReserve);
        }
        Ok(config)
    }

    /// The effective auction entry for a token, pruning a voided one.
    pub(crate) fn effective_auction(
        &mut self,
        reserve: ReserveId,
        token_id: U256,
        auction_validity_ts: u64,
    ) -> Option<AuctionEntry> {
        let entry = *self.auctions.get(reserve, token_id)?;
        if entry.is_valid_against(auction_validity_ts) {
            Some(entry)
        } else {
            self.auctions.remove(reserve, token_id);
            None
        }
    }

    /// Reject operations on a token with an effective auction.
    fn require_not_auctioned(
        &mut self,
        owner: Address,
        reserve: ReserveId,
        token_id: U256,
    ) -> Result<(), PoolError> {
        let validity = self.ledger.snapshot(owner).config.auction_validity_ts;
        if self.effective_auction(reserve, token_id, validity).is_some() {
            return Err(PoolError::TokenInAuction);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn poison_reentrancy_guard(&mut self) {
        self.in_call = true;
    }
}

pub(crate) fn require_active(config: &ReserveConfig) -> Result<(), PoolError> {
    if !config.active {
        return Err(PoolError::ReserveInactive);
    }
    Ok(())
}

/// Active and not frozen; frozen reserves still allow withdraw and repay.
fn require_usable(config: &ReserveConfig) -> Result<(), PoolError> {
    require_active(config)?;
    if config.frozen {
        return Err(PoolError::ReserveFrozen);
    }
    Ok(())
}
