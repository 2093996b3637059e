//! Liquidation entry points.
//!
//! Two paths close unhealthy positions. The ERC20 path repays a slice of
//! one debt reserve against one fungible collateral reserve at a bonus,
//! sized by the close factor. The ERC721 path buys a single NFT out of the
//! position at either its decayed auction price or a discounted floor,
//! settling in the configured settlement reserve; proceeds repay that
//! reserve's debt first and any excess is credited back to the borrower as
//! supplied collateral.

use alloy::primitives::{Address, U256};
use tracing::info;

use crate::engine::{require_active, LendingPool};
use crate::error::PoolError;
use crate::events::Event;
use crate::math::{self, WAD};

/// Outcome of an ERC20 liquidation, in native token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20Liquidation {
    pub debt_repaid: U256,
    pub collateral_seized: U256,
    /// Slice of the seized collateral kept in-pool for the treasury
    pub protocol_fee: U256,
}

/// Outcome of an ERC721 liquidation, in settlement-reserve units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc721Liquidation {
    pub price: U256,
    pub debt_repaid: U256,
    /// Proceeds above the outstanding debt, re-supplied for the borrower
    pub excess_supplied: U256,
}

impl LendingPool {
    /// Repay part of `borrower`'s debt and seize fungible collateral at the
    /// reserve's liquidation bonus.
    ///
    /// The repayable slice is capped by the close factor: 50% of the debt
    /// balance by default, 100% once the health factor falls to the deep
    /// threshold. When the collateral balance cannot cover the bonus-scaled
    /// claim, the seizure is capped at the balance and the repaid debt is
    /// derived back from it.
    pub fn liquidate_erc20(
        &mut self,
        caller: Address,
        collateral_asset: Address,
        debt_asset: Address,
        borrower: Address,
        debt_to_cover: U256,
        receive_share_token: bool,
    ) -> Result<Erc20Liquidation, PoolError> {
        self.locked(|pool| {
            if debt_to_cover.is_zero() {
                return Err(PoolError::InvalidAmount);
            }
            let coll = pool.fungible_reserve(collateral_asset)?;
            let debt = pool.fungible_reserve(debt_asset)?;
            require_active(&coll)?;
            require_active(&debt)?;

            let position = pool.ledger.snapshot(borrower);
            let data = pool.account_data_for(&position)?;
            if data.health_factor >= WAD {
                return Err(PoolError::HealthFactorNotBelowThreshold);
            }

            let debt_balance = position.debt_of(debt.id);
            if debt_balance.is_zero() {
                return Err(PoolError::SpecifiedCurrencyNotBorrowed);
            }
            let collateral_balance = position.collateral_of(coll.id);
            if collateral_balance.is_zero() || !position.config.is_collateral_enabled(coll.id) {
                return Err(PoolError::CollateralBalanceIsZero);
            }

            let close_bps = if data.health_factor <= pool.params.close_factor_threshold_wad() {
                pool.params.max_close_factor_bps
            } else {
                pool.params.default_close_factor_bps
            };
            let mut debt_repaid = debt_to_cover.min(math::percent_mul(debt_balance, close_bps));

            let debt_price = pool.oracle.asset_price(debt_asset)?;
            let coll_price = pool.oracle.asset_price(collateral_asset)?;
            let debt_decimals = debt.kind.decimals();
            let coll_decimals = coll.kind.decimals();

            let debt_value = math::value_wad(debt_repaid, debt_price, debt_decimals);
            let gross_value = math::percent_mul(debt_value, coll.liquidation_bonus);
            let mut collateral_seized = math::amount_from_value(gross_value, coll_price, coll_decimals);
            if collateral_seized > collateral_balance {
                collateral_seized = collateral_balance;
                let covered_value = math::percent_div(
                    math::value_wad(collateral_seized, coll_price, coll_decimals),
                    coll.liquidation_bonus,
                );
                debt_repaid = math::amount_from_value(covered_value, debt_price, debt_decimals);
            }

            let bonus_portion = collateral_seized
                .saturating_sub(math::percent_div(collateral_seized, coll.liquidation_bonus));
            let protocol_fee = math::percent_mul(bonus_portion, coll.liquidation_protocol_fee_bps);
            let liquidator_share = collateral_seized - protocol_fee;
            let treasury = pool.params.treasury;

            pool.ledger.debit_debt(borrower, debt.id, debt_repaid);
            if !protocol_fee.is_zero() {
                pool.ledger.transfer_collateral(borrower, treasury, coll.id, protocol_fee);
            }
            if receive_share_token {
                pool.ledger.transfer_collateral(borrower, caller, coll.id, liquidator_share);
            } else {
                pool.ledger.debit_collateral(borrower, coll.id, liquidator_share, true);
                pool.transfers.transfer_asset(collateral_asset, caller, liquidator_share);
            }

            info!(
                collateral = %coll.id,
                debt = %debt.id,
                %borrower,
                liquidator = %caller,
                repaid = %debt_repaid,
                seized = %collateral_seized,
                "erc20 liquidation"
            );
            pool.events.push(Event::Erc20Liquidated {
                collateral_reserve: coll.id,
                debt_reserve: debt.id,
                borrower,
                liquidator: caller,
                debt_repaid,
                collateral_seized,
                protocol_fee,
                received_share_token: receive_share_token,
            });
            Ok(Erc20Liquidation {
                debt_repaid,
                collateral_seized,
                protocol_fee,
            })
        })
    }

    /// Buy one NFT out of an unhealthy position.
    ///
    /// Reserves with an auction strategy sell at the decayed auction price
    /// and require a running auction. Reserves without one sell at the floor
    /// discounted by the liquidation bonus, gated on the ERC721 health
    /// factor instead. `max_amount` is the caller's bid ceiling in
    /// settlement-reserve units.
    pub fn liquidate_erc721(
        &mut self,
        caller: Address,
        collection: Address,
        token_id: U256,
        max_amount: U256,
        receive_share_token: bool,
    ) -> Result<Erc721Liquidation, PoolError> {
        self.locked(|pool| {
            let config = pool.nft_reserve(collection)?;
            require_active(&config)?;
            let settle = *pool.registry.get(pool.params.settlement_reserve)?;
            if settle.kind.is_nft() {
                return Err(PoolError::NotFungibleReserve);
            }
            require_active(&settle)?;

            let borrower = pool
                .ledger
                .owner_of(config.id, token_id)
                .ok_or(PoolError::TokenNotFound)?;
            let position = pool.ledger.snapshot(borrower);
            let slot = position
                .nft_slot(config.id, token_id)
                .ok_or(PoolError::TokenNotFound)?;
            if !slot.use_as_collateral {
                return Err(PoolError::TokenNotCollateral);
            }

            let floor = pool.oracle.nft_floor_price(collection)?;
            let floor_value = math::value_wad(U256::from(1u8), floor, 0);

            // The gate is re-checked at call time: repaying mid-auction can
            // lift the ratio back above par and block the sale.
            let price_value = if config.kind.auction_strategy().is_some() {
                let entry = pool
                    .effective_auction(config.id, token_id, position.config.auction_validity_ts)
                    .ok_or(PoolError::AuctionNotStarted)?;
                let data = pool.account_data_for(&position)?;
                if data.erc721_health_factor >= WAD {
                    return Err(PoolError::Erc721HealthFactorNotBelowThreshold);
                }
                math::wad_mul(floor_value, entry.current_price_multiplier(pool.clock.now()))
            } else {
                let data = pool.account_data_for(&position)?;
                if data.erc721_health_factor >= WAD {
                    return Err(PoolError::Erc721HealthFactorNotBelowThreshold);
                }
                math::percent_div(floor_value, config.liquidation_bonus)
            };

            let settle_price = pool.oracle.asset_price(settle.asset)?;
            let price = math::amount_from_value(price_value, settle_price, settle.kind.decimals());
            if max_amount < price {
                return Err(PoolError::LiquidationAmountNotEnough);
            }

            let outstanding = position.debt_of(settle.id);
            let debt_repaid = price.min(outstanding);
            let excess_supplied = price - debt_repaid;

            if !debt_repaid.is_zero() {
                pool.ledger.debit_debt(borrower, settle.id, debt_repaid);
            }
            if !excess_supplied.is_zero() {
                let first = pool.ledger.credit_collateral(borrower, settle.id, excess_supplied);
                if first {
                    pool.ledger
                        .position_mut(borrower)
                        .config
                        .set_collateral_enabled(settle.id, true);
                }
            }
            pool.auctions.remove(config.id, token_id);
            if receive_share_token {
                pool.ledger.move_nft(borrower, caller, config.id, token_id, false);
            } else {
                pool.ledger.remove_nft(borrower, config.id, token_id);
                pool.transfers.transfer_nft(collection, caller, token_id);
            }

            info!(
                reserve = %config.id,
                %token_id,
                %borrower,
                liquidator = %caller,
                %price,
                repaid = %debt_repaid,
                "erc721 liquidation"
            );
            pool.events.push(Event::Erc721Liquidated {
                reserve: config.id,
                borrower,
                liquidator: caller,
                token_id,
                price,
                debt_repaid,
                excess_supplied,
                received_share_token: receive_share_token,
            });
            Ok(Erc721Liquidation {
                price,
                debt_repaid,
                excess_supplied,
            })
        })
    }
}
