//! Health-factor computation.
//!
//! Pure functions over the current ledger, registry and oracle state; the
//! outputs are recomputed on every call and never cached. Two ratios come
//! out per account: the blended `health_factor` across all collateral, and
//! the stricter `erc721_health_factor` that treats NFTs as the last-resort
//! collateral layer behind fungible collateral.

use alloy::primitives::U256;
use lendpool_oracle::PriceOracle;
use smallvec::SmallVec;

use crate::error::PoolError;
use crate::ledger::UserPosition;
use crate::math::{self, BPS};
use crate::reserve::{ReserveId, ReserveRegistry};

/// One collateral reserve's contribution to the account totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveValue {
    pub reserve: ReserveId,
    /// Base-currency value (WAD)
    pub value: U256,
    /// Value weighted by the reserve's liquidation threshold (WAD)
    pub risk_adjusted: U256,
}

/// Aggregated account state derived on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountData {
    pub total_collateral_value: U256,
    pub total_debt_value: U256,
    pub available_borrow_value: U256,
    /// Collateral-weighted liquidation threshold (bps, truncated)
    pub current_liquidation_threshold: u16,
    /// Collateral-weighted loan-to-value (bps, truncated)
    pub ltv: u16,
    /// Blended solvency ratio (WAD; `U256::MAX` when debt-free)
    pub health_factor: U256,
    /// NFT-specific solvency ratio (WAD; `U256::MAX` without NFT exposure)
    pub erc721_health_factor: U256,
    /// Risk-adjusted fungible collateral (WAD)
    pub erc20_risk_adjusted: U256,
    /// Risk-adjusted NFT collateral (WAD)
    pub erc721_risk_adjusted: U256,
    pub collaterals: SmallVec<[ReserveValue; 4]>,
    pub auction_validity_ts: u64,
}

impl AccountData {
    pub fn is_liquidatable(&self) -> bool {
        self.health_factor < math::WAD
    }
}

/// Compute the full account aggregate for one position.
pub fn account_data(
    registry: &ReserveRegistry,
    oracle: &dyn PriceOracle,
    position: &UserPosition,
) -> Result<AccountData, PoolError> {
    let mut total_collateral = U256::ZERO;
    let mut total_debt = U256::ZERO;
    let mut ltv_weighted = U256::ZERO;
    let mut threshold_weighted = U256::ZERO;
    let mut erc20_threshold_weighted = U256::ZERO;
    let mut erc721_threshold_weighted = U256::ZERO;
    let mut collaterals: SmallVec<[ReserveValue; 4]> = SmallVec::new();

    for (reserve, balance) in position.fungible_reserves() {
        let config = registry.get(*reserve)?;
        let decimals = config.kind.decimals();

        if !balance.collateral.is_zero() && position.config.is_collateral_enabled(*reserve) {
            let price = oracle.asset_price(config.asset)?;
            let value = math::value_wad(balance.collateral, price, decimals);
            let weighted = value * U256::from(config.liquidation_threshold);
            total_collateral += value;
            ltv_weighted += value * U256::from(config.ltv);
            threshold_weighted += weighted;
            erc20_threshold_weighted += weighted;
            collaterals.push(ReserveValue {
                reserve: *reserve,
                value,
                risk_adjusted: weighted / BPS,
            });
        }

        if !balance.debt.is_zero() {
            let price = oracle.asset_price(config.asset)?;
            total_debt += math::value_wad(balance.debt, price, decimals);
        }
    }

    for reserve in position.nft_reserves() {
        let flagged = position.collateral_nft_count(*reserve);
        if flagged == 0 {
            continue;
        }
        let config = registry.get(*reserve)?;
        let floor = oracle.nft_floor_price(config.asset)?;
        let value = math::value_wad(U256::from(flagged), floor, 0);
        let weighted = value * U256::from(config.liquidation_threshold);
        total_collateral += value;
        ltv_weighted += value * U256::from(config.ltv);
        threshold_weighted += weighted;
        erc721_threshold_weighted += weighted;
        collaterals.push(ReserveValue {
            reserve: *reserve,
            value,
            risk_adjusted: weighted / BPS,
        });
    }

    let risk_adjusted_total = threshold_weighted / BPS;
    let erc20_risk_adjusted = erc20_threshold_weighted / BPS;
    let erc721_risk_adjusted = erc721_threshold_weighted / BPS;

    let health_factor = math::health_factor(risk_adjusted_total, total_debt);
    let erc721_health_factor =
        erc721_health_factor(erc20_risk_adjusted, erc721_risk_adjusted, total_debt);

    // Truncated weighted averages; zero collateral yields zero.
    let (ltv, current_liquidation_threshold) = if total_collateral.is_zero() {
        (0u16, 0u16)
    } else {
        (
            (ltv_weighted / total_collateral).to::<u64>() as u16,
            (threshold_weighted / total_collateral).to::<u64>() as u16,
        )
    };

    let borrow_capacity = ltv_weighted / BPS;
    let available_borrow_value = borrow_capacity.saturating_sub(total_debt);

    Ok(AccountData {
        total_collateral_value: total_collateral,
        total_debt_value: total_debt,
        available_borrow_value,
        current_liquidation_threshold,
        ltv,
        health_factor,
        erc721_health_factor,
        erc20_risk_adjusted,
        erc721_risk_adjusted,
        collaterals,
        auction_validity_ts: position.config.auction_validity_ts,
    })
}

/// NFT-specific health factor.
///
/// Debt is netted against the fungible risk-adjusted collateral first; only
/// the uncovered remainder weighs on the NFT layer. Infinite when the
/// account holds no NFT collateral, no debt, or the fungible layer alone
/// covers the debt.
fn erc721_health_factor(
    erc20_risk_adjusted: U256,
    erc721_risk_adjusted: U256,
    total_debt: U256,
) -> U256 {
    if erc721_risk_adjusted.is_zero() || total_debt.is_zero() {
        return U256::MAX;
    }
    if total_debt <= erc20_risk_adjusted {
        return U256::MAX;
    }
    math::wad_div(erc721_risk_adjusted, total_debt - erc20_risk_adjusted)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::Address;
    use lendpool_oracle::{ManualClock, StaticOracle};

    use super::*;
    use crate::ledger::PositionLedger;
    use crate::math::{f64_to_wad, WAD};
    use crate::reserve::ReserveConfig;

    const USDC: Address = Address::repeat_byte(0x01);
    const WETH: Address = Address::repeat_byte(0x02);
    const APES: Address = Address::repeat_byte(0x03);

    fn registry() -> ReserveRegistry {
        let mut registry = ReserveRegistry::new();
        registry
            .add(
                ReserveConfig::fungible(ReserveId(0), USDC, 6)
                    .with_risk_params(8_000, 8_500, 10_500)
                    .with_borrowing(true),
            )
            .unwrap();
        registry
            .add(
                ReserveConfig::fungible(ReserveId(1), WETH, 18)
                    .with_risk_params(7_000, 8_000, 10_500)
                    .with_borrowing(true),
            )
            .unwrap();
        registry
            .add(
                ReserveConfig::non_fungible(ReserveId(2), APES, None)
                    .with_risk_params(4_000, 6_000, 10_500),
            )
            .unwrap();
        registry
    }

    fn oracle() -> StaticOracle {
        let oracle = StaticOracle::new(Arc::new(ManualClock::new(1_000)));
        oracle.set_price(USDC, U256::from(100_000_000u64)); // $1
        oracle.set_price(WETH, U256::from(200_000_000_000u64)); // $2000
        oracle.set_floor_price(APES, U256::from(10_000_000_000u64)); // $100
        oracle
    }

    fn usdc(units: u64) -> U256 {
        U256::from(units) * U256::from(1_000_000u64)
    }

    #[test]
    fn debt_free_account_is_infinitely_healthy() {
        let registry = registry();
        let oracle = oracle();
        let mut ledger = PositionLedger::new();
        let user = Address::repeat_byte(0xAA);

        ledger.credit_collateral(user, ReserveId(0), usdc(1_000));
        ledger.position_mut(user).config.set_collateral_enabled(ReserveId(0), true);

        let data = account_data(&registry, &oracle, &ledger.snapshot(user)).unwrap();
        assert_eq!(data.health_factor, U256::MAX);
        assert_eq!(data.erc721_health_factor, U256::MAX);
        assert_eq!(data.total_collateral_value, U256::from(1_000u64) * WAD);
        assert_eq!(data.ltv, 8_000);
        assert_eq!(data.current_liquidation_threshold, 8_500);
        assert_eq!(data.available_borrow_value, U256::from(800u64) * WAD);
    }

    #[test]
    fn blended_health_factor_matches_hand_calculation() {
        let registry = registry();
        let oracle = oracle();
        let mut ledger = PositionLedger::new();
        let user = Address::repeat_byte(0xAB);

        // $1000 USDC collateral at 85% threshold, $500 USDC debt.
        ledger.credit_collateral(user, ReserveId(0), usdc(1_000));
        ledger.position_mut(user).config.set_collateral_enabled(ReserveId(0), true);
        ledger.credit_debt(user, ReserveId(0), usdc(500));

        let data = account_data(&registry, &oracle, &ledger.snapshot(user)).unwrap();
        // HF = 850 / 500 = 1.7
        assert_eq!(data.health_factor, f64_to_wad(1.7));
        // No NFT collateral: the NFT ratio stays infinite.
        assert_eq!(data.erc721_health_factor, U256::MAX);
    }

    #[test]
    fn nft_ratio_nets_out_fungible_cover() {
        let registry = registry();
        let oracle = oracle();
        let mut ledger = PositionLedger::new();
        let user = Address::repeat_byte(0xAC);

        // $200 USDC (85% -> $170 adjusted) + 2 apes at $100 (60% -> $120).
        ledger.credit_collateral(user, ReserveId(0), usdc(200));
        ledger.position_mut(user).config.set_collateral_enabled(ReserveId(0), true);
        ledger.insert_nft(user, ReserveId(2), U256::from(1u64), true);
        ledger.insert_nft(user, ReserveId(2), U256::from(2u64), true);
        ledger.credit_debt(user, ReserveId(0), usdc(250));

        let data = account_data(&registry, &oracle, &ledger.snapshot(user)).unwrap();
        // HF = (170 + 120) / 250 = 1.16
        assert_eq!(data.health_factor, f64_to_wad(1.16));
        // NFT ratio = 120 / (250 - 170) = 1.5
        assert_eq!(data.erc721_health_factor, f64_to_wad(1.5));

        // The NFT ratio is the binding constraint for unhealthy accounts:
        // with more debt both drop, NFT ratio faster.
        ledger.credit_debt(user, ReserveId(0), usdc(100));
        let data = account_data(&registry, &oracle, &ledger.snapshot(user)).unwrap();
        assert!(data.erc721_health_factor < data.health_factor);
    }

    #[test]
    fn nft_ratio_is_infinite_when_fungible_collateral_covers_debt() {
        let registry = registry();
        let oracle = oracle();
        let mut ledger = PositionLedger::new();
        let user = Address::repeat_byte(0xAD);

        ledger.credit_collateral(user, ReserveId(0), usdc(1_000));
        ledger.position_mut(user).config.set_collateral_enabled(ReserveId(0), true);
        ledger.insert_nft(user, ReserveId(2), U256::from(1u64), true);
        ledger.credit_debt(user, ReserveId(0), usdc(100));

        let data = account_data(&registry, &oracle, &ledger.snapshot(user)).unwrap();
        assert_eq!(data.erc721_health_factor, U256::MAX);
        assert!(data.health_factor > WAD);
    }

    #[test]
    fn unflagged_tokens_and_disabled_collateral_do_not_count() {
        let registry = registry();
        let oracle = oracle();
        let mut ledger = PositionLedger::new();
        let user = Address::repeat_byte(0xAE);

        ledger.credit_collateral(user, ReserveId(0), usdc(500));
        // Collateral flag left disabled.
        ledger.insert_nft(user, ReserveId(2), U256::from(1u64), false);
        ledger.credit_debt(user, ReserveId(0), usdc(100));

        let data = account_data(&registry, &oracle, &ledger.snapshot(user)).unwrap();
        assert_eq!(data.total_collateral_value, U256::ZERO);
        assert_eq!(data.health_factor, U256::ZERO);
        assert_eq!(data.total_debt_value, U256::from(100u64) * WAD);
    }

    #[test]
    fn blended_ltv_truncates() {
        let registry = registry();
        let oracle = oracle();
        let mut ledger = PositionLedger::new();
        let user = Address::repeat_byte(0xAF);

        // $1000 at 80% LTV and one $100 ape at 40% LTV:
        // (1000*8000 + 100*4000) / 1100 = 7636.36 -> 7636 truncated.
        ledger.credit_collateral(user, ReserveId(0), usdc(1_000));
        ledger.position_mut(user).config.set_collateral_enabled(ReserveId(0), true);
        ledger.insert_nft(user, ReserveId(2), U256::from(1u64), true);

        let data = account_data(&registry, &oracle, &ledger.snapshot(user)).unwrap();
        assert_eq!(data.ltv, 7_636);
        // Thresholds: (1000*8500 + 100*6000) / 1100 = 8272.7 -> 8272.
        assert_eq!(data.current_liquidation_threshold, 8_272);
    }
}
