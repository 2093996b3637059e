//! Fixed-point `U256` arithmetic for risk and liquidation math.
//!
//! Conventions used across the crate:
//! - oracle prices carry 8 decimals ([`lendpool_oracle::PRICE_DECIMALS`])
//! - base-currency values, health factors and auction price multipliers are
//!   WAD (18 decimals)
//! - percentages are basis points (10000 = 100%) with half-up rounding, so
//!   applying and unwinding a bonus round the same way

use alloy::primitives::U256;
use lendpool_oracle::PRICE_DECIMALS;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS: U256 = U256::from_limbs([10_000u64, 0, 0, 0]);

const HALF_BPS: U256 = U256::from_limbs([5_000u64, 0, 0, 0]);

/// Power of 10 as `U256`.
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Multiply two WAD values, truncating: `(a * b) / WAD`.
#[inline(always)]
pub fn wad_mul(a: U256, b: U256) -> U256 {
    (a * b) / WAD
}

/// Divide two WAD values: `(a * WAD) / b`; `U256::MAX` on a zero divisor.
#[inline(always)]
pub fn wad_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::MAX;
    }
    (a * WAD) / b
}

/// Apply a basis-point percentage with half-up rounding.
///
/// `percent_mul(1001, 5000)` = 501 (500.5 rounds up).
#[inline(always)]
pub fn percent_mul(value: U256, bps: u16) -> U256 {
    (value * U256::from(bps) + HALF_BPS) / BPS
}

/// Divide by a basis-point percentage with half-up rounding.
#[inline(always)]
pub fn percent_div(value: U256, bps: u16) -> U256 {
    if bps == 0 {
        return U256::MAX;
    }
    let divisor = U256::from(bps);
    (value * BPS + divisor / U256::from(2u8)) / divisor
}

/// Base-currency value (WAD) of a token amount at an 8-decimal unit price.
///
/// `value = amount * price * 10^(18 - decimals - 8)`; NFT counts use
/// `decimals = 0`.
#[inline(always)]
pub fn value_wad(amount: U256, price: U256, decimals: u8) -> U256 {
    if amount.is_zero() || price.is_zero() {
        return U256::ZERO;
    }
    let shift = 18i32 - i32::from(decimals) - i32::from(PRICE_DECIMALS);
    if shift >= 0 {
        amount * price * pow10(shift as u8)
    } else {
        (amount * price) / pow10((-shift) as u8)
    }
}

/// Token amount corresponding to a base-currency value (WAD), truncating.
///
/// Inverse of [`value_wad`]: `amount = value * 10^(decimals + 8 - 18) / price`.
#[inline(always)]
pub fn amount_from_value(value: U256, price: U256, decimals: u8) -> U256 {
    if value.is_zero() || price.is_zero() {
        return U256::ZERO;
    }
    let shift = i32::from(decimals) + i32::from(PRICE_DECIMALS) - 18;
    if shift >= 0 {
        value * pow10(shift as u8) / price
    } else {
        value / (price * pow10((-shift) as u8))
    }
}

/// Health factor in WAD: risk-adjusted collateral over debt, with the
/// `U256::MAX` sentinel for a debt-free account.
#[inline(always)]
pub fn health_factor(risk_adjusted_collateral: U256, total_debt: U256) -> U256 {
    if total_debt.is_zero() {
        return U256::MAX;
    }
    wad_div(risk_adjusted_collateral, total_debt)
}

/// Convert f64 to WAD. Used for configuration thresholds only.
#[inline(always)]
pub fn f64_to_wad(value: f64) -> U256 {
    if value <= 0.0 {
        return U256::ZERO;
    }
    U256::from((value * 1e18) as u128)
}

/// Convert WAD to f64. Display and logging only, never computation.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        let limbs = wad.as_limbs();
        let high = limbs[1] as f64 * (u64::MAX as f64 + 1.0);
        let low = limbs[0] as f64;
        (high + low) / 1e18
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_mul_rounds_half_up() {
        assert_eq!(percent_mul(U256::from(1000u64), 5000), U256::from(500u64));
        assert_eq!(percent_mul(U256::from(1001u64), 5000), U256::from(501u64));
        assert_eq!(percent_mul(U256::from(1000u64), 10500), U256::from(1050u64));
    }

    #[test]
    fn percent_div_unwinds_a_bonus() {
        // 1050 / 105% = 1000 exactly
        assert_eq!(percent_div(U256::from(1050u64), 10500), U256::from(1000u64));
        // Degenerate divisor saturates instead of panicking
        assert_eq!(percent_div(U256::from(1u64), 0), U256::MAX);
    }

    #[test]
    fn value_conversion_round_trips_across_decimals() {
        let price = U256::from(100_000_000u64); // $1.00

        // 1000 units of a 6-decimal token
        let amount = U256::from(1_000_000_000u64);
        let value = value_wad(amount, price, 6);
        assert_eq!(value, U256::from(1000u64) * WAD);
        assert_eq!(amount_from_value(value, price, 6), amount);

        // 1.5 units of an 18-decimal token at $2000
        let amount = U256::from(1_500_000_000_000_000_000u128);
        let price = U256::from(200_000_000_000u64);
        let value = value_wad(amount, price, 18);
        assert_eq!(value, U256::from(3000u64) * WAD);
        assert_eq!(amount_from_value(value, price, 18), amount);

        // 3 NFTs (0 decimals) at a floor of $50
        let value = value_wad(U256::from(3u64), U256::from(5_000_000_000u64), 0);
        assert_eq!(value, U256::from(150u64) * WAD);
    }

    #[test]
    fn health_factor_sentinel_on_zero_debt() {
        assert_eq!(health_factor(U256::from(100u64) * WAD, U256::ZERO), U256::MAX);
        // 800 adjusted / 500 debt = 1.6
        let hf = health_factor(U256::from(800u64) * WAD, U256::from(500u64) * WAD);
        assert_eq!(hf, U256::from(1_600_000_000_000_000_000u128));
    }

    #[test]
    fn wad_f64_conversions() {
        assert_eq!(f64_to_wad(1.5), U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(f64_to_wad(-1.0), U256::ZERO);
        let back = wad_to_f64(U256::from(2u64) * WAD);
        assert!((back - 2.0).abs() < 1e-9);
    }
}
