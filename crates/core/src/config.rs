//! Protocol-wide risk parameters.
//!
//! Loaded from TOML with full defaults, in the same file/override style as
//! the rest of the configuration surface: the serde layer holds plain
//! values (addresses as hex strings) and resolves into the runtime struct.

use std::path::Path;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::math::f64_to_wad;
use crate::reserve::ReserveId;

/// Resolved protocol risk parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParams {
    /// ERC721 health factor above which an owner may end their auctions
    pub recovery_health_factor: f64,
    /// Health factor at or below which the close factor jumps to 100%
    pub close_factor_hf_threshold: f64,
    /// Close factor for mildly unhealthy positions (bps)
    pub default_close_factor_bps: u16,
    /// Close factor for deeply unhealthy positions (bps)
    pub max_close_factor_bps: u16,
    /// Fungible reserve NFT liquidations settle in
    pub settlement_reserve: ReserveId,
    /// Account credited with liquidation protocol fees
    pub treasury: Address,
}

impl RiskParams {
    pub fn new(settlement_reserve: ReserveId, treasury: Address) -> Self {
        Self {
            recovery_health_factor: default_recovery_hf(),
            close_factor_hf_threshold: default_close_factor_threshold(),
            default_close_factor_bps: default_close_factor_bps(),
            max_close_factor_bps: default_max_close_factor_bps(),
            settlement_reserve,
            treasury,
        }
    }

    /// Recovery threshold as WAD.
    pub fn recovery_hf_wad(&self) -> U256 {
        f64_to_wad(self.recovery_health_factor)
    }

    /// Close-factor boundary as WAD.
    pub fn close_factor_threshold_wad(&self) -> U256 {
        f64_to_wad(self.close_factor_hf_threshold)
    }

    /// Load parameters from a TOML file; absent keys keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading risk params from {}", path.display()))?;
        let file: RiskParamsFile =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        file.resolve()
    }
}

/// TOML form of [`RiskParams`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParamsFile {
    #[serde(default = "default_recovery_hf")]
    pub recovery_health_factor: f64,
    #[serde(default = "default_close_factor_threshold")]
    pub close_factor_hf_threshold: f64,
    #[serde(default = "default_close_factor_bps")]
    pub default_close_factor_bps: u16,
    #[serde(default = "default_max_close_factor_bps")]
    pub max_close_factor_bps: u16,
    #[serde(default)]
    pub settlement_reserve: u16,
    /// Hex address of the fee treasury
    #[serde(default)]
    pub treasury: Option<String>,
}

impl RiskParamsFile {
    pub fn resolve(self) -> Result<RiskParams> {
        if self.recovery_health_factor < 1.0 {
            anyhow::bail!("recovery_health_factor must be >= 1.0");
        }
        if self.default_close_factor_bps > self.max_close_factor_bps
            || self.max_close_factor_bps > 10_000
        {
            anyhow::bail!("close factors must satisfy default <= max <= 10000");
        }
        let treasury = match &self.treasury {
            Some(raw) => Address::from_str(raw).with_context(|| format!("treasury address {raw}"))?,
            None => Address::ZERO,
        };
        Ok(RiskParams {
            recovery_health_factor: self.recovery_health_factor,
            close_factor_hf_threshold: self.close_factor_hf_threshold,
            default_close_factor_bps: self.default_close_factor_bps,
            max_close_factor_bps: self.max_close_factor_bps,
            settlement_reserve: ReserveId(self.settlement_reserve),
            treasury,
        })
    }
}

fn default_recovery_hf() -> f64 {
    1.5
}
fn default_close_factor_threshold() -> f64 {
    0.95
}
fn default_close_factor_bps() -> u16 {
    5_000
}
fn default_max_close_factor_bps() -> u16 {
    10_000
}
