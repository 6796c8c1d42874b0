//! Balance and fee value types.

use alloy::primitives::U256;
use alloy::primitives::utils::format_units;
use serde::{Deserialize, Serialize};

/// Wei per gwei.
const WEI_PER_GWEI: f64 = 1_000_000_000.0;

/// A native or token balance with its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Raw balance in the smallest unit.
    pub value: U256,
    /// `value` scaled by `decimals`, e.g. `"1.500000000000000000"`.
    pub formatted: String,
    /// Currency or token symbol.
    pub symbol: String,
    /// Number of decimals the raw value carries.
    pub decimals: u8,
}

impl Balance {
    pub fn new(value: U256, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            value,
            formatted: format_amount(value, decimals),
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// Format a raw amount with the given decimals.
///
/// Falls back to the raw integer string when `decimals` exceeds what a
/// `U256` can represent.
pub fn format_amount(value: U256, decimals: u8) -> String {
    format_units(value, decimals).unwrap_or_else(|_| value.to_string())
}

/// Where a gas price reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasPriceSource {
    /// Asked the session's network provider directly.
    Provider,
    /// Fell back to the chain's public RPC endpoint.
    Rpc,
}

/// Current network fee estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPrice {
    /// Fee per gas in wei.
    pub wei: u128,
    /// Which path produced the reading.
    pub source: GasPriceSource,
}

impl GasPrice {
    /// Fee per gas in gwei (lossy, for display and metrics).
    #[allow(clippy::cast_precision_loss)]
    pub fn gwei(&self) -> f64 {
        self.wei as f64 / WEI_PER_GWEI
    }
}
