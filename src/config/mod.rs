//! Configuration Module - TOML-based Session Configuration
//!
//! Loads and validates configuration from `config.toml`. The chain
//! table, the provider relay endpoint and the polling cadence are all
//! externalized here; nothing network-specific is hardcoded in the
//! domain layer.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::adapters::wallet::RelayConfig;
use crate::domain::chain::{ChainDescriptor, ChainId, ChainRegistry, RegistryError};
use crate::usecases::context::PollingIntervals;
use crate::usecases::session_manager::SessionOptions;

/// Top-level configuration.
///
/// Loaded from `config.toml` at startup and validated before any
/// session is created.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Process identity and logging.
  pub app: AppSection,
  /// Session behaviour.
  pub session: SessionConfig,
  /// Provider relay connection.
  pub sdk: SdkConfig,
  /// Supported networks.
  pub chains: Vec<ChainConfig>,
  /// Refresh cadence for watching modules.
  #[serde(default)]
  pub polling: PollingConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Session behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Chain used by `connect` when no switch happened first.
  pub default_chain_id: ChainId,
  /// Re-read the account list after a chain switch.
  #[serde(default = "default_true")]
  pub requery_accounts_on_switch: bool,
  /// Connect right after initialization (binary only).
  #[serde(default)]
  pub auto_connect: bool,
}

/// Provider relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SdkConfig {
  /// Relay base URL.
  pub relay_url: String,
  /// Client id; overridden by `WALLET_SDK_CLIENT_ID` when set.
  #[serde(default)]
  pub client_id: String,
  /// Per-request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
}

/// One supported network.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  pub chain_id: ChainId,
  pub name: String,
  pub native_symbol: String,
  #[serde(default = "default_native_decimals")]
  pub native_decimals: u8,
  /// Public JSON-RPC endpoint for reads.
  pub rpc_url: Option<String>,
  /// Block explorer base URL.
  pub explorer_url: Option<String>,
}

/// Polling cadence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
  #[serde(default = "default_balance_interval")]
  pub balance_interval_secs: u64,
  #[serde(default = "default_contract_read_interval")]
  pub contract_read_interval_secs: u64,
  #[serde(default = "default_gas_price_interval")]
  pub gas_price_interval_secs: u64,
  #[serde(default = "default_receipt_poll")]
  pub receipt_poll_interval_ms: u64,
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      balance_interval_secs: default_balance_interval(),
      contract_read_interval_secs: default_contract_read_interval(),
      gas_price_interval_secs: default_gas_price_interval(),
      receipt_poll_interval_ms: default_receipt_poll(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

impl AppConfig {
  /// Build the chain registry from the `[[chains]]` table.
  pub fn chain_registry(&self) -> Result<ChainRegistry, RegistryError> {
    ChainRegistry::new(
      self.chains.iter().map(ChainConfig::descriptor),
      self.session.default_chain_id,
    )
  }

  pub fn polling_intervals(&self) -> PollingIntervals {
    PollingIntervals {
      balance: Duration::from_secs(self.polling.balance_interval_secs),
      contract_read: Duration::from_secs(self.polling.contract_read_interval_secs),
      gas_price: Duration::from_secs(self.polling.gas_price_interval_secs),
      receipt_poll: Duration::from_millis(self.polling.receipt_poll_interval_ms),
    }
  }

  pub fn session_options(&self) -> SessionOptions {
    SessionOptions {
      requery_accounts_on_switch: self.session.requery_accounts_on_switch,
    }
  }

  pub fn relay_config(&self) -> RelayConfig {
    RelayConfig {
      base_url: self.sdk.relay_url.clone(),
      client_id: self.sdk.client_id.clone(),
      timeout: Duration::from_secs(self.sdk.timeout_seconds),
    }
  }
}

impl ChainConfig {
  pub fn descriptor(&self) -> ChainDescriptor {
    ChainDescriptor {
      chain_id: self.chain_id,
      name: self.name.clone(),
      native_symbol: self.native_symbol.clone(),
      native_decimals: self.native_decimals,
      rpc_url: self.rpc_url.clone(),
      explorer_url: self.explorer_url.clone(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_timeout() -> u64 {
  30
}

fn default_native_decimals() -> u8 {
  18
}

fn default_balance_interval() -> u64 {
  10
}

fn default_contract_read_interval() -> u64 {
  10
}

fn default_gas_price_interval() -> u64 {
  15
}

fn default_receipt_poll() -> u64 {
  1000
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
