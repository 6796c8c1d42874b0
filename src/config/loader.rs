//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages for
//! misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Environment variable overriding `sdk.client_id`.
pub const CLIENT_ID_ENV: &str = "WALLET_SDK_CLIENT_ID";

/// Largest decimals value a `U256` amount can be scaled by.
const MAX_DECIMALS: u8 = 77;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config = parse_config(&content)?;
  apply_client_id_override(&mut config, std::env::var(CLIENT_ID_ENV).ok());
  validate_config(&config)?;

  info!(
    chains = config.chains.len(),
    default_chain = config.session.default_chain_id,
    relay = %config.sdk.relay_url,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse TOML text without validating it.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).with_context(|| "Failed to parse config.toml")
}

/// Replace `sdk.client_id` with a non-blank override.
pub fn apply_client_id_override(config: &mut AppConfig, client_id: Option<String>) {
  if let Some(client_id) = client_id.filter(|id| !id.trim().is_empty()) {
    config.sdk.client_id = client_id;
  }
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A non-empty chain table with unique, non-zero ids
/// - A registered default chain
/// - Sensible decimals and non-blank URLs
/// - Non-zero polling intervals
pub fn validate_config(config: &AppConfig) -> Result<()> {
  // Chain validation
  anyhow::ensure!(
    !config.chains.is_empty(),
    "At least one chain must be configured"
  );

  let mut seen = HashSet::new();
  for chain in &config.chains {
    anyhow::ensure!(
      chain.chain_id != 0,
      "Chain {} has chain_id 0",
      chain.name
    );
    anyhow::ensure!(
      seen.insert(chain.chain_id),
      "Chain id {} is configured more than once",
      chain.chain_id
    );
    anyhow::ensure!(
      chain.native_decimals <= MAX_DECIMALS,
      "Chain {} native_decimals must be <= {MAX_DECIMALS}, got {}",
      chain.chain_id,
      chain.native_decimals
    );
    for (field, value) in [("rpc_url", &chain.rpc_url), ("explorer_url", &chain.explorer_url)] {
      if let Some(url) = value {
        anyhow::ensure!(
          !url.trim().is_empty(),
          "Chain {} has an empty {field}",
          chain.chain_id
        );
      }
    }
  }

  // Session validation
  anyhow::ensure!(
    seen.contains(&config.session.default_chain_id),
    "default_chain_id {} is not in the chain table",
    config.session.default_chain_id
  );

  // SDK validation
  anyhow::ensure!(
    !config.sdk.relay_url.trim().is_empty(),
    "sdk.relay_url must not be empty"
  );

  // Polling validation
  let polling = &config.polling;
  for (name, value) in [
    ("balance_interval_secs", polling.balance_interval_secs),
    ("contract_read_interval_secs", polling.contract_read_interval_secs),
    ("gas_price_interval_secs", polling.gas_price_interval_secs),
    ("receipt_poll_interval_ms", polling.receipt_poll_interval_ms),
  ] {
    anyhow::ensure!(value > 0, "polling.{name} must be positive");
  }

  Ok(())
}
