//! Gas Price Module - Provider Path with RPC Fallback
//!
//! Asks the session's network provider for `eth_gasPrice` when it is
//! bound to the target chain; otherwise (or when that fails) asks the
//! chain's public RPC. When both paths fail the record carries the
//! combined error and no price, never a stale one.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::domain::amount::{GasPrice, GasPriceSource};
use crate::domain::chain::ChainId;
use crate::domain::error::SessionError;
use crate::ports::provider_sdk::WalletRequests;

use super::context::SessionContext;
use super::query::{Fetcher, Query};

/// Inputs of a gas price query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPriceParams {
  /// Chain; the active chain when absent.
  pub chain_id: Option<ChainId>,
  /// Refresh periodically (on by default).
  pub watch: bool,
}

impl Default for GasPriceParams {
  fn default() -> Self {
    Self {
      chain_id: None,
      watch: true,
    }
  }
}

pub struct GasPriceFetcher;

#[async_trait]
impl Fetcher for GasPriceFetcher {
  type Params = GasPriceParams;
  type Output = GasPrice;

  const NAME: &'static str = "gas_price";

  #[instrument(skip(self, ctx))]
  async fn fetch(
    &self,
    ctx: &SessionContext,
    params: &GasPriceParams,
  ) -> Result<Option<GasPrice>, SessionError> {
    let price = current_gas_price(ctx, params.chain_id).await?;
    if let Some(metrics) = &ctx.metrics {
      metrics.observe_gas_price(price.gwei());
    }
    Ok(Some(price))
  }

  fn poll_interval(&self, ctx: &SessionContext, params: &GasPriceParams) -> Option<Duration> {
    params.watch.then_some(ctx.polling.gas_price)
  }

  fn follows_session(&self, params: &GasPriceParams) -> bool {
    params.chain_id.is_none()
  }

  fn keep_data_on_error(&self) -> bool {
    false
  }
}

/// Read the gas price once.
pub async fn current_gas_price(
  ctx: &SessionContext,
  chain_id: Option<ChainId>,
) -> Result<GasPrice, SessionError> {
  let target = chain_id.or_else(|| ctx.session.current_chain_id());
  let provider = ctx
    .session
    .current_network_provider()
    .filter(|p| target.is_none_or(|id| p.chain_id() == id));

  let mut provider_error = None;
  let mut fallback_chain = target;
  if let Some(provider) = provider {
    fallback_chain = Some(provider.chain_id());
    match provider.gas_price().await {
      Ok(wei) => {
        return Ok(GasPrice {
          wei,
          source: GasPriceSource::Provider,
        });
      }
      Err(e) => {
        warn!(error = %e, "Provider gas price failed; falling back to RPC");
        provider_error = Some(e);
      }
    }
  }

  let chain_id = fallback_chain.ok_or(SessionError::NoChainAvailable)?;
  debug!(chain_id, "Reading gas price over RPC");
  let rpc_result = match ctx.rpc.build(chain_id) {
    Ok(reader) => reader
      .gas_price()
      .await
      .map_err(|e| SessionError::transport("eth_gasPrice", format!("{e:#}"))),
    Err(e) => Err(e),
  };

  match (rpc_result, provider_error) {
    (Ok(wei), _) => Ok(GasPrice {
      wei,
      source: GasPriceSource::Rpc,
    }),
    (Err(rpc), None) => Err(rpc),
    (Err(rpc), Some(provider)) => Err(SessionError::Transport(format!(
      "gas price unavailable (provider: {provider}; rpc: {rpc})"
    ))),
  }
}

/// Start a gas price query.
pub fn watch_gas_price(ctx: &SessionContext, params: GasPriceParams) -> Query<GasPriceFetcher> {
  Query::new(ctx.clone(), GasPriceFetcher, params)
}
