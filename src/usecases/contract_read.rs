//! Contract Read Module - `eth_call` Queries
//!
//! Encodes a `ContractCall`, runs it against the chain's public RPC and
//! decodes the return values. The chain falls back to the active one.

use std::time::Duration;

use alloy::dyn_abi::DynSolValue;
use async_trait::async_trait;
use tracing::instrument;

use crate::domain::call::ContractCall;
use crate::domain::chain::ChainId;
use crate::domain::error::SessionError;

use super::context::SessionContext;
use super::query::{Fetcher, Query};

/// Inputs of a contract read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadParams {
  pub call: ContractCall,
  /// Chain; the active chain when absent.
  pub chain_id: Option<ChainId>,
  /// Refresh periodically.
  pub watch: bool,
}

impl ReadParams {
  pub fn new(call: ContractCall) -> Self {
    Self {
      call,
      chain_id: None,
      watch: false,
    }
  }

  pub fn on_chain(mut self, chain_id: ChainId) -> Self {
    self.chain_id = Some(chain_id);
    self
  }

  pub fn watching(mut self) -> Self {
    self.watch = true;
    self
  }
}

pub struct ContractReadFetcher;

#[async_trait]
impl Fetcher for ContractReadFetcher {
  type Params = ReadParams;
  type Output = Vec<DynSolValue>;

  const NAME: &'static str = "contract_read";

  #[instrument(skip_all, fields(function = %params.call.function_name, to = %params.call.address))]
  async fn fetch(
    &self,
    ctx: &SessionContext,
    params: &ReadParams,
  ) -> Result<Option<Vec<DynSolValue>>, SessionError> {
    read_contract(ctx, params).await.map(Some)
  }

  fn poll_interval(&self, ctx: &SessionContext, params: &ReadParams) -> Option<Duration> {
    params.watch.then_some(ctx.polling.contract_read)
  }

  fn follows_session(&self, params: &ReadParams) -> bool {
    params.chain_id.is_none()
  }
}

/// Run one read and decode its outputs.
pub async fn read_contract(
  ctx: &SessionContext,
  params: &ReadParams,
) -> Result<Vec<DynSolValue>, SessionError> {
  let chain_id = params
    .chain_id
    .or_else(|| ctx.session.current_chain_id())
    .ok_or(SessionError::NoChainAvailable)?;
  let calldata = params.call.calldata()?;
  let reader = ctx.rpc.build(chain_id)?;

  let raw = reader
    .call(params.call.address, calldata)
    .await
    .map_err(|e| SessionError::transport("eth_call", format!("{e:#}")))?;
  params.call.decode_output(&raw)
}

/// Start a contract read query.
pub fn watch_contract(ctx: &SessionContext, params: ReadParams) -> Query<ContractReadFetcher> {
  Query::new(ctx.clone(), ContractReadFetcher, params)
}
