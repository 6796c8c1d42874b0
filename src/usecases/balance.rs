//! Balance Module - Native and ERC-20 Balances
//!
//! Reads the native balance of an address, or an ERC-20 balance with
//! the token's own symbol and decimals. Address and chain fall back to
//! the connected session. With `watch` set, the balance refreshes on the
//! configured interval (10s by default).

use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::instrument;

use crate::domain::amount::Balance;
use crate::domain::chain::ChainId;
use crate::domain::error::SessionError;
use crate::ports::chain_reader::ChainReader;

use super::context::SessionContext;
use super::query::{Fetcher, Query};

sol! {
  interface IERC20 {
    function balanceOf(address owner) external view returns (uint256);
    function decimals() external view returns (uint8);
    function symbol() external view returns (string);
  }
}

/// Inputs of a balance query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceParams {
  /// Owner; the connected address when absent.
  pub address: Option<Address>,
  /// ERC-20 contract; the native currency when absent.
  pub token: Option<Address>,
  /// Chain; the active chain when absent.
  pub chain_id: Option<ChainId>,
  /// Refresh periodically.
  pub watch: bool,
}

pub struct BalanceFetcher;

#[async_trait]
impl Fetcher for BalanceFetcher {
  type Params = BalanceParams;
  type Output = Balance;

  const NAME: &'static str = "balance";

  #[instrument(skip(self, ctx))]
  async fn fetch(
    &self,
    ctx: &SessionContext,
    params: &BalanceParams,
  ) -> Result<Option<Balance>, SessionError> {
    let Some(owner) = params.address.or_else(|| ctx.session.current_address()) else {
      return Ok(None);
    };
    let chain_id = params
      .chain_id
      .or_else(|| ctx.session.current_chain_id())
      .ok_or(SessionError::NoRpcConfigured)?;
    let chain = ctx.registry.require(chain_id)?;
    if chain.rpc_endpoint().is_none() {
      return Err(SessionError::NoRpcConfigured);
    }
    let reader = ctx.rpc.build(chain_id)?;

    let balance = match params.token {
      None => {
        let value = reader
          .native_balance(owner)
          .await
          .map_err(|e| SessionError::transport("eth_getBalance", format!("{e:#}")))?;
        Balance::new(value, chain.native_symbol.clone(), chain.native_decimals)
      }
      Some(token) => token_balance(reader.as_ref(), token, owner).await?,
    };
    Ok(Some(balance))
  }

  fn poll_interval(&self, ctx: &SessionContext, params: &BalanceParams) -> Option<Duration> {
    params.watch.then_some(ctx.polling.balance)
  }

  fn follows_session(&self, params: &BalanceParams) -> bool {
    params.address.is_none() || params.chain_id.is_none()
  }
}

/// `balanceOf`, `decimals` and `symbol`, issued concurrently.
async fn token_balance(
  reader: &dyn ChainReader,
  token: Address,
  owner: Address,
) -> Result<Balance, SessionError> {
  let (raw_balance, raw_decimals, raw_symbol) = tokio::try_join!(
    erc20_call(reader, token, IERC20::balanceOfCall { owner }.abi_encode()),
    erc20_call(reader, token, IERC20::decimalsCall {}.abi_encode()),
    erc20_call(reader, token, IERC20::symbolCall {}.abi_encode()),
  )?;

  let value = IERC20::balanceOfCall::abi_decode_returns(&raw_balance, true)
    .map_err(|e| SessionError::InvalidCall(format!("balanceOf output: {e}")))?
    ._0;
  let decimals = IERC20::decimalsCall::abi_decode_returns(&raw_decimals, true)
    .map_err(|e| SessionError::InvalidCall(format!("decimals output: {e}")))?
    ._0;
  let symbol = IERC20::symbolCall::abi_decode_returns(&raw_symbol, true)
    .map_err(|e| SessionError::InvalidCall(format!("symbol output: {e}")))?
    ._0;

  Ok(Balance::new(value, symbol, decimals))
}

async fn erc20_call(
  reader: &dyn ChainReader,
  token: Address,
  calldata: Vec<u8>,
) -> Result<Bytes, SessionError> {
  reader
    .call(token, Bytes::from(calldata))
    .await
    .map_err(|e| SessionError::transport("eth_call", format!("{e:#}")))
}

/// Start a balance query.
pub fn watch_balance(ctx: &SessionContext, params: BalanceParams) -> Query<BalanceFetcher> {
  Query::new(ctx.clone(), BalanceFetcher, params)
}

/// Fetch a balance once, outside any query.
pub async fn fetch_balance(
  ctx: &SessionContext,
  params: &BalanceParams,
) -> Result<Option<Balance>, SessionError> {
  BalanceFetcher.fetch(ctx, params).await
}
