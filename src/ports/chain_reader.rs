//! Chain Reader Port - Read-only RPC Access
//!
//! Session-independent chain reads used by the derived modules: native
//! balances, `eth_call`, gas price and receipts. A reader is bound to
//! one chain and built on demand by an `RpcClientFactory` from the
//! registry's endpoint for that chain.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use crate::domain::chain::ChainId;
use crate::domain::error::SessionError;
use crate::domain::transaction::{TxHash, TxReceipt};

/// Read-only access to one chain.
#[async_trait]
pub trait ChainReader: Send + Sync + 'static {
  /// Chain this reader targets.
  fn chain_id(&self) -> ChainId;

  /// Native currency balance of `owner` in wei.
  async fn native_balance(&self, owner: Address) -> anyhow::Result<U256>;

  /// Execute `eth_call` against `to` with raw calldata.
  async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes>;

  /// Current gas price in wei.
  async fn gas_price(&self) -> anyhow::Result<u128>;

  /// Receipt for `hash`, or `None` while the transaction is pending.
  async fn transaction_receipt(&self, hash: TxHash) -> anyhow::Result<Option<TxReceipt>>;
}

/// Builds per-chain read clients.
///
/// Fails with `UnsupportedChain` for chains missing from the registry or
/// registered without an RPC endpoint.
pub trait RpcClientFactory: Send + Sync + 'static {
  /// Build (or reuse) the reader for `chain_id`.
  fn build(&self, chain_id: ChainId) -> Result<Arc<dyn ChainReader>, SessionError>;
}
