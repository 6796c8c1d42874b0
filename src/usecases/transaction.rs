//! Transaction Module - Send and Await Inclusion
//!
//! `send` reads the provider from the session cell at call time, so a
//! transaction issued right after a chain switch goes to the new chain.
//! `wait_for_receipt` polls the chain's public RPC until the receipt
//! shows up; `ReceiptWatch` is its re-runnable form keyed by
//! `(hash, chain)`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::domain::chain::ChainId;
use crate::domain::error::SessionError;
use crate::domain::transaction::{TransactionRequest, TxHash, TxReceipt};
use crate::ports::provider_sdk::WalletRequests;

use super::context::SessionContext;
use super::query::{Fetcher, Mutation, MutationState, Query};

/// Sign and broadcast `request` through the current provider.
///
/// `from` defaults to the connected address.
#[instrument(skip_all)]
pub async fn send_transaction(
  ctx: &SessionContext,
  request: TransactionRequest,
) -> Result<TxHash, SessionError> {
  let session = ctx.session.connected()?;
  let tx = request.with_default_sender(session.address);

  let hash = session.provider.send_transaction(&tx).await?;
  info!(
    %hash,
    chain_id = session.chain_id,
    explorer = ?ctx.registry.explorer_tx_url(session.chain_id, hash),
    "Transaction submitted"
  );
  Ok(hash)
}

/// Poll until `hash` is included on `chain_id`.
///
/// Lookup failures are logged and retried. A receipt with failed status
/// resolves to `Reverted`.
#[instrument(skip(ctx))]
pub async fn wait_for_receipt(
  ctx: &SessionContext,
  hash: TxHash,
  chain_id: ChainId,
) -> Result<TxReceipt, SessionError> {
  let reader = ctx.rpc.build(chain_id)?;
  let interval = ctx.polling.receipt_poll;
  let mut attempts: u64 = 0;

  loop {
    attempts += 1;
    match reader.transaction_receipt(hash).await {
      Ok(Some(receipt)) if receipt.success => {
        info!(%hash, block = ?receipt.block_number, attempts, "Transaction confirmed");
        return Ok(receipt);
      }
      Ok(Some(receipt)) => {
        warn!(%hash, block = ?receipt.block_number, "Transaction reverted");
        return Err(SessionError::Reverted { hash });
      }
      Ok(None) => debug!(%hash, attempts, "Receipt not available yet"),
      Err(e) => warn!(%hash, error = %format!("{e:#}"), "Receipt lookup failed; retrying"),
    }
    sleep(interval).await;
  }
}

/// Sender with a result record for the latest submission.
pub struct TransactionSender {
  ctx: SessionContext,
  mutation: Mutation<TxHash>,
}

impl TransactionSender {
  pub fn new(ctx: &SessionContext) -> Self {
    Self {
      ctx: ctx.clone(),
      mutation: Mutation::new(),
    }
  }

  pub async fn send(&self, request: TransactionRequest) -> Result<TxHash, SessionError> {
    self.mutation.run(send_transaction(&self.ctx, request)).await
  }

  pub fn state(&self) -> MutationState<TxHash> {
    self.mutation.state()
  }
}

/// Inputs of a receipt watch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiptParams {
  /// Nothing is awaited while absent.
  pub hash: Option<TxHash>,
  /// Chain; the active chain at start when absent.
  pub chain_id: Option<ChainId>,
}

pub struct ReceiptFetcher;

#[async_trait]
impl Fetcher for ReceiptFetcher {
  type Params = ReceiptParams;
  type Output = TxReceipt;

  const NAME: &'static str = "receipt";

  async fn fetch(
    &self,
    ctx: &SessionContext,
    params: &ReceiptParams,
  ) -> Result<Option<TxReceipt>, SessionError> {
    let Some(hash) = params.hash else {
      return Ok(None);
    };
    let chain_id = params
      .chain_id
      .or_else(|| ctx.session.current_chain_id())
      .ok_or(SessionError::NoChainAvailable)?;
    wait_for_receipt(ctx, hash, chain_id).await.map(Some)
  }

  fn poll_interval(&self, _ctx: &SessionContext, _params: &ReceiptParams) -> Option<Duration> {
    None
  }
}

/// Re-runnable receipt wait: `set_params` aborts the previous wait.
///
/// The record reads `is_success()` for a successful receipt and
/// `is_error()` with `Reverted` for a failed one.
pub type ReceiptWatch = Query<ReceiptFetcher>;

/// Start waiting for a receipt.
pub fn watch_receipt(ctx: &SessionContext, params: ReceiptParams) -> ReceiptWatch {
  Query::new(ctx.clone(), ReceiptFetcher, params)
}
