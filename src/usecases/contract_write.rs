//! Contract Write Module - Signed Contract Calls
//!
//! Encodes a `ContractCall` into calldata and hands it to the session's
//! network provider as `eth_sendTransaction`. Returns the hash without
//! waiting for inclusion; nonce handling is left to the provider.

use alloy::primitives::U256;
use tracing::{info, instrument};

use crate::domain::call::ContractCall;
use crate::domain::error::SessionError;
use crate::domain::transaction::{TransactionRequest, TxHash};
use crate::ports::provider_sdk::WalletRequests;

use super::context::SessionContext;
use super::query::{Mutation, MutationState};

/// A state-changing contract call.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
  pub call: ContractCall,
  /// Wei to attach.
  pub value: Option<U256>,
}

impl From<ContractCall> for WriteRequest {
  fn from(call: ContractCall) -> Self {
    Self { call, value: None }
  }
}

/// Encode and dispatch one write through the current provider.
#[instrument(skip_all, fields(function = %request.call.function_name, to = %request.call.address))]
pub async fn write_contract(
  ctx: &SessionContext,
  request: &WriteRequest,
) -> Result<TxHash, SessionError> {
  let session = ctx.session.connected()?;
  let data = request.call.calldata()?;

  let tx = TransactionRequest {
    from: Some(session.address),
    to: Some(request.call.address),
    data: Some(data),
    value: request.value,
    gas: None,
  };

  let hash = session.provider.send_transaction(&tx).await?;
  info!(%hash, chain_id = session.chain_id, "Contract write submitted");
  Ok(hash)
}

/// Contract writer with a result record for the latest write.
pub struct ContractWriter {
  ctx: SessionContext,
  mutation: Mutation<TxHash>,
}

impl ContractWriter {
  pub fn new(ctx: &SessionContext) -> Self {
    Self {
      ctx: ctx.clone(),
      mutation: Mutation::new(),
    }
  }

  pub async fn write(&self, request: &WriteRequest) -> Result<TxHash, SessionError> {
    self.mutation.run(write_contract(&self.ctx, request)).await
  }

  pub fn state(&self) -> MutationState<TxHash> {
    self.mutation.state()
  }

  pub fn reset(&self) {
    self.mutation.reset();
  }
}
