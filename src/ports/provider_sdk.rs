//! Provider SDK Port - External Signing/RPC Provider Interface
//!
//! Defines the boundary with the opaque, externally-supplied wallet SDK:
//! an init handshake, a per-network provider handle that dispatches
//! JSON-RPC-shaped requests, and teardown. Responses are untyped JSON at
//! this boundary; `WalletRequests` wraps them into typed values before
//! anything else in the crate sees them.

use std::sync::Arc;

use alloy::hex;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::chain::{ChainDescriptor, ChainId};
use crate::domain::error::SessionError;
use crate::domain::transaction::TransactionRequest;

/// EIP-1193 "user rejected the request" error code.
pub const USER_REJECTED: i64 = 4001;

/// Failure reported by a provider handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
  /// The provider answered with a JSON-RPC error object.
  #[error("provider error {code}: {message}")]
  Rpc {
    /// JSON-RPC / EIP-1193 error code.
    code: i64,
    /// Provider-supplied message.
    message: String,
  },
  /// The request never produced a JSON-RPC answer.
  #[error("provider transport failure: {0}")]
  Transport(String),
}

impl ProviderError {
  /// Whether the user (or wallet policy) declined the request.
  pub const fn is_user_rejection(&self) -> bool {
    matches!(self, Self::Rpc { code, .. } if *code == USER_REJECTED)
  }
}

impl From<ProviderError> for SessionError {
  fn from(err: ProviderError) -> Self {
    match err {
      ProviderError::Rpc { code, message } if code == USER_REJECTED => {
        Self::SignatureRejected(message)
      }
      other => Self::Transport(other.to_string()),
    }
  }
}

/// Chain-specific signing/RPC handle issued by the SDK.
#[async_trait]
pub trait NetworkProvider: Send + Sync + 'static {
  /// Chain this handle is bound to.
  fn chain_id(&self) -> ChainId;

  /// Dispatch a JSON-RPC request (`{method, params}`) through the wallet.
  async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

/// The external provider SDK.
///
/// Constructed from configuration by the caller; the session manager owns
/// it exclusively and drives its lifecycle.
#[async_trait]
pub trait ProviderSdk: Send + Sync + 'static {
  /// Perform the asynchronous init handshake.
  async fn init(&self) -> anyhow::Result<()>;

  /// Obtain the signing/RPC handle for one network.
  async fn provider_for_network(
    &self,
    chain: &ChainDescriptor,
  ) -> anyhow::Result<Arc<dyn NetworkProvider>>;

  /// End the user's wallet session (best-effort SDK-side cleanup).
  async fn logout(&self) -> anyhow::Result<()>;

  /// Release every SDK resource. No calls are made afterwards.
  async fn finalize(&self) -> anyhow::Result<()>;
}

/// Typed wrappers over the wallet JSON-RPC methods the session layer uses.
///
/// Implemented for every `NetworkProvider` (including trait objects).
#[async_trait]
pub trait WalletRequests: NetworkProvider {
  /// `eth_requestAccounts`: may prompt the user.
  async fn request_accounts(&self) -> Result<Vec<Address>, SessionError> {
    let raw = self.request("eth_requestAccounts", json!([])).await?;
    decode("eth_requestAccounts", raw)
  }

  /// `eth_accounts`: never prompts.
  async fn accounts(&self) -> Result<Vec<Address>, SessionError> {
    let raw = self.request("eth_accounts", json!([])).await?;
    decode("eth_accounts", raw)
  }

  /// `eth_sendTransaction`: sign and broadcast, returning the hash.
  async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, SessionError> {
    let raw = self.request("eth_sendTransaction", json!([tx])).await?;
    decode("eth_sendTransaction", raw)
  }

  /// `personal_sign` over the UTF-8 bytes of `message`.
  async fn personal_sign(&self, message: &str, signer: Address) -> Result<String, SessionError> {
    let payload = hex::encode_prefixed(message.as_bytes());
    let raw = self.request("personal_sign", json!([payload, signer])).await?;
    decode("personal_sign", raw)
  }

  /// `eth_signTypedData_v4` over a structured EIP-712 payload.
  async fn sign_typed_data_v4(
    &self,
    signer: Address,
    typed_data: &Value,
  ) -> Result<String, SessionError> {
    let raw = self
      .request(
        "eth_signTypedData_v4",
        json!([signer, typed_data.to_string()]),
      )
      .await?;
    decode("eth_signTypedData_v4", raw)
  }

  /// `eth_gasPrice` in wei.
  async fn gas_price(&self) -> Result<u128, SessionError> {
    let raw = self.request("eth_gasPrice", json!([])).await?;
    let wei: U256 = decode("eth_gasPrice", raw)?;
    u128::try_from(wei)
      .map_err(|_| SessionError::Transport(format!("eth_gasPrice out of range: {wei}")))
  }
}

impl<P: NetworkProvider + ?Sized> WalletRequests for P {}

/// Decode a provider result into a typed value.
fn decode<T: DeserializeOwned>(method: &str, raw: Value) -> Result<T, SessionError> {
  serde_json::from_value(raw)
    .map_err(|e| SessionError::Transport(format!("malformed {method} response: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_user_rejection_maps_to_signature_rejected() {
    let err = ProviderError::Rpc {
      code: USER_REJECTED,
      message: "User denied".into(),
    };
    assert!(err.is_user_rejection());
    assert_eq!(
      SessionError::from(err),
      SessionError::SignatureRejected("User denied".into())
    );
  }

  #[test]
  fn test_other_errors_map_to_transport() {
    let err = ProviderError::Rpc {
      code: -32603,
      message: "internal".into(),
    };
    assert!(matches!(SessionError::from(err), SessionError::Transport(_)));

    let err = ProviderError::Transport("timeout".into());
    assert!(SessionError::from(err).to_string().contains("timeout"));
  }

  #[test]
  fn test_decode_rejects_malformed_payload() {
    let err = decode::<Vec<Address>>("eth_accounts", json!("nope")).unwrap_err();
    assert!(err.to_string().contains("malformed eth_accounts"));
  }
}
