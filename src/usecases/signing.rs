//! Signing Module - Personal and Typed-Data Signatures
//!
//! Both operations run against the current network provider and return
//! the signature string exactly as the wallet produced it.

use serde_json::Value;
use tracing::{info, instrument};

use crate::domain::error::SessionError;
use crate::ports::provider_sdk::WalletRequests;

use super::context::SessionContext;
use super::query::{Mutation, MutationState};

/// `personal_sign` over `message`.
#[instrument(skip_all)]
pub async fn sign_message(ctx: &SessionContext, message: &str) -> Result<String, SessionError> {
  let session = ctx.session.connected()?;
  let signature = session.provider.personal_sign(message, session.address).await?;
  info!(signer = %session.address, "Message signed");
  Ok(signature)
}

/// `eth_signTypedData_v4` over an EIP-712 payload
/// (`{types, primaryType, domain, message}`).
#[instrument(skip_all)]
pub async fn sign_typed_data(ctx: &SessionContext, typed_data: &Value) -> Result<String, SessionError> {
  let session = ctx.session.connected()?;
  validate_typed_data(typed_data)?;
  let signature = session
    .provider
    .sign_typed_data_v4(session.address, typed_data)
    .await?;
  info!(signer = %session.address, "Typed data signed");
  Ok(signature)
}

fn validate_typed_data(typed_data: &Value) -> Result<(), SessionError> {
  let Some(object) = typed_data.as_object() else {
    return Err(SessionError::InvalidCall("typed data must be a JSON object".into()));
  };
  for key in ["types", "primaryType", "domain", "message"] {
    if !object.contains_key(key) {
      return Err(SessionError::InvalidCall(format!("typed data is missing `{key}`")));
    }
  }
  Ok(())
}

/// Signer with a result record for the latest signature request.
pub struct Signer {
  ctx: SessionContext,
  mutation: Mutation<String>,
}

impl Signer {
  pub fn new(ctx: &SessionContext) -> Self {
    Self {
      ctx: ctx.clone(),
      mutation: Mutation::new(),
    }
  }

  pub async fn sign_message(&self, message: &str) -> Result<String, SessionError> {
    self.mutation.run(sign_message(&self.ctx, message)).await
  }

  pub async fn sign_typed_data(&self, typed_data: &Value) -> Result<String, SessionError> {
    self.mutation.run(sign_typed_data(&self.ctx, typed_data)).await
  }

  pub fn state(&self) -> MutationState<String> {
    self.mutation.state()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_typed_data_shape() {
    let ok = json!({
      "types": { "EIP712Domain": [] },
      "primaryType": "Mail",
      "domain": {},
      "message": {}
    });
    assert!(validate_typed_data(&ok).is_ok());

    let err = validate_typed_data(&json!({ "types": {} })).unwrap_err();
    assert!(err.to_string().contains("primaryType"));
    assert!(validate_typed_data(&json!("x")).is_err());
  }
}
