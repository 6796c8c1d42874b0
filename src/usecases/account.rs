//! Account Module - Connected Address Projection
//!
//! Read-only view of who is connected and on which chain, built on the
//! session's reactive projection.

use alloy::primitives::Address;
use serde::Serialize;
use tokio::sync::watch;

use crate::domain::chain::ChainId;
use crate::domain::session::SessionStatus;

use super::context::SessionContext;
use super::session_manager::SessionState;

/// Account status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
  pub address: Option<Address>,
  pub chain_id: Option<ChainId>,
  pub status: SessionStatus,
  pub is_connected: bool,
  pub is_connecting: bool,
  /// Explorer page for the address, when the chain has an explorer.
  pub explorer_url: Option<String>,
}

/// Follows the session projection and exposes `Account` records.
pub struct AccountView {
  ctx: SessionContext,
  rx: watch::Receiver<SessionState>,
}

impl AccountView {
  pub fn new(ctx: &SessionContext) -> Self {
    Self {
      rx: ctx.session.subscribe(),
      ctx: ctx.clone(),
    }
  }

  /// Account as currently projected.
  pub fn current(&self) -> Account {
    let state = self.rx.borrow().clone();
    self.project(&state)
  }

  /// Wait for the next session change. `None` once the session is gone.
  pub async fn changed(&mut self) -> Option<Account> {
    self.rx.changed().await.ok()?;
    let state = self.rx.borrow_and_update().clone();
    Some(self.project(&state))
  }

  fn project(&self, state: &SessionState) -> Account {
    let explorer_url = match (state.chain_id, state.address) {
      (Some(chain_id), Some(address)) => self.ctx.registry.explorer_address_url(chain_id, address),
      _ => None,
    };
    Account {
      address: state.address,
      chain_id: state.chain_id,
      status: state.status,
      is_connected: state.is_connected(),
      is_connecting: state.status == SessionStatus::Connecting,
      explorer_url,
    }
  }
}
