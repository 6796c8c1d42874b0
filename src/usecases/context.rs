//! Session Context - Shared Dependencies for Derived Modules
//!
//! One `SessionContext` is built at startup and cloned into every
//! derived module. It carries the session manager, the chain registry,
//! the RPC client factory and the polling cadence.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::chain::ChainRegistry;
use crate::ports::chain_reader::RpcClientFactory;
use crate::ports::metrics::SessionObserver;

use super::session_manager::SessionManager;

/// Refresh cadence for the watching modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingIntervals {
  pub balance: Duration,
  pub contract_read: Duration,
  pub gas_price: Duration,
  /// Delay between `eth_getTransactionReceipt` attempts.
  pub receipt_poll: Duration,
}

impl Default for PollingIntervals {
  fn default() -> Self {
    Self {
      balance: Duration::from_secs(10),
      contract_read: Duration::from_secs(10),
      gas_price: Duration::from_secs(15),
      receipt_poll: Duration::from_millis(1000),
    }
  }
}

/// Dependencies shared by every derived module.
#[derive(Clone)]
pub struct SessionContext {
  pub session: Arc<SessionManager>,
  pub registry: Arc<ChainRegistry>,
  pub rpc: Arc<dyn RpcClientFactory>,
  pub polling: PollingIntervals,
  pub metrics: Option<Arc<dyn SessionObserver>>,
}

impl SessionContext {
  pub fn new(session: Arc<SessionManager>, rpc: Arc<dyn RpcClientFactory>) -> Self {
    Self {
      registry: Arc::clone(session.registry()),
      session,
      rpc,
      polling: PollingIntervals::default(),
      metrics: None,
    }
  }

  pub fn with_polling(mut self, polling: PollingIntervals) -> Self {
    self.polling = polling;
    self
  }

  pub fn with_metrics(mut self, metrics: Arc<dyn SessionObserver>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub(crate) fn record_fetch(&self, module: &str, ok: bool) {
    if let Some(metrics) = &self.metrics {
      metrics.record_fetch(module, ok);
    }
  }
}
