//! Session Observer Port - Metrics Sink Interface
//!
//! The session manager and the query engine report lifecycle events,
//! fetch outcomes and gas readings through this trait. The Prometheus
//! adapter implements it; nothing in the use cases depends on a
//! concrete metrics backend.

use crate::domain::chain::ChainId;

/// Receives session and derived-query observations.
pub trait SessionObserver: Send + Sync + 'static {
  /// One lifecycle event (`initialized`, `connected`, `chain_switched`, ...).
  fn record_transition(&self, event: &str);

  /// Committed session state after every change.
  fn observe_session(&self, connected: bool, chain_id: Option<ChainId>);

  /// Outcome of one derived-module fetch.
  fn record_fetch(&self, module: &str, ok: bool);

  /// Latest gas price reading in gwei.
  fn observe_gas_price(&self, gwei: f64);
}
