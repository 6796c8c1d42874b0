//! Wallet Adapters - Provider SDK Implementations
//!
//! HTTP client for a wallet relay that issues per-network signing
//! handles.

pub mod relay;

pub use relay::{RelayConfig, RelayNetworkProvider, RelaySdk};
