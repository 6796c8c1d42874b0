//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the session layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `ProviderSdk` / `NetworkProvider`: the external signing provider
//! - `ChainReader` / `RpcClientFactory`: read-only public RPC access
//! - `SessionObserver`: metrics sink for lifecycle and fetch events

pub mod chain_reader;
pub mod metrics;
pub mod provider_sdk;

pub use chain_reader::{ChainReader, RpcClientFactory};
pub use metrics::SessionObserver;
pub use provider_sdk::{NetworkProvider, ProviderError, ProviderSdk, WalletRequests};
