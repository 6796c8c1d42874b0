//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, blockchain RPC, metrics
//! servers). Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `chain`: public RPC readers via alloy-rs
//! - `wallet`: provider SDK client for a wallet relay
//! - `metrics`: Prometheus metrics export and health checks

pub mod chain;
pub mod metrics;
pub mod wallet;
