//! Chain Adapters - Read-only RPC Access
//!
//! Provides on-chain reads via alloy-rs 0.9: native balances,
//! `eth_call`, gas price and receipt lookups, one client per chain.

pub mod rpc;

pub use rpc::{AlloyChainReader, AlloyRpcFactory};
