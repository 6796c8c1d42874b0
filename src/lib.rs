//! Wallet Session - Library Root
//!
//! Session and chain-state synchronization for an external wallet
//! provider, plus the derived balance, contract, signing, transaction
//! and gas price modules. Re-exports all modules for integration tests
//! and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
