//! Use Cases Layer - Session Lifecycle and Derived Operations
//!
//! Orchestrates domain types with port interfaces. The session manager
//! owns the provider lifecycle; every other module reads it through a
//! `SessionContext` and never keeps a provider handle past one call.
//!
//! Use cases:
//! - `SessionManager`: initialize, connect, switch chain, disconnect
//! - `query`: fetch/poll/supersede engine and mutation records
//! - `account`, `balance`, `contract_read`: read-side modules
//! - `contract_write`, `signing`, `transaction`: wallet-side modules
//! - `gas_price`: fee polling with provider and RPC paths

pub mod account;
pub mod balance;
pub mod context;
pub mod contract_read;
pub mod contract_write;
pub mod gas_price;
pub mod query;
pub mod session_manager;
pub mod signing;
pub mod transaction;

pub use context::{PollingIntervals, SessionContext};
pub use query::{Mutation, MutationState, Query, QueryState};
pub use session_manager::{ConnectedSession, SessionManager, SessionOptions, SessionState};
