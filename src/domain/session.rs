//! Session lifecycle states.
//!
//! ```text
//! Uninitialized → Initializing → Ready → Connecting → Connected
//!                                  ↑                      │ switch_chain (self-loop)
//!                                  └──── disconnect ──────┘
//! any state ── finalize ──→ Finalized (terminal)
//! ```

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use super::chain::ChainId;

/// Where the session currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No init handshake has completed.
    #[default]
    Uninitialized,
    /// The init handshake is in flight.
    Initializing,
    /// Initialized, no account connected.
    Ready,
    /// An account request is in flight.
    Connecting,
    /// Account, chain, and network provider are all present.
    Connected,
    /// Torn down; handles released.
    Finalized,
}

impl SessionStatus {
    /// Whether the SDK init handshake has completed.
    pub const fn is_initialized(self) -> bool {
        matches!(self, Self::Ready | Self::Connecting | Self::Connected)
    }

    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    pub const fn is_finalized(self) -> bool {
        matches!(self, Self::Finalized)
    }

    /// Short label used for logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable view of the session, without the provider handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub address: Option<Address>,
    pub chain_id: Option<ChainId>,
    /// Monotonic counter bumped on every committed change.
    pub revision: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialized_states() {
        assert!(!SessionStatus::Uninitialized.is_initialized());
        assert!(!SessionStatus::Initializing.is_initialized());
        assert!(SessionStatus::Ready.is_initialized());
        assert!(SessionStatus::Connected.is_initialized());
        assert!(!SessionStatus::Finalized.is_initialized());
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::Connected).unwrap();
        assert_eq!(json, "\"connected\"");
    }
}
