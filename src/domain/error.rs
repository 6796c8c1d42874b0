//! Session error taxonomy.
//!
//! Every failure that can reach a consumer of the session layer is one of
//! these variants. The type is `Clone` so it can be stored inside query and
//! mutation result records alongside the last good data.

use alloy::primitives::B256;
use thiserror::Error;

use super::chain::ChainId;

/// Structured reason for a failed session or derived operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The provider SDK has not completed its init handshake.
    #[error("wallet session is not initialized")]
    NotInitialized,

    /// The operation needs a connected account.
    #[error("wallet session is not connected")]
    NotConnected,

    /// The chain id is not present in the chain registry (or lacks an RPC URL).
    #[error("chain {0} is not supported")]
    UnsupportedChain(ChainId),

    /// A balance read could not resolve a chain with an RPC endpoint.
    #[error("no RPC endpoint configured for the requested chain")]
    NoRpcConfigured,

    /// Neither the request nor the session names a chain.
    #[error("no chain available: pass a chain id or connect a session")]
    NoChainAvailable,

    /// A network or provider call failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transaction was included but its execution failed.
    #[error("transaction {hash} reverted")]
    Reverted {
        /// Hash of the reverted transaction.
        hash: B256,
    },

    /// The user (or wallet policy) declined the request.
    #[error("request rejected by wallet: {0}")]
    SignatureRejected(String),

    /// The provider answered the account request with an empty list.
    #[error("provider returned no accounts")]
    NoAccounts,

    /// The call descriptor or payload could not be encoded or decoded.
    #[error("invalid call: {0}")]
    InvalidCall(String),

    /// A disconnect or teardown overtook this lifecycle operation.
    #[error("operation superseded by a newer session change")]
    Superseded,

    /// The session was torn down; no further operations are permitted.
    #[error("wallet session has been finalized")]
    Finalized,
}

impl SessionError {
    /// Wrap any displayable failure as a transport error.
    pub fn transport(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport(format!("{context}: {err}"))
    }

    /// Whether retrying the same request later could succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_includes_context() {
        let err = SessionError::transport("eth_getBalance", "connection refused");
        assert_eq!(
            err.to_string(),
            "transport error: eth_getBalance: connection refused"
        );
        assert!(err.is_transient());
    }

    #[test]
    fn test_domain_errors_are_not_transient() {
        assert!(!SessionError::UnsupportedChain(5).is_transient());
        assert!(!SessionError::Reverted { hash: B256::ZERO }.is_transient());
        assert!(!SessionError::SignatureRejected("denied".into()).is_transient());
    }
}
