//! Chain Registry - Supported Network Lookup
//!
//! Immutable table of the networks the session may target. Loaded once
//! from configuration at startup and shared by the session manager, the
//! RPC client factory, and every derived module.

use std::collections::BTreeMap;

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::SessionError;

/// Numeric EVM chain identifier.
pub type ChainId = u64;

/// Static description of one supported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    /// EIP-155 chain id.
    pub chain_id: ChainId,
    /// Human-readable network name (also the SDK network key).
    pub name: String,
    /// Native currency ticker, e.g. `ETH` or `POL`.
    pub native_symbol: String,
    /// Native currency decimals (18 for every mainstream EVM chain).
    pub native_decimals: u8,
    /// Public JSON-RPC endpoint used for read-only queries.
    pub rpc_url: Option<String>,
    /// Block explorer base URL.
    pub explorer_url: Option<String>,
}

impl ChainDescriptor {
    /// RPC endpoint, if one is configured and non-blank.
    pub fn rpc_endpoint(&self) -> Option<&str> {
        self.rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Registry construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("chain registry is empty")]
    Empty,
    #[error("chain {0} is registered more than once")]
    Duplicate(ChainId),
    #[error("default chain {0} is not registered")]
    MissingDefault(ChainId),
}

/// Lookup table chain id → descriptor, with a default-chain selector.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: BTreeMap<ChainId, ChainDescriptor>,
    default_chain: ChainId,
}

impl ChainRegistry {
    /// Build a registry, rejecting duplicates and an unknown default.
    pub fn new(
        chains: impl IntoIterator<Item = ChainDescriptor>,
        default_chain: ChainId,
    ) -> Result<Self, RegistryError> {
        let mut table = BTreeMap::new();
        for chain in chains {
            let id = chain.chain_id;
            if table.insert(id, chain).is_some() {
                return Err(RegistryError::Duplicate(id));
            }
        }

        if table.is_empty() {
            return Err(RegistryError::Empty);
        }
        if !table.contains_key(&default_chain) {
            return Err(RegistryError::MissingDefault(default_chain));
        }

        Ok(Self {
            chains: table,
            default_chain,
        })
    }

    /// Look up a chain by id.
    pub fn get(&self, chain_id: ChainId) -> Option<&ChainDescriptor> {
        self.chains.get(&chain_id)
    }

    /// Look up a chain by id, failing with `UnsupportedChain`.
    pub fn require(&self, chain_id: ChainId) -> Result<&ChainDescriptor, SessionError> {
        self.get(chain_id)
            .ok_or(SessionError::UnsupportedChain(chain_id))
    }

    /// Whether the chain id is registered.
    pub fn contains(&self, chain_id: ChainId) -> bool {
        self.chains.contains_key(&chain_id)
    }

    /// The configured default chain id.
    pub const fn default_chain_id(&self) -> ChainId {
        self.default_chain
    }

    /// The configured default chain descriptor.
    pub fn default_chain(&self) -> &ChainDescriptor {
        // `new` guarantees the default is present.
        &self.chains[&self.default_chain]
    }

    /// All registered chains, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &ChainDescriptor> {
        self.chains.values()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Explorer link for a transaction, when the chain has an explorer.
    pub fn explorer_tx_url(&self, chain_id: ChainId, hash: B256) -> Option<String> {
        self.explorer_base(chain_id)
            .map(|base| format!("{base}/tx/{hash}"))
    }

    /// Explorer link for an account or contract.
    pub fn explorer_address_url(&self, chain_id: ChainId, address: Address) -> Option<String> {
        self.explorer_base(chain_id)
            .map(|base| format!("{base}/address/{address}"))
    }

    fn explorer_base(&self, chain_id: ChainId) -> Option<&str> {
        self.get(chain_id)?
            .explorer_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }
}
