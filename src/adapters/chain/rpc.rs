//! Public RPC Readers - alloy-rs 0.9 Client Factory
//!
//! Implements the `RpcClientFactory` and `ChainReader` ports over plain
//! HTTP JSON-RPC. One alloy provider is built per chain the first time a
//! derived module asks for it and reused afterwards.
//!
//! In alloy 0.9, `ProviderBuilder::new().on_http()` returns a concrete
//! root provider type. We store it as a type-erased `dyn Provider` so the
//! factory can hand out uniform readers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest as RpcTransactionRequest;
use alloy::transports::http::reqwest::Url;
use alloy::transports::http::{Client, Http};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::domain::chain::{ChainId, ChainRegistry};
use crate::domain::error::SessionError;
use crate::domain::transaction::{TxHash, TxReceipt};
use crate::ports::chain_reader::{ChainReader, RpcClientFactory};

type HttpProvider = Arc<dyn Provider<Http<Client>> + Send + Sync>;

/// Read-only client for a single chain.
pub struct AlloyChainReader {
    chain_id: ChainId,
    provider: HttpProvider,
}

impl AlloyChainReader {
    /// Build a reader for `rpc_url`. No network I/O happens here.
    pub fn connect(chain_id: ChainId, rpc_url: &str) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL for chain {chain_id}"))?;

        // alloy 0.9: on_http() is synchronous
        let provider: HttpProvider = Arc::new(ProviderBuilder::new().on_http(url));

        Ok(Self { chain_id, provider })
    }
}

#[async_trait]
impl ChainReader for AlloyChainReader {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.provider
            .get_balance(owner)
            .await
            .context("eth_getBalance failed")
    }

    #[instrument(skip(self, data), fields(chain_id = self.chain_id))]
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let request = RpcTransactionRequest::default().to(to).input(data.into());
        self.provider
            .call(&request)
            .await
            .context("eth_call failed")
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn gas_price(&self) -> Result<u128> {
        let wei = self
            .provider
            .get_gas_price()
            .await
            .context("eth_gasPrice failed")?;
        debug!(wei, "Gas price read over RPC");
        Ok(wei)
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .context("eth_getTransactionReceipt failed")?;

        Ok(receipt.map(|r| TxReceipt {
            hash,
            success: r.status(),
            block_number: r.block_number,
        }))
    }
}

/// Builds and caches one `AlloyChainReader` per registered chain.
pub struct AlloyRpcFactory {
    registry: Arc<ChainRegistry>,
    readers: Mutex<HashMap<ChainId, Arc<dyn ChainReader>>>,
}

impl AlloyRpcFactory {
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        Self {
            registry,
            readers: Mutex::new(HashMap::new()),
        }
    }
}

impl RpcClientFactory for AlloyRpcFactory {
    fn build(&self, chain_id: ChainId) -> Result<Arc<dyn ChainReader>, SessionError> {
        let mut readers = self.readers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(reader) = readers.get(&chain_id) {
            return Ok(Arc::clone(reader));
        }

        let chain = self.registry.require(chain_id)?;
        let endpoint = chain
            .rpc_endpoint()
            .ok_or(SessionError::UnsupportedChain(chain_id))?;

        let reader: Arc<dyn ChainReader> = Arc::new(
            AlloyChainReader::connect(chain_id, endpoint)
                .map_err(|e| SessionError::transport("building RPC client", format!("{e:#}")))?,
        );
        info!(chain_id, chain = %chain.name, "RPC client created");

        readers.insert(chain_id, Arc::clone(&reader));
        Ok(reader)
    }
}
