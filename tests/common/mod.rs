//! Shared test fixtures: mockall mocks for the ports, a scripted
//! in-memory network provider that records which chain each request hit,
//! and a provider SDK that hands those out.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use mockall::mock;
use serde_json::{json, Value};
use tokio::sync::Notify;

use wallet_session::domain::chain::{ChainDescriptor, ChainId, ChainRegistry};
use wallet_session::domain::error::SessionError;
use wallet_session::domain::transaction::{TxHash, TxReceipt};
use wallet_session::ports::chain_reader::{ChainReader, RpcClientFactory};
use wallet_session::ports::provider_sdk::{NetworkProvider, ProviderError, ProviderSdk};
use wallet_session::usecases::{SessionContext, SessionManager, SessionOptions};

// ---- Mock Definitions ----

mock! {
    pub Sdk {}

    #[async_trait::async_trait]
    impl ProviderSdk for Sdk {
        async fn init(&self) -> anyhow::Result<()>;
        async fn provider_for_network(
            &self,
            chain: &ChainDescriptor,
        ) -> anyhow::Result<Arc<dyn NetworkProvider>>;
        async fn logout(&self) -> anyhow::Result<()>;
        async fn finalize(&self) -> anyhow::Result<()>;
    }
}

mock! {
    pub Reader {}

    #[async_trait::async_trait]
    impl ChainReader for Reader {
        fn chain_id(&self) -> ChainId;
        async fn native_balance(&self, owner: Address) -> anyhow::Result<U256>;
        async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes>;
        async fn gas_price(&self) -> anyhow::Result<u128>;
        async fn transaction_receipt(&self, hash: TxHash) -> anyhow::Result<Option<TxReceipt>>;
    }
}

mock! {
    pub RpcFactory {}

    impl RpcClientFactory for RpcFactory {
        fn build(&self, chain_id: ChainId) -> Result<Arc<dyn ChainReader>, SessionError>;
    }
}

// ---- Addresses ----

pub const ALICE: Address = Address::repeat_byte(0xa1);
pub const BOB: Address = Address::repeat_byte(0xb0);
pub const TOKEN: Address = Address::repeat_byte(0x70);

// ---- Recording provider ----

/// One request seen by a `RecordingProvider`.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub chain_id: ChainId,
    pub method: String,
    pub params: Value,
}

pub type RequestLog = Arc<Mutex<Vec<Recorded>>>;

/// Scripted answers shared by every provider handle of a `FakeSdk`.
#[derive(Debug, Clone)]
pub struct Script {
    /// Accounts returned per chain (falls back to `default_accounts`).
    pub accounts: HashMap<ChainId, Vec<Address>>,
    pub default_accounts: Vec<Address>,
    /// `eth_gasPrice` answer; `None` fails the call.
    pub gas_price_wei: Option<u128>,
    /// Reject signature and transaction requests with code 4001.
    pub reject_signatures: bool,
    /// Fail `eth_accounts` (the re-query after a switch).
    pub fail_account_requery: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            accounts: HashMap::new(),
            default_accounts: vec![ALICE],
            gas_price_wei: Some(30_000_000_000),
            reject_signatures: false,
            fail_account_requery: false,
        }
    }
}

/// In-memory network provider that records which chain each request hit.
pub struct RecordingProvider {
    chain_id: ChainId,
    script: Arc<Mutex<Script>>,
    log: RequestLog,
    /// When set, `eth_requestAccounts` waits for a notification.
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl NetworkProvider for RecordingProvider {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.log.lock().unwrap().push(Recorded {
            chain_id: self.chain_id,
            method: method.to_string(),
            params: params.clone(),
        });

        if method == "eth_requestAccounts" {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }

        let script = self.script.lock().unwrap().clone();
        let rejected = || ProviderError::Rpc {
            code: 4001,
            message: "User rejected the request.".into(),
        };

        match method {
            "eth_requestAccounts" => Ok(json!(accounts_for(&script, self.chain_id))),
            "eth_accounts" if script.fail_account_requery => {
                Err(ProviderError::Transport("accounts unavailable".into()))
            }
            "eth_accounts" => Ok(json!(accounts_for(&script, self.chain_id))),
            "eth_gasPrice" => script
                .gas_price_wei
                .map(|wei| json!(format!("{wei:#x}")))
                .ok_or_else(|| ProviderError::Transport("gas price unavailable".into())),
            "eth_sendTransaction" | "personal_sign" | "eth_signTypedData_v4"
                if script.reject_signatures =>
            {
                Err(rejected())
            }
            "eth_sendTransaction" => {
                let mut hash = [0u8; 32];
                hash[31] = u8::try_from(self.chain_id % 256).unwrap();
                Ok(json!(TxHash::from(hash)))
            }
            "personal_sign" | "eth_signTypedData_v4" => {
                Ok(json!(format!("0xsig-{}-{}", method, self.chain_id)))
            }
            other => Err(ProviderError::Rpc {
                code: -32601,
                message: format!("method {other} not supported"),
            }),
        }
    }
}

fn accounts_for(script: &Script, chain_id: ChainId) -> Vec<Address> {
    script
        .accounts
        .get(&chain_id)
        .cloned()
        .unwrap_or_else(|| script.default_accounts.clone())
}

/// Provider SDK handing out `RecordingProvider`s.
pub struct FakeSdk {
    pub inits: AtomicUsize,
    pub logouts: AtomicUsize,
    pub finalizes: AtomicUsize,
    pub script: Arc<Mutex<Script>>,
    pub log: RequestLog,
    /// Chains for which `provider_for_network` fails.
    pub failing_chains: Mutex<Vec<ChainId>>,
    pub gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self {
            inits: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
            finalizes: AtomicUsize::new(0),
            script: Arc::new(Mutex::new(Script::default())),
            log: Arc::new(Mutex::new(Vec::new())),
            failing_chains: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    pub fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.script.lock().unwrap());
    }

    pub fn requests(&self, method: &str) -> Vec<Recorded> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProviderSdk for FakeSdk {
    async fn init(&self) -> anyhow::Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn provider_for_network(
        &self,
        chain: &ChainDescriptor,
    ) -> anyhow::Result<Arc<dyn NetworkProvider>> {
        if self.failing_chains.lock().unwrap().contains(&chain.chain_id) {
            anyhow::bail!("network {} unavailable", chain.name);
        }
        Ok(Arc::new(RecordingProvider {
            chain_id: chain.chain_id,
            script: Arc::clone(&self.script),
            log: Arc::clone(&self.log),
            gate: self.gate.lock().unwrap().clone(),
        }))
    }

    async fn logout(&self) -> anyhow::Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn finalize(&self) -> anyhow::Result<()> {
        self.finalizes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---- Registry and wiring ----

pub fn chain(chain_id: ChainId, name: &str, symbol: &str, rpc: bool) -> ChainDescriptor {
    ChainDescriptor {
        chain_id,
        name: name.to_string(),
        native_symbol: symbol.to_string(),
        native_decimals: 18,
        rpc_url: rpc.then(|| format!("http://127.0.0.1:8545/{chain_id}")),
        explorer_url: Some(format!("https://explorer.example/{chain_id}")),
    }
}

/// Chains `{1: "A", 137: "B", 10: no RPC}` with default 1.
pub fn registry() -> Arc<ChainRegistry> {
    Arc::new(
        ChainRegistry::new(
            [
                chain(1, "A", "ETH", true),
                chain(137, "B", "POL", true),
                chain(10, "C", "ETH", false),
            ],
            1,
        )
        .unwrap(),
    )
}

pub fn session_with(sdk: Arc<dyn ProviderSdk>, options: SessionOptions) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(sdk, registry(), options))
}

pub fn fake_session() -> (Arc<FakeSdk>, Arc<SessionManager>) {
    let sdk = Arc::new(FakeSdk::new());
    let session = session_with(sdk.clone(), SessionOptions::default());
    (sdk, session)
}

pub fn context(session: Arc<SessionManager>, rpc: impl RpcClientFactory) -> SessionContext {
    SessionContext::new(session, Arc::new(rpc))
}

/// Factory that always returns `reader` and counts builds.
pub fn factory_returning(reader: MockReader, builds: Arc<AtomicUsize>) -> MockRpcFactory {
    let reader: Arc<dyn ChainReader> = Arc::new(reader);
    let mut factory = MockRpcFactory::new();
    factory.expect_build().returning(move |_| {
        builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&reader))
    });
    factory
}

/// Factory that must never be asked for a reader.
pub fn unused_factory() -> MockRpcFactory {
    let mut factory = MockRpcFactory::new();
    factory.expect_build().never();
    factory
}

/// ABI-encode return values the way a node would.
pub fn encode_returns(values: Vec<alloy::dyn_abi::DynSolValue>) -> Bytes {
    Bytes::from(alloy::dyn_abi::DynSolValue::Tuple(values).abi_encode_params())
}
