//! Wallet Relay Client - HTTP Provider SDK
//!
//! Implements the `ProviderSdk` and `NetworkProvider` ports against a
//! wallet relay service. The relay holds the user's keys and forwards
//! wallet-facing JSON-RPC requests (account requests, signatures,
//! transactions) to the user's signer; this client only speaks HTTP.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST /init`: handshake, registers the client id
//! - `POST /rpc/{chain_id}`: JSON-RPC 2.0 envelope for one network
//! - `POST /logout`: ends the user's wallet session
//! - `POST /finalize`: releases the client registration

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::domain::chain::{ChainDescriptor, ChainId};
use crate::ports::provider_sdk::{NetworkProvider, ProviderError, ProviderSdk};

/// Header carrying the registered client id.
const CLIENT_ID_HEADER: &str = "x-client-id";

/// Configuration for the relay client.
#[derive(Debug, Clone)]
pub struct RelayConfig {
  /// Base URL of the wallet relay.
  pub base_url: String,
  /// Client identifier issued by the relay operator.
  pub client_id: String,
  /// Per-request timeout. Covers the time the user takes to approve.
  pub timeout: Duration,
}

impl Default for RelayConfig {
  fn default() -> Self {
    Self {
      base_url: "http://127.0.0.1:8787".to_string(),
      client_id: String::new(),
      timeout: Duration::from_secs(30),
    }
  }
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
struct RpcEnvelope<'a> {
  jsonrpc: &'static str,
  id: u64,
  method: &'a str,
  params: Value,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
struct RpcReply {
  #[serde(default)]
  result: Option<Value>,
  #[serde(default)]
  error: Option<RpcFault>,
}

#[derive(Debug, Deserialize)]
struct RpcFault {
  code: i64,
  message: String,
}

/// Shared HTTP state for the SDK and every provider handle it issues.
struct RelayInner {
  http: Client,
  config: RelayConfig,
  next_id: AtomicU64,
}

impl RelayInner {
  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// POST a control message and require a 2xx answer.
  async fn post_control(&self, path: &str, body: Value) -> Result<()> {
    let response = self
      .http
      .post(self.url(path))
      .header(CLIENT_ID_HEADER, &self.config.client_id)
      .json(&body)
      .send()
      .await
      .with_context(|| format!("relay {path} request failed"))?;

    match response.status() {
      status if status.is_success() => Ok(()),
      status => {
        let body = response.text().await.unwrap_or_default();
        bail!("relay {path} returned {status}: {body}")
      }
    }
  }
}

/// Provider SDK backed by a wallet relay.
pub struct RelaySdk {
  inner: Arc<RelayInner>,
  initialized: AtomicBool,
}

impl RelaySdk {
  /// Create the client. No network I/O happens until `init`.
  pub fn new(config: RelayConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    Ok(Self {
      inner: Arc::new(RelayInner {
        http,
        config,
        next_id: AtomicU64::new(1),
      }),
      initialized: AtomicBool::new(false),
    })
  }
}

#[async_trait]
impl ProviderSdk for RelaySdk {
  #[instrument(skip(self), fields(relay = %self.inner.config.base_url))]
  async fn init(&self) -> Result<()> {
    if self.inner.config.client_id.is_empty() {
      bail!("relay client id is empty");
    }
    self
      .inner
      .post_control("/init", json!({ "clientId": self.inner.config.client_id }))
      .await?;
    self.initialized.store(true, Ordering::Release);
    info!("Wallet relay handshake complete");
    Ok(())
  }

  async fn provider_for_network(
    &self,
    chain: &ChainDescriptor,
  ) -> Result<Arc<dyn NetworkProvider>> {
    if !self.initialized.load(Ordering::Acquire) {
      bail!("relay SDK used before init");
    }
    debug!(chain_id = chain.chain_id, network = %chain.name, "Issuing provider handle");
    Ok(Arc::new(RelayNetworkProvider {
      inner: Arc::clone(&self.inner),
      chain_id: chain.chain_id,
    }))
  }

  #[instrument(skip(self))]
  async fn logout(&self) -> Result<()> {
    self.inner.post_control("/logout", json!({})).await
  }

  #[instrument(skip(self))]
  async fn finalize(&self) -> Result<()> {
    let result = self.inner.post_control("/finalize", json!({})).await;
    self.initialized.store(false, Ordering::Release);
    result
  }
}

/// Provider handle bound to one chain.
pub struct RelayNetworkProvider {
  inner: Arc<RelayInner>,
  chain_id: ChainId,
}

#[async_trait]
impl NetworkProvider for RelayNetworkProvider {
  fn chain_id(&self) -> ChainId {
    self.chain_id
  }

  #[instrument(skip(self, params), fields(chain_id = self.chain_id))]
  async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
    let envelope = RpcEnvelope {
      jsonrpc: "2.0",
      id,
      method,
      params,
    };

    let response = self
      .inner
      .http
      .post(self.inner.url(&format!("/rpc/{}", self.chain_id)))
      .header(CLIENT_ID_HEADER, &self.inner.config.client_id)
      .json(&envelope)
      .send()
      .await
      .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
      let body = response.text().await.unwrap_or_default();
      warn!(%status, "Relay rejected request");
      return Err(ProviderError::Transport(format!("relay returned {status}: {body}")));
    }

    let reply: RpcReply = response
      .json()
      .await
      .map_err(|e| ProviderError::Transport(format!("malformed relay reply: {e}")))?;

    decode_reply(reply)
  }
}

fn decode_reply(reply: RpcReply) -> Result<Value, ProviderError> {
  match (reply.error, reply.result) {
    (Some(fault), _) => Err(ProviderError::Rpc {
      code: fault.code,
      message: fault.message,
    }),
    (None, Some(result)) => Ok(result),
    (None, None) => Ok(Value::Null),
  }
}
