//! Session Manager - Wallet Provider Lifecycle
//!
//! Owns the provider SDK, the active chain and the chain-specific network
//! provider handle. State lives in two places:
//! - a synchronous cell (`RwLock`) read by the `current_*` accessors,
//! - a reactive projection (`watch` channel) observed by dependents.
//!
//! Every change is written to the cell first and published to the
//! projection under the same lock, so code that re-reads the cell after
//! an await point never sees an older chain than the projection shows.
//!
//! Lifecycle:
//! `Uninitialized → Initializing → Ready → Connecting → Connected`,
//! `Connected → Connected` on `switch_chain`, `Connected → Ready` on
//! `disconnect`, any state `→ Finalized` on `finalize`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use alloy::primitives::Address;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::domain::chain::{ChainDescriptor, ChainId, ChainRegistry};
use crate::domain::error::SessionError;
use crate::domain::session::{SessionSnapshot, SessionStatus};
use crate::ports::metrics::SessionObserver;
use crate::ports::provider_sdk::{NetworkProvider, ProviderSdk, WalletRequests};

/// Complete session state, as held by the cell and the projection.
#[derive(Clone, Default)]
pub struct SessionState {
  /// Lifecycle position.
  pub status: SessionStatus,
  /// Connected account (present iff connected).
  pub address: Option<Address>,
  /// Active chain. May be set before connect by `switch_chain`.
  pub chain_id: Option<ChainId>,
  /// Signing/RPC handle for `chain_id`.
  pub network_provider: Option<Arc<dyn NetworkProvider>>,
  /// Bumped on every committed change.
  pub revision: u64,
}

impl SessionState {
  pub const fn is_initialized(&self) -> bool {
    self.status.is_initialized()
  }

  pub const fn is_connected(&self) -> bool {
    self.status.is_connected()
  }

  /// Serializable view without the provider handle.
  pub fn snapshot(&self) -> SessionSnapshot {
    SessionSnapshot {
      status: self.status,
      address: self.address,
      chain_id: self.chain_id,
      revision: self.revision,
    }
  }
}

impl fmt::Debug for SessionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SessionState")
      .field("status", &self.status)
      .field("address", &self.address)
      .field("chain_id", &self.chain_id)
      .field(
        "network_provider",
        &self.network_provider.as_ref().map(|p| p.chain_id()),
      )
      .field("revision", &self.revision)
      .finish()
  }
}

/// Everything a signing operation needs, read in one go from the cell.
#[derive(Clone)]
pub struct ConnectedSession {
  pub address: Address,
  pub chain_id: ChainId,
  pub provider: Arc<dyn NetworkProvider>,
}

impl fmt::Debug for ConnectedSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConnectedSession")
      .field("address", &self.address)
      .field("chain_id", &self.chain_id)
      .finish_non_exhaustive()
  }
}

/// Behaviour switches for the session manager.
#[derive(Debug, Clone)]
pub struct SessionOptions {
  /// Re-read `eth_accounts` on the new handle after a chain switch.
  pub requery_accounts_on_switch: bool,
}

impl Default for SessionOptions {
  fn default() -> Self {
    Self {
      requery_accounts_on_switch: true,
    }
  }
}

/// The single owner of the provider SDK and the active network handle.
pub struct SessionManager {
  sdk: Arc<dyn ProviderSdk>,
  registry: Arc<ChainRegistry>,
  options: SessionOptions,
  /// Synchronous source of truth.
  cell: RwLock<SessionState>,
  /// Reactive projection, always published after the cell.
  projection: watch::Sender<SessionState>,
  /// Set while an init attempt is in flight or has succeeded.
  init_claimed: AtomicBool,
  /// Serializes connect and switch_chain.
  lifecycle: Mutex<()>,
  /// Bumped by disconnect and finalize; in-flight lifecycle operations
  /// only commit if it is unchanged.
  epoch: AtomicU64,
  metrics: Option<Arc<dyn SessionObserver>>,
}

impl SessionManager {
  pub fn new(
    sdk: Arc<dyn ProviderSdk>,
    registry: Arc<ChainRegistry>,
    options: SessionOptions,
  ) -> Self {
    let (projection, _) = watch::channel(SessionState::default());
    Self {
      sdk,
      registry,
      options,
      cell: RwLock::new(SessionState::default()),
      projection,
      init_claimed: AtomicBool::new(false),
      lifecycle: Mutex::new(()),
      epoch: AtomicU64::new(0),
      metrics: None,
    }
  }

  /// Report transitions and session gauges to `metrics`.
  pub fn with_metrics(mut self, metrics: Arc<dyn SessionObserver>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub fn registry(&self) -> &Arc<ChainRegistry> {
    &self.registry
  }

  // ---------------------------------------------------------------------
  // Lifecycle
  // ---------------------------------------------------------------------

  /// Run the SDK init handshake once.
  ///
  /// A call while another attempt is in flight, or after one succeeded,
  /// returns immediately. A failed attempt releases the claim so a later
  /// call may retry.
  #[instrument(skip(self))]
  pub async fn initialize(&self) -> Result<(), SessionError> {
    if self.status().is_finalized() {
      return Err(SessionError::Finalized);
    }
    if self
      .init_claimed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      debug!("Initialize skipped: already in flight or complete");
      return Ok(());
    }

    self.commit(|s| s.status = SessionStatus::Initializing);

    match self.sdk.init().await {
      Ok(()) => {
        let finalized = self.commit(|s| {
          if s.status.is_finalized() {
            return true;
          }
          s.status = SessionStatus::Ready;
          false
        });
        if finalized {
          return Err(SessionError::Finalized);
        }
        self.record("initialized");
        info!("Provider SDK initialized");
        Ok(())
      }
      Err(e) => {
        warn!(error = %format!("{e:#}"), "Provider SDK init failed");
        self.commit(|s| {
          if s.status == SessionStatus::Initializing {
            s.status = SessionStatus::Uninitialized;
          }
        });
        self.init_claimed.store(false, Ordering::Release);
        self.record("init_failed");
        Err(SessionError::transport("provider init", format!("{e:#}")))
      }
    }
  }

  /// Passive startup trigger: initialize, logging instead of returning
  /// failures.
  pub async fn auto_initialize(&self) {
    if let Err(e) = self.initialize().await {
      warn!(error = %e, "Auto-initialize failed; a later call may retry");
    }
  }

  /// Connect an account on the active (or default) chain.
  ///
  /// Returns the connected address. Already connected sessions return
  /// their current address without prompting again.
  #[instrument(skip(self))]
  pub async fn connect(&self) -> Result<Address, SessionError> {
    let _guard = self.lifecycle.lock().await;
    let before = self.current_state();
    Self::require_initialized(&before)?;

    if let (true, Some(address)) = (before.is_connected(), before.address) {
      debug!(%address, "Connect skipped: already connected");
      return Ok(address);
    }

    let chain_id = before
      .chain_id
      .unwrap_or_else(|| self.registry.default_chain_id());
    let chain = self.registry.require(chain_id)?.clone();
    let epoch = self.epoch.load(Ordering::Acquire);

    let provider = match before
      .network_provider
      .clone()
      .filter(|p| p.chain_id() == chain_id)
    {
      Some(provider) => provider,
      None => self.provider_for(&chain).await?,
    };

    let handle = Arc::clone(&provider);
    self.commit_if(epoch, move |s| {
      s.status = SessionStatus::Connecting;
      s.chain_id = Some(chain_id);
      s.network_provider = Some(handle);
    })?;

    let accounts = provider.request_accounts().await;
    let address = match accounts.map(|list| list.first().copied()) {
      Ok(Some(address)) => address,
      Ok(None) => {
        self.rollback_connect(epoch, &before);
        return Err(SessionError::NoAccounts);
      }
      Err(e) => {
        warn!(error = %e, chain_id, "Account request failed");
        self.rollback_connect(epoch, &before);
        return Err(e);
      }
    };

    self.commit_if(epoch, |s| {
      s.status = SessionStatus::Connected;
      s.address = Some(address);
    })?;

    self.record("connected");
    info!(%address, chain_id, chain = %chain.name, "Wallet connected");
    Ok(address)
  }

  /// Drop the connected account, chain and provider handle.
  ///
  /// State is cleared before the best-effort SDK logout is awaited.
  #[instrument(skip(self))]
  pub async fn disconnect(&self) -> Result<(), SessionError> {
    let had_connection = self.commit(|s| {
      if s.status.is_finalized() {
        return Err(SessionError::Finalized);
      }
      self.epoch.fetch_add(1, Ordering::AcqRel);
      let had = matches!(s.status, SessionStatus::Connected | SessionStatus::Connecting);
      if had {
        s.status = SessionStatus::Ready;
      }
      s.address = None;
      s.chain_id = None;
      s.network_provider = None;
      Ok(had)
    })?;

    if had_connection {
      self.record("disconnected");
      info!("Wallet disconnected");
      if let Err(e) = self.sdk.logout().await {
        warn!(error = %format!("{e:#}"), "SDK logout failed");
      }
    }
    Ok(())
  }

  /// Move the session to `target`.
  ///
  /// Unknown chains fail with `UnsupportedChain` before any state changes.
  /// On any failure the session stays on its previous chain and handle.
  /// On an initialized but disconnected session the target becomes the
  /// chain the next `connect` uses.
  #[instrument(skip(self))]
  pub async fn switch_chain(&self, target: ChainId) -> Result<(), SessionError> {
    let _guard = self.lifecycle.lock().await;
    let before = self.current_state();
    Self::require_initialized(&before)?;
    let chain = self.registry.require(target)?.clone();

    if before.chain_id == Some(target) && before.network_provider.is_some() {
      debug!(chain_id = target, "Switch skipped: chain already active");
      return Ok(());
    }

    let epoch = self.epoch.load(Ordering::Acquire);
    let provider = self.provider_for(&chain).await?;

    let mut address = before.address;
    if before.is_connected() && self.options.requery_accounts_on_switch {
      match provider.accounts().await {
        Ok(accounts) => {
          if let Some(first) = accounts.first() {
            address = Some(*first);
          }
        }
        Err(e) => {
          warn!(error = %e, chain_id = target, "Account re-query after switch failed; keeping address");
        }
      }
    }

    self.commit_if(epoch, |s| {
      s.chain_id = Some(target);
      s.network_provider = Some(provider);
      if s.status.is_connected() {
        s.address = address;
      }
    })?;

    self.record("chain_switched");
    info!(
      from = ?before.chain_id,
      to = target,
      chain = %chain.name,
      "Active chain switched"
    );
    Ok(())
  }

  /// Tear the session down. Terminal: every later lifecycle call fails
  /// with `Finalized`.
  #[instrument(skip(self))]
  pub async fn finalize(&self) -> Result<(), SessionError> {
    let prior = self.commit(|s| {
      if s.status.is_finalized() {
        return None;
      }
      self.epoch.fetch_add(1, Ordering::AcqRel);
      let prior = s.status;
      s.status = SessionStatus::Finalized;
      s.address = None;
      s.chain_id = None;
      s.network_provider = None;
      Some(prior)
    });

    let Some(prior) = prior else {
      debug!("Finalize skipped: already finalized");
      return Ok(());
    };

    self.record("finalized");
    info!(prior = %prior, "Session finalized");

    if prior != SessionStatus::Uninitialized {
      if let Err(e) = self.sdk.finalize().await {
        warn!(error = %format!("{e:#}"), "SDK finalize failed");
      }
    }
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Accessors
  // ---------------------------------------------------------------------

  /// Network provider as of right now (reads the cell).
  pub fn current_network_provider(&self) -> Option<Arc<dyn NetworkProvider>> {
    self.read_cell(|s| s.network_provider.clone())
  }

  /// Active chain as of right now (reads the cell).
  pub fn current_chain_id(&self) -> Option<ChainId> {
    self.read_cell(|s| s.chain_id)
  }

  /// Connected account as of right now (reads the cell).
  pub fn current_address(&self) -> Option<Address> {
    self.read_cell(|s| s.address)
  }

  pub fn status(&self) -> SessionStatus {
    self.read_cell(|s| s.status)
  }

  /// Clone of the whole cell.
  pub fn current_state(&self) -> SessionState {
    self.read_cell(Clone::clone)
  }

  /// Address, chain and provider of a connected session, read atomically.
  pub fn connected(&self) -> Result<ConnectedSession, SessionError> {
    self.read_cell(|s| match (s.status, s.address, s.chain_id, &s.network_provider) {
      (SessionStatus::Finalized, ..) => Err(SessionError::Finalized),
      (SessionStatus::Connected, Some(address), Some(chain_id), Some(provider)) => {
        Ok(ConnectedSession {
          address,
          chain_id,
          provider: Arc::clone(provider),
        })
      }
      _ => Err(SessionError::NotConnected),
    })
  }

  /// Subscribe to the reactive projection.
  pub fn subscribe(&self) -> watch::Receiver<SessionState> {
    self.projection.subscribe()
  }

  /// Latest value of the reactive projection.
  pub fn projection(&self) -> SessionState {
    self.projection.borrow().clone()
  }

  // ---------------------------------------------------------------------
  // Internals
  // ---------------------------------------------------------------------

  fn read_cell<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
    let cell = self.cell.read().unwrap_or_else(PoisonError::into_inner);
    f(&cell)
  }

  /// Apply `f` to the cell, then publish the result to the projection
  /// while still holding the cell lock.
  fn commit<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
    let mut cell = self.cell.write().unwrap_or_else(PoisonError::into_inner);
    let result = f(&mut cell);
    cell.revision += 1;
    self.projection.send_replace(cell.clone());
    if let Some(metrics) = &self.metrics {
      metrics.observe_session(cell.is_connected(), cell.chain_id);
    }
    result
  }

  /// Commit only if no disconnect or finalize happened since `epoch`.
  fn commit_if(
    &self,
    epoch: u64,
    f: impl FnOnce(&mut SessionState),
  ) -> Result<(), SessionError> {
    self.commit(|s| {
      if s.status.is_finalized() {
        return Err(SessionError::Finalized);
      }
      if self.epoch.load(Ordering::Acquire) != epoch {
        return Err(SessionError::Superseded);
      }
      f(s);
      Ok(())
    })
  }

  fn rollback_connect(&self, epoch: u64, before: &SessionState) {
    let restored = self.commit_if(epoch, |s| {
      s.status = before.status;
      s.address = before.address;
      s.chain_id = before.chain_id;
      s.network_provider = before.network_provider.clone();
    });
    if restored.is_err() {
      debug!("Connect rollback skipped: session changed meanwhile");
    }
    self.record("connect_failed");
  }

  async fn provider_for(
    &self,
    chain: &ChainDescriptor,
  ) -> Result<Arc<dyn NetworkProvider>, SessionError> {
    self.sdk.provider_for_network(chain).await.map_err(|e| {
      SessionError::transport(
        &format!("provider for chain {}", chain.chain_id),
        format!("{e:#}"),
      )
    })
  }

  fn require_initialized(state: &SessionState) -> Result<(), SessionError> {
    match state.status {
      SessionStatus::Finalized => Err(SessionError::Finalized),
      status if status.is_initialized() => Ok(()),
      _ => Err(SessionError::NotInitialized),
    }
  }

  fn record(&self, event: &str) {
    if let Some(metrics) = &self.metrics {
      metrics.record_transition(event);
    }
  }
}
