//! Query Engine - Fetch, Poll and Supersede
//!
//! Runs a `Fetcher` for one parameter record and keeps its result record
//! current:
//! - an initial fetch on creation,
//! - an optional fixed-interval poll (one timer per live query),
//! - manual `refetch()` outside the timer schedule,
//! - `set_params()` supersedes: in-flight fetches are aborted, the timer
//!   is replaced and results tied to the old inputs are discarded,
//! - queries that fall back to the session re-run when the session's
//!   address or chain changes.
//!
//! Completions carry the generation they were started under; a
//! completion from an older generation is dropped, whatever order the
//! fetches finish in.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::domain::chain::ChainId;
use crate::domain::error::SessionError;

use super::context::SessionContext;

/// One kind of derived read.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
  type Params: Clone + Send + Sync + 'static;
  type Output: Clone + Send + Sync + 'static;

  /// Module label for logs and metrics.
  const NAME: &'static str;

  /// Run one fetch. `Ok(None)` means "nothing to fetch" (e.g. no address).
  async fn fetch(
    &self,
    ctx: &SessionContext,
    params: &Self::Params,
  ) -> Result<Option<Self::Output>, SessionError>;

  /// Poll period, or `None` for a one-shot query. A zero period disables
  /// polling.
  fn poll_interval(&self, ctx: &SessionContext, params: &Self::Params) -> Option<Duration>;

  /// Whether the inputs fall back to the session's address or chain.
  fn follows_session(&self, _params: &Self::Params) -> bool {
    false
  }

  /// Keep the last good data when a fetch fails.
  fn keep_data_on_error(&self) -> bool {
    true
  }
}

/// Result record of a query.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
  pub data: Option<T>,
  pub error: Option<SessionError>,
  /// A fetch is running and there is no data yet.
  pub is_loading: bool,
  /// A fetch is running on top of existing data.
  pub is_refetching: bool,
  /// Time of the last successful fetch.
  pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for QueryState<T> {
  fn default() -> Self {
    Self {
      data: None,
      error: None,
      is_loading: false,
      is_refetching: false,
      updated_at: None,
    }
  }
}

impl<T> QueryState<T> {
  pub const fn is_fetching(&self) -> bool {
    self.is_loading || self.is_refetching
  }

  pub const fn is_success(&self) -> bool {
    self.data.is_some() && self.error.is_none()
  }

  pub const fn is_error(&self) -> bool {
    self.error.is_some()
  }
}

type SessionKey = (Option<Address>, Option<ChainId>);

struct Inner<P> {
  params: P,
  /// Bumped whenever the inputs change; completions must match it.
  generation: u64,
  /// Identity of the live timer; a tick from any other id stops its loop.
  poll_id: u64,
  poll_task: Option<AbortHandle>,
  watcher_task: Option<AbortHandle>,
  in_flight: Vec<AbortHandle>,
  /// Running fetches of the current generation.
  pending: usize,
  session_key: SessionKey,
  disposed: bool,
}

struct Shared<F: Fetcher> {
  fetcher: F,
  ctx: SessionContext,
  inner: Mutex<Inner<F::Params>>,
  state: watch::Sender<QueryState<F::Output>>,
}

/// A live derived read. Dropping it stops every task it owns.
pub struct Query<F: Fetcher> {
  shared: Arc<Shared<F>>,
}

impl<F: Fetcher> Query<F> {
  /// Start the query. Must be called from within a tokio runtime.
  pub fn new(ctx: SessionContext, fetcher: F, params: F::Params) -> Self {
    let session_key = session_key(&ctx);
    let (state, _) = watch::channel(QueryState::default());
    let shared = Arc::new(Shared {
      fetcher,
      ctx,
      inner: Mutex::new(Inner {
        params,
        generation: 0,
        poll_id: 0,
        poll_task: None,
        watcher_task: None,
        in_flight: Vec::new(),
        pending: 0,
        session_key,
        disposed: false,
      }),
      state,
    });

    {
      let mut inner = shared.lock();
      Shared::restart(&shared, &mut inner);
      Shared::restart_watcher(&shared, &mut inner);
    }

    Self { shared }
  }

  /// Current result record.
  pub fn state(&self) -> QueryState<F::Output> {
    self.shared.state.borrow().clone()
  }

  /// Subscribe to result record updates.
  pub fn subscribe(&self) -> watch::Receiver<QueryState<F::Output>> {
    self.shared.state.subscribe()
  }

  /// Current inputs.
  pub fn params(&self) -> F::Params {
    self.shared.lock().params.clone()
  }

  /// Run one extra fetch. The poll timer keeps its own schedule.
  pub fn refetch(&self) {
    let mut inner = self.shared.lock();
    if inner.disposed {
      return;
    }
    Shared::spawn_fetch(&self.shared, &mut inner);
  }

  /// Replace the inputs, discarding everything tied to the old ones.
  pub fn set_params(&self, params: F::Params) {
    let mut inner = self.shared.lock();
    if inner.disposed {
      return;
    }
    inner.params = params;
    Shared::restart(&self.shared, &mut inner);
    Shared::restart_watcher(&self.shared, &mut inner);
  }

  /// Number of poll timers owned by this query (0 or 1).
  pub fn active_timers(&self) -> usize {
    usize::from(self.shared.lock().poll_task.is_some())
  }

  /// Wait until no fetch is running and return the record.
  pub async fn settled(&self) -> QueryState<F::Output> {
    let mut rx = self.subscribe();
    loop {
      {
        let state = rx.borrow_and_update();
        if !state.is_fetching() {
          return state.clone();
        }
      }
      if rx.changed().await.is_err() {
        return self.state();
      }
    }
  }

  /// Stop every task. Further calls are no-ops.
  pub fn dispose(&self) {
    let mut inner = self.shared.lock();
    if inner.disposed {
      return;
    }
    inner.disposed = true;
    Shared::<F>::stop_all(&mut inner);
    debug!(module = F::NAME, "Query disposed");
  }
}

impl<F: Fetcher> Drop for Query<F> {
  fn drop(&mut self) {
    self.dispose();
  }
}

impl<F: Fetcher> Shared<F> {
  fn lock(&self) -> MutexGuard<'_, Inner<F::Params>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn stop_all(inner: &mut Inner<F::Params>) {
    inner.generation += 1;
    inner.poll_id += 1;
    inner.pending = 0;
    for handle in inner.in_flight.drain(..) {
      handle.abort();
    }
    if let Some(handle) = inner.poll_task.take() {
      handle.abort();
    }
    if let Some(handle) = inner.watcher_task.take() {
      handle.abort();
    }
  }

  /// Abort the old generation, reset the record, fetch and re-arm the timer.
  fn restart(this: &Arc<Self>, inner: &mut Inner<F::Params>) {
    inner.generation += 1;
    inner.pending = 0;
    for handle in inner.in_flight.drain(..) {
      handle.abort();
    }
    this.state.send_replace(QueryState::default());

    Self::spawn_fetch(this, inner);
    Self::restart_poll(this, inner);
  }

  fn restart_poll(this: &Arc<Self>, inner: &mut Inner<F::Params>) {
    inner.poll_id += 1;
    if let Some(handle) = inner.poll_task.take() {
      handle.abort();
    }

    let Some(period) = this.fetcher.poll_interval(&this.ctx, &inner.params) else {
      return;
    };
    if period.is_zero() {
      warn!(module = F::NAME, "Zero poll interval; polling disabled");
      return;
    }
    let poll_id = inner.poll_id;
    let weak = Arc::downgrade(this);

    let task = tokio::spawn(async move {
      let mut ticker = interval_at(Instant::now() + period, period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        let Some(shared) = weak.upgrade() else {
          break;
        };
        if !shared.on_tick(poll_id) {
          break;
        }
      }
    });
    inner.poll_task = Some(task.abort_handle());
    let period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
    debug!(module = F::NAME, period_ms, "Poll timer started");
  }

  fn on_tick(self: &Arc<Self>, poll_id: u64) -> bool {
    let mut inner = self.lock();
    if inner.disposed || inner.poll_id != poll_id {
      return false;
    }
    Self::spawn_fetch(self, &mut inner);
    true
  }

  fn restart_watcher(this: &Arc<Self>, inner: &mut Inner<F::Params>) {
    if let Some(handle) = inner.watcher_task.take() {
      handle.abort();
    }
    if !this.fetcher.follows_session(&inner.params) {
      return;
    }

    inner.session_key = session_key(&this.ctx);
    let mut rx = this.ctx.session.subscribe();
    rx.mark_unchanged();
    let weak: Weak<Self> = Arc::downgrade(this);

    let task = tokio::spawn(async move {
      while rx.changed().await.is_ok() {
        let key = {
          let state = rx.borrow_and_update();
          (state.address, state.chain_id)
        };
        let Some(shared) = weak.upgrade() else {
          break;
        };
        shared.on_session_change(key);
      }
    });
    inner.watcher_task = Some(task.abort_handle());
  }

  fn on_session_change(self: &Arc<Self>, key: SessionKey) {
    let mut inner = self.lock();
    if inner.disposed || inner.session_key == key {
      return;
    }
    debug!(module = F::NAME, ?key, "Session changed; re-running query");
    inner.session_key = key;
    Self::restart(self, &mut inner);
  }

  fn spawn_fetch(this: &Arc<Self>, inner: &mut Inner<F::Params>) {
    let generation = inner.generation;
    let params = inner.params.clone();
    inner.pending += 1;
    inner.in_flight.retain(|handle| !handle.is_finished());
    this.publish_flags(inner.pending);

    let shared = Arc::clone(this);
    let task = tokio::spawn(async move {
      let result = shared.fetcher.fetch(&shared.ctx, &params).await;
      shared.complete(generation, result);
    });
    inner.in_flight.push(task.abort_handle());
  }

  fn complete(&self, generation: u64, result: Result<Option<F::Output>, SessionError>) {
    let mut inner = self.lock();
    if inner.disposed || inner.generation != generation {
      debug!(module = F::NAME, generation, "Discarding stale result");
      return;
    }
    inner.pending = inner.pending.saturating_sub(1);
    self.ctx.record_fetch(F::NAME, result.is_ok());

    let keep_data = self.fetcher.keep_data_on_error();
    let pending = inner.pending;
    self.state.send_modify(|state| {
      match result {
        Ok(data) => {
          state.data = data;
          state.error = None;
          state.updated_at = Some(Utc::now());
        }
        Err(e) => {
          warn!(module = F::NAME, error = %e, "Fetch failed");
          if !keep_data {
            state.data = None;
          }
          state.error = Some(e);
        }
      }
      set_flags(state, pending);
    });
  }

  fn publish_flags(&self, pending: usize) {
    self.state.send_modify(|state| set_flags(state, pending));
  }
}

fn set_flags<T>(state: &mut QueryState<T>, pending: usize) {
  state.is_loading = pending > 0 && state.data.is_none();
  state.is_refetching = pending > 0 && state.data.is_some();
}

fn session_key(ctx: &SessionContext) -> SessionKey {
  let state = ctx.session.current_state();
  (state.address, state.chain_id)
}

/// Result record of a state-changing operation.
#[derive(Debug, Clone)]
pub struct MutationState<T> {
  pub data: Option<T>,
  pub error: Option<SessionError>,
  pub is_pending: bool,
}

impl<T> Default for MutationState<T> {
  fn default() -> Self {
    Self {
      data: None,
      error: None,
      is_pending: false,
    }
  }
}

impl<T> MutationState<T> {
  pub const fn is_success(&self) -> bool {
    self.data.is_some() && self.error.is_none()
  }

  pub const fn is_error(&self) -> bool {
    self.error.is_some()
  }
}

/// Tracks the latest invocation of a write/sign/send operation.
///
/// Only the most recently started run may write the record; earlier runs
/// still return their own result to their caller.
pub struct Mutation<T> {
  state: watch::Sender<MutationState<T>>,
  latest: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> Default for Mutation<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Clone + Send + Sync + 'static> Mutation<T> {
  pub fn new() -> Self {
    let (state, _) = watch::channel(MutationState::default());
    Self {
      state,
      latest: AtomicU64::new(0),
    }
  }

  /// Drive `operation`, recording its outcome if no newer run started.
  pub async fn run<Fut>(&self, operation: Fut) -> Result<T, SessionError>
  where
    Fut: Future<Output = Result<T, SessionError>>,
  {
    let id = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
    self.state.send_replace(MutationState {
      data: None,
      error: None,
      is_pending: true,
    });

    let mut guard = PendingGuard {
      mutation: self,
      id,
      armed: true,
    };
    let result = operation.await;
    guard.armed = false;

    if self.latest.load(Ordering::Acquire) == id {
      self.state.send_replace(MutationState {
        data: result.as_ref().ok().cloned(),
        error: result.as_ref().err().cloned(),
        is_pending: false,
      });
    } else {
      debug!(run = id, "Mutation superseded; result not recorded");
    }
    result
  }

  pub fn state(&self) -> MutationState<T> {
    self.state.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<MutationState<T>> {
    self.state.subscribe()
  }

  /// Clear the record. An in-flight run no longer writes to it.
  pub fn reset(&self) {
    self.latest.fetch_add(1, Ordering::AcqRel);
    self.state.send_replace(MutationState::default());
  }
}

/// Clears `is_pending` when a run is dropped before it completes.
struct PendingGuard<'a, T> {
  mutation: &'a Mutation<T>,
  id: u64,
  armed: bool,
}

impl<T> Drop for PendingGuard<'_, T> {
  fn drop(&mut self) {
    if self.armed && self.mutation.latest.load(Ordering::Acquire) == self.id {
      debug!(run = self.id, "Mutation dropped before completion");
      self.mutation.state.send_replace(MutationState::default());
    }
  }
}
