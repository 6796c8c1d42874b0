//! Integration Tests - Session Lifecycle
//!
//! Drives the session manager through init, connect, switch, disconnect
//! and teardown against a scripted provider SDK and mockall mocks.

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use mockall::Sequence;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

use wallet_session::domain::chain::ChainId;
use wallet_session::domain::error::SessionError;
use wallet_session::domain::session::SessionStatus;
use wallet_session::domain::transaction::TransactionRequest;
use wallet_session::usecases::account::AccountView;
use wallet_session::usecases::transaction::send_transaction;
use wallet_session::ports::SessionObserver;
use wallet_session::usecases::gas_price::{watch_gas_price, GasPriceParams};
use wallet_session::usecases::{SessionManager, SessionOptions};

use common::*;

#[tokio::test]
async fn test_concurrent_initialize_runs_one_handshake() {
    let mut sdk = MockSdk::new();
    sdk.expect_init().times(1).returning(|| Ok(()));
    let session = session_with(Arc::new(sdk), SessionOptions::default());

    let (a, b, c) = tokio::join!(
        session.initialize(),
        session.initialize(),
        session.initialize()
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    session.initialize().await.unwrap();
    session.auto_initialize().await;

    assert_eq!(session.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn test_failed_initialize_can_be_retried() {
    let mut sdk = MockSdk::new();
    let mut seq = Sequence::new();
    sdk.expect_init()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Err(anyhow::anyhow!("relay unreachable")));
    sdk.expect_init()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    let session = session_with(Arc::new(sdk), SessionOptions::default());

    // The passive trigger swallows the failure.
    session.auto_initialize().await;
    assert_eq!(session.status(), SessionStatus::Uninitialized);

    session.initialize().await.unwrap();
    assert!(session.status().is_initialized());
}

#[tokio::test]
async fn test_connect_before_initialize_fails() {
    let (_, session) = fake_session();
    assert_eq!(session.connect().await, Err(SessionError::NotInitialized));
    assert_eq!(session.switch_chain(137).await, Err(SessionError::NotInitialized));
}

#[tokio::test]
async fn test_connect_defaults_then_switch_redirects_send() {
    let (sdk, session) = fake_session();
    let ctx = context(Arc::clone(&session), unused_factory());
    session.initialize().await.unwrap();

    let address = assert_ok!(session.connect().await);
    assert_eq!(address, ALICE);
    assert_eq!(session.current_chain_id(), Some(1));

    assert_ok!(session.switch_chain(137).await);

    // Read synchronously, no intervening render.
    assert_eq!(session.current_chain_id(), Some(137));
    assert_eq!(session.current_network_provider().unwrap().chain_id(), 137);

    send_transaction(&ctx, TransactionRequest::default().to(BOB))
        .await
        .unwrap();

    let sends = sdk.requests("eth_sendTransaction");
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].chain_id, 137);
}

#[tokio::test]
async fn test_unsupported_switch_leaves_state_unchanged() {
    let (_, session) = fake_session();
    session.initialize().await.unwrap();
    session.connect().await.unwrap();
    let before = session.current_state().snapshot();

    assert_eq!(
        session.switch_chain(999).await,
        Err(SessionError::UnsupportedChain(999))
    );

    assert_eq!(session.current_state().snapshot(), before);
    assert_eq!(session.projection().snapshot(), before);
}

#[tokio::test]
async fn test_failed_switch_keeps_previous_chain() {
    let (sdk, session) = fake_session();
    session.initialize().await.unwrap();
    session.connect().await.unwrap();
    sdk.failing_chains.lock().unwrap().push(137);

    let err = assert_err!(session.switch_chain(137).await);
    assert!(matches!(err, SessionError::Transport(_)));
    assert_eq!(session.current_chain_id(), Some(1));
    assert_eq!(session.current_network_provider().unwrap().chain_id(), 1);
    assert_eq!(session.status(), SessionStatus::Connected);
}

#[tokio::test]
async fn test_connect_with_no_accounts_stays_disconnected() {
    let (sdk, session) = fake_session();
    sdk.script(|s| s.default_accounts.clear());
    session.initialize().await.unwrap();

    assert_eq!(session.connect().await, Err(SessionError::NoAccounts));
    assert_eq!(session.status(), SessionStatus::Ready);
    assert!(session.current_address().is_none());
    assert!(session.current_network_provider().is_none());
}

#[tokio::test]
async fn test_connect_provider_failure_stays_disconnected() {
    let mut sdk = MockSdk::new();
    sdk.expect_init().returning(|| Ok(()));
    sdk.expect_provider_for_network().returning(|_| {
        Err(anyhow::anyhow!("user closed the login window"))
    });
    let session = session_with(Arc::new(sdk), SessionOptions::default());
    session.initialize().await.unwrap();

    let err = session.connect().await.unwrap_err();
    assert!(err.to_string().contains("login window"));
    assert!(!session.status().is_connected());
}

#[tokio::test]
async fn test_switch_before_connect_sets_connect_target() {
    let (sdk, session) = fake_session();
    session.initialize().await.unwrap();

    session.switch_chain(137).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Ready);
    assert_eq!(session.current_chain_id(), Some(137));

    session.connect().await.unwrap();
    assert_eq!(session.current_chain_id(), Some(137));
    let prompts = sdk.requests("eth_requestAccounts");
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].chain_id, 137);
}

#[tokio::test]
async fn test_connect_when_connected_is_idempotent() {
    let (sdk, session) = fake_session();
    session.initialize().await.unwrap();
    session.connect().await.unwrap();
    assert_eq!(session.connect().await, Ok(ALICE));
    assert_eq!(sdk.requests("eth_requestAccounts").len(), 1);
}

#[tokio::test]
async fn test_switch_requeries_per_network_address() {
    let (sdk, session) = fake_session();
    sdk.script(|s| {
        s.accounts.insert(137, vec![BOB]);
    });
    session.initialize().await.unwrap();
    session.connect().await.unwrap();

    session.switch_chain(137).await.unwrap();
    assert_eq!(session.current_address(), Some(BOB));
    assert_eq!(sdk.requests("eth_accounts").len(), 1);
}

#[tokio::test]
async fn test_switch_requery_failure_keeps_address() {
    let (sdk, session) = fake_session();
    sdk.script(|s| s.fail_account_requery = true);
    session.initialize().await.unwrap();
    session.connect().await.unwrap();

    session.switch_chain(137).await.unwrap();
    assert_eq!(session.current_chain_id(), Some(137));
    assert_eq!(session.current_address(), Some(ALICE));
}

#[tokio::test]
async fn test_switch_without_requery_option() {
    let sdk = Arc::new(FakeSdk::new());
    let session = session_with(
        sdk.clone(),
        SessionOptions {
            requery_accounts_on_switch: false,
        },
    );
    session.initialize().await.unwrap();
    session.connect().await.unwrap();
    session.switch_chain(137).await.unwrap();
    assert!(sdk.requests("eth_accounts").is_empty());
}

#[tokio::test]
async fn test_disconnect_clears_cell_and_projection() {
    let (sdk, session) = fake_session();
    session.initialize().await.unwrap();
    session.connect().await.unwrap();
    let mut rx = session.subscribe();

    session.disconnect().await.unwrap();

    assert_eq!(session.status(), SessionStatus::Ready);
    assert!(session.current_address().is_none());
    assert!(session.current_chain_id().is_none());
    assert!(session.current_network_provider().is_none());
    assert!(rx.has_changed().unwrap());
    assert!(!rx.borrow_and_update().is_connected());
    assert_eq!(sdk.logouts.load(Ordering::SeqCst), 1);

    // A second disconnect has nothing to log out.
    session.disconnect().await.unwrap();
    assert_eq!(sdk.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_disconnect_during_connect_supersedes_it() {
    let (sdk, session) = fake_session();
    let gate = Arc::new(Notify::new());
    *sdk.gate.lock().unwrap() = Some(Arc::clone(&gate));
    session.initialize().await.unwrap();

    let connecting = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.connect().await }
    });

    let mut rx = session.subscribe();
    rx.wait_for(|s| s.status == SessionStatus::Connecting)
        .await
        .unwrap();

    session.disconnect().await.unwrap();
    gate.notify_one();

    assert_eq!(connecting.await.unwrap(), Err(SessionError::Superseded));
    assert!(!session.status().is_connected());
    assert!(session.current_address().is_none());
}

#[tokio::test]
async fn test_finalize_releases_and_blocks_everything() {
    let (sdk, session) = fake_session();
    session.initialize().await.unwrap();
    session.connect().await.unwrap();

    session.finalize().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Finalized);
    assert!(session.current_network_provider().is_none());
    assert_eq!(sdk.finalizes.load(Ordering::SeqCst), 1);

    assert_eq!(session.connect().await, Err(SessionError::Finalized));
    assert_eq!(session.disconnect().await, Err(SessionError::Finalized));
    assert_eq!(session.connected().err(), Some(SessionError::Finalized));
}

#[tokio::test]
async fn test_projection_matches_cell_after_every_step() {
    let (_, session) = fake_session();
    session.initialize().await.unwrap();
    session.connect().await.unwrap();
    session.switch_chain(137).await.unwrap();
    session.switch_chain(1).await.unwrap();

    let cell = session.current_state();
    let projection = session.projection();
    assert_eq!(cell.snapshot(), projection.snapshot());
    assert_eq!(projection.chain_id, Some(1));
}

#[tokio::test]
async fn test_account_view_follows_projection() {
    let (_, session) = fake_session();
    let ctx = context(Arc::clone(&session), unused_factory());
    let mut view = AccountView::new(&ctx);
    assert!(!view.current().is_connected);

    session.initialize().await.unwrap();
    session.connect().await.unwrap();

    let mut account = view.current();
    while !account.is_connected {
        account = view.changed().await.unwrap();
    }
    assert_eq!(account.address, Some(ALICE));
    assert_eq!(account.chain_id, Some(1));
    assert!(!account.is_connecting);
    assert_eq!(
        account.explorer_url.as_deref(),
        Some(format!("https://explorer.example/1/address/{ALICE}").as_str())
    );
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
    session: Mutex<Option<(bool, Option<ChainId>)>>,
    fetches: Mutex<Vec<(String, bool)>>,
    gas_gwei: Mutex<Option<f64>>,
}

impl SessionObserver for RecordingObserver {
    fn record_transition(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }

    fn observe_session(&self, connected: bool, chain_id: Option<ChainId>) {
        *self.session.lock().unwrap() = Some((connected, chain_id));
    }

    fn record_fetch(&self, module: &str, ok: bool) {
        self.fetches.lock().unwrap().push((module.to_string(), ok));
    }

    fn observe_gas_price(&self, gwei: f64) {
        *self.gas_gwei.lock().unwrap() = Some(gwei);
    }
}

#[tokio::test]
async fn test_observer_receives_lifecycle_and_fetches() {
    let sdk = Arc::new(FakeSdk::new());
    let observer = Arc::new(RecordingObserver::default());
    let session = Arc::new(
        SessionManager::new(sdk, registry(), SessionOptions::default())
            .with_metrics(observer.clone()),
    );
    let ctx = context(Arc::clone(&session), unused_factory()).with_metrics(observer.clone());

    session.initialize().await.unwrap();
    session.connect().await.unwrap();
    session.switch_chain(137).await.unwrap();

    assert_eq!(
        *observer.events.lock().unwrap(),
        vec!["initialized", "connected", "chain_switched"]
    );
    assert_eq!(*observer.session.lock().unwrap(), Some((true, Some(137))));

    let gas = watch_gas_price(
        &ctx,
        GasPriceParams {
            chain_id: None,
            watch: false,
        },
    );
    assert!(gas.settled().await.is_success());
    assert_eq!(*observer.gas_gwei.lock().unwrap(), Some(30.0));
    assert_eq!(
        *observer.fetches.lock().unwrap(),
        vec![("gas_price".to_string(), true)]
    );
}
