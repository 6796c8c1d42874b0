//! Wallet Session Service - Entry Point
//!
//! Wires the session layer against the configured wallet relay and
//! public RPC endpoints, then keeps a gas price watch running until
//! SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from argv[1]) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build chain registry, RPC factory and relay SDK
//! 4. Spawn metrics (:9090) and health (:8080) servers
//! 5. Auto-initialize the session (and connect if configured)
//! 6. Watch gas price and log session changes
//! 7. Wait for SIGINT → finalize session → stop servers

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use wallet_session::adapters::chain::AlloyRpcFactory;
use wallet_session::adapters::metrics::{HealthServer, SessionMetrics};
use wallet_session::adapters::wallet::RelaySdk;
use wallet_session::config;
use wallet_session::ports::SessionObserver;
use wallet_session::usecases::account::AccountView;
use wallet_session::usecases::gas_price::{watch_gas_price, GasPriceParams};
use wallet_session::usecases::{SessionContext, SessionManager};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        chains = config.chains.len(),
        default_chain = config.session.default_chain_id,
        "Starting wallet session service"
    );

    // ── 3. Build registry, RPC factory and provider SDK ─────
    let registry = Arc::new(
        config
            .chain_registry()
            .context("Invalid chain table")?,
    );
    let rpc = Arc::new(AlloyRpcFactory::new(Arc::clone(&registry)));
    let sdk = Arc::new(
        RelaySdk::new(config.relay_config()).context("Failed to create relay client")?,
    );

    let metrics = Arc::new(SessionMetrics::new().context("Failed to register metrics")?);
    let observer: Arc<dyn SessionObserver> = metrics.clone();
    let session = Arc::new(
        SessionManager::new(sdk, Arc::clone(&registry), config.session_options())
            .with_metrics(Arc::clone(&observer)),
    );
    let ctx = SessionContext::new(Arc::clone(&session), rpc)
        .with_polling(config.polling_intervals())
        .with_metrics(observer);

    // ── 4. Spawn metrics and health servers ─────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let mut server_handles = Vec::new();
    if config.metrics.enabled {
        let metrics_shutdown = shutdown_tx.subscribe();
        let bind = config.metrics.bind_address.clone();
        let metrics_ref = Arc::clone(&metrics);
        server_handles.push(tokio::spawn(async move {
            if let Err(e) = metrics_ref.serve(bind, metrics_shutdown).await {
                error!(error = %e, "Metrics server failed");
            }
        }));

        let health = HealthServer::new(session.subscribe(), config.metrics.health_port);
        let health_shutdown = shutdown_tx.subscribe();
        server_handles.push(tokio::spawn(async move {
            if let Err(e) = health.run(health_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        }));
    }

    // ── 5. Initialize (and optionally connect) ──────────────
    session.auto_initialize().await;
    if config.session.auto_connect && session.status().is_initialized() {
        match session.connect().await {
            Ok(address) => info!(%address, "Auto-connect succeeded"),
            Err(e) => warn!(error = %e, "Auto-connect failed"),
        }
    }

    // ── 6. Gas price watch + session log ────────────────────
    let gas = watch_gas_price(&ctx, GasPriceParams::default());
    let mut gas_rx = gas.subscribe();
    let mut account = AccountView::new(&ctx);

    info!("Session service running");

    // ── 7. Run until SIGINT ─────────────────────────────────
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("SIGINT received, initiating graceful shutdown");
                break;
            }
            changed = gas_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = gas_rx.borrow_and_update().clone();
                match (&state.data, &state.error) {
                    (Some(price), _) => info!(gwei = price.gwei(), source = ?price.source, "Gas price"),
                    (None, Some(e)) => warn!(error = %e, "Gas price unavailable"),
                    _ => {}
                }
            }
            Some(current) = account.changed() => {
                info!(
                    status = %current.status,
                    address = ?current.address,
                    chain_id = ?current.chain_id,
                    "Session changed"
                );
            }
        }
    }

    // ── Graceful shutdown ───────────────────────────────────
    gas.dispose();
    if let Err(e) = session.finalize().await {
        warn!(error = %e, "Session finalize failed");
    }

    let _ = shutdown_tx.send(());
    for handle in server_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}
