//! Prometheus Metrics Registry - Session Observability
//!
//! Registers and exposes Prometheus metrics on :9090. Covers session
//! lifecycle transitions, connection status, the active chain, derived
//! query outcomes and the last observed gas price.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{Encoder, Gauge, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::domain::chain::ChainId;
use crate::ports::metrics::SessionObserver;

/// Centralized Prometheus metrics for the session layer.
///
/// All metrics follow the naming convention `wallet_session_*`.
pub struct SessionMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Lifecycle transitions by event (`initialized`, `connected`, ...).
    pub transitions: IntCounterVec,
    /// Connection status (1 = connected, 0 = not connected).
    pub connected: IntGauge,
    /// Chain id of the active session (0 when none).
    pub active_chain_id: IntGauge,
    /// Derived-module fetches by module and outcome.
    pub query_fetches: IntCounterVec,
    /// Last gas price reading (gwei).
    pub gas_price_gwei: Gauge,
}

impl SessionMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transitions = IntCounterVec::new(
            Opts::new(
                "wallet_session_transitions_total",
                "Session lifecycle transitions",
            ),
            &["event"],
        )?;

        let connected = IntGauge::new(
            "wallet_session_connected",
            "Session connection status (1=connected, 0=not connected)",
        )?;

        let active_chain_id = IntGauge::new(
            "wallet_session_active_chain_id",
            "Chain id of the active session (0 when none)",
        )?;

        let query_fetches = IntCounterVec::new(
            Opts::new(
                "wallet_session_query_fetches_total",
                "Derived query fetches by module and outcome",
            ),
            &["module", "outcome"],
        )?;

        let gas_price_gwei = Gauge::new(
            "wallet_session_gas_price_gwei",
            "Last observed gas price in gwei",
        )?;

        registry.register(Box::new(transitions.clone()))?;
        registry.register(Box::new(connected.clone()))?;
        registry.register(Box::new(active_chain_id.clone()))?;
        registry.register(Box::new(query_fetches.clone()))?;
        registry.register(Box::new(gas_price_gwei.clone()))?;

        Ok(Self {
            registry,
            transitions,
            connected,
            active_chain_id,
            query_fetches,
            gas_price_gwei,
        })
    }

    /// Render the registry in the text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => {
                            warn!(error = %e, "Failed to encode metrics");
                            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

impl SessionObserver for SessionMetrics {
    fn record_transition(&self, event: &str) {
        self.transitions.with_label_values(&[event]).inc();
    }

    fn observe_session(&self, connected: bool, chain_id: Option<ChainId>) {
        self.connected.set(i64::from(connected));
        self.active_chain_id
            .set(chain_id.and_then(|id| i64::try_from(id).ok()).unwrap_or(0));
    }

    fn record_fetch(&self, module: &str, ok: bool) {
        let outcome = if ok { "success" } else { "error" };
        self.query_fetches
            .with_label_values(&[module, outcome])
            .inc();
    }

    fn observe_gas_price(&self, gwei: f64) {
        self.gas_price_gwei.set(gwei);
    }
}
