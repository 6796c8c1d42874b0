//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live, /ready and /session endpoints via axum 0.7. Readiness
//! follows the session's reactive projection: ready once the provider
//! SDK is initialized, unavailable before that and after teardown.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};

use crate::domain::session::SessionSnapshot;
use crate::usecases::session_manager::SessionState;

/// Axum-based health check HTTP server.
pub struct HealthServer {
    /// Reactive view of the session.
    session: watch::Receiver<SessionState>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(session: watch::Receiver<SessionState>, port: u16) -> Self {
        Self { session, port }
    }

    /// Start the health check server.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = router(self.session);

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

fn router(session: watch::Receiver<SessionState>) -> Router {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/session", get(session_summary))
        .with_state(session)
}

fn is_ready(snapshot: &SessionSnapshot) -> bool {
    snapshot.status.is_initialized()
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: 200 once initialized, 503 otherwise.
async fn readiness(State(session): State<watch::Receiver<SessionState>>) -> impl IntoResponse {
    if is_ready(&session.borrow().snapshot()) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn session_summary(
    State(session): State<watch::Receiver<SessionState>>,
) -> Json<SessionSnapshot> {
    Json(session.borrow().snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionStatus;

    #[test]
    fn test_readiness_follows_status() {
        let mut snapshot = SessionSnapshot::default();
        assert!(!is_ready(&snapshot));
        snapshot.status = SessionStatus::Ready;
        assert!(is_ready(&snapshot));
        snapshot.status = SessionStatus::Connected;
        assert!(is_ready(&snapshot));
        snapshot.status = SessionStatus::Finalized;
        assert!(!is_ready(&snapshot));
    }

    #[tokio::test]
    async fn test_session_summary_reflects_projection() {
        let (tx, rx) = watch::channel(SessionState::default());
        tx.send_modify(|s| {
            s.status = SessionStatus::Ready;
            s.revision = 3;
        });
        let Json(snapshot) = session_summary(State(rx)).await;
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert_eq!(snapshot.revision, 3);
    }
}
