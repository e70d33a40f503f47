//! Intake API server lifecycle.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::router::intake_router;
use crate::api::types::ApiContext;

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind intake API server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Failed to get server address: {0}")]
    LocalAddr(std::io::Error),
}

/// Session metadata for a running intake server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSession {
    pub session_id: String,
    pub server_addr: String,
    pub port: u16,
    pub started_at: String,
}

/// Handle to a running intake API server.
pub struct IntakeServer {
    pub session: ServerSession,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl IntakeServer {
    /// Shut down the server gracefully.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Intake API server shutdown signal sent");
        }
    }

    /// Wait for the serving task to finish (after `shutdown`).
    pub async fn stopped(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Intake API server task ended abnormally");
            }
        }
    }

    pub fn local_addr(&self) -> String {
        self.session.server_addr.clone()
    }
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Bind `addr` (port 0 for ephemeral) and serve the intake router in a
/// background task.
pub async fn start_server(ctx: ApiContext, addr: SocketAddr) -> Result<IntakeServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
    tracing::info!(%addr, "Intake API server binding");

    let app = intake_router(ctx);

    let session = ServerSession {
        session_id: Uuid::new_v4().to_string(),
        server_addr: addr.to_string(),
        port: addr.port(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Intake API server received shutdown signal");
        };

        tracing::info!(%addr, "Intake API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Intake API server error: {e}");
        }

        tracing::info!("Intake API server stopped");
    });

    Ok(IntakeServer {
        session,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
