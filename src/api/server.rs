//! API server lifecycle: starts and stops the axum HTTP server.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::core_state::CoreState;

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

/// Handle to a running API server.
pub struct ApiServer {
    pub info: ServerInfo,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub addr: SocketAddr,
    pub started_at: String,
}

impl ApiServer {
    pub fn addr(&self) -> SocketAddr {
        self.info.addr
    }

    /// Shut down the server gracefully.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind API server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Failed to get server address: {0}")]
    LocalAddr(std::io::Error),
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Start the API server on `addr` (port 0 picks an ephemeral port).
///
/// The router is served from a background tokio task until
/// `ApiServer::shutdown` is called or the handle is dropped.
pub async fn start_api_server(
    core: Arc<CoreState>,
    addr: SocketAddr,
) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let app = api_router(core);
    let info = ServerInfo {
        addr,
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        info,
        shutdown_tx: Some(shutdown_tx),
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DrugApiConfig;
    use crate::db;
    use crate::medications::DrugRegistryClient;
    use crate::models::AssessmentResult;
    use crate::pipeline::assessment::MockAssessor;

    fn test_core() -> Arc<CoreState> {
        let result: AssessmentResult =
            serde_json::from_value(serde_json::json!({"riskLevel": "low", "riskScore": 10})).unwrap();
        let drugs = DrugRegistryClient::new(DrugApiConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9".into(),
        })
        .unwrap();
        let conn = db::open_memory_database().unwrap();
        Arc::new(CoreState::new(conn, Arc::new(MockAssessor::returning(result)), drugs).unwrap())
    }

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let mut server = start_api_server(test_core(), loopback())
            .await
            .expect("server should start");
        assert!(server.addr().port() > 0);
        assert!(!server.info.started_at.is_empty());

        let url = format!("http://{}/api/health", server.addr());
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["model"], "mock");

        server.shutdown();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let mut server = start_api_server(test_core(), loopback()).await.unwrap();

        let url = format!("http://{}/nonexistent", server.addr());
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        server.shutdown();
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let mut first = start_api_server(test_core(), loopback()).await.unwrap();
        let err = start_api_server(test_core(), first.addr()).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
        first.shutdown();
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let mut server = start_api_server(test_core(), loopback()).await.unwrap();
        server.shutdown();
        server.shutdown();
    }
}
