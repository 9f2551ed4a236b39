//! MCP over streamable HTTP.

use crate::error::{DbError, DbResult};
use crate::transport::{ServiceSettings, Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// How long open streams may hold up shutdown after the first signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Serves any number of clients. Each MCP session gets its own
/// [`SqlGateService`](crate::mcp::SqlGateService), so transactions never
/// leak between clients; all sessions draw on one pool.
pub struct HttpTransport {
    settings: ServiceSettings,
    bind_addr: String,
    endpoint: String,
}

impl HttpTransport {
    /// `endpoint` is the path the service is mounted at, `/` for the root.
    pub fn new(
        settings: ServiceSettings,
        bind_addr: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            bind_addr: bind_addr.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn router(&self) -> axum::Router {
        let settings = self.settings.clone();
        let service = StreamableHttpService::new(
            move || Ok(settings.new_service()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/"
        match self.endpoint.as_str() {
            "/" => axum::Router::new().fallback_service(service),
            path => axum::Router::new().nest_service(path, service),
        }
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let listener = TcpListener::bind(&self.bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", self.bind_addr, e),
                "Check that the address is valid and the port is free",
            )
        })?;
        info!(
            transport = self.name(),
            addr = %self.bind_addr,
            endpoint = %self.endpoint,
            "Serving MCP"
        );

        let (signalled_tx, signalled_rx) = oneshot::channel();
        let server = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            wait_for_signal().await;
            let _ = signalled_tx.send(());
        });

        let outcome = tokio::select! {
            result = server => result
                .map_err(|e| DbError::internal(format!("HTTP server error: {}", e))),
            _ = drain_deadline(signalled_rx) => Ok(()),
        };

        match &outcome {
            Ok(()) => info!("HTTP server stopped"),
            Err(e) => warn!(error = %e, "HTTP server stopped with an error"),
        }
        // Sessions still inside a transaction lose their connection here
        info!("Closing database connections");
        self.settings.pool.close().await;
        outcome
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Completes once streams have had [`DRAIN_TIMEOUT`] to finish after the
/// first signal, or on a second signal. Never completes if the server stops
/// on its own.
async fn drain_deadline(signalled: oneshot::Receiver<()>) {
    if signalled.await.is_err() {
        return std::future::pending().await;
    }
    info!(
        timeout_secs = DRAIN_TIMEOUT.as_secs(),
        "Waiting for open streams (signal again to stop now)"
    );
    tokio::select! {
        _ = tokio::time::sleep(DRAIN_TIMEOUT) => warn!("Drain timeout reached, stopping"),
        _ = wait_for_signal() => warn!("Second signal, stopping now"),
    }
}
