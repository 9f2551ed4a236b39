//! MCP over stdin/stdout.

use crate::error::{DbError, DbResult};
use crate::transport::{ServiceSettings, Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

/// Serves a single client that spawned the process. The client gets one
/// transaction session for the life of the process.
pub struct StdioTransport {
    settings: ServiceSettings,
}

impl StdioTransport {
    pub fn new(settings: ServiceSettings) -> Self {
        Self { settings }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!(transport = self.name(), "Serving MCP");

        let service = self.settings.new_service();
        // The clone shares the session, so it can roll back after the client leaves
        let running = service
            .clone()
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Could not start stdio transport: {}", e)))?;

        let outcome = tokio::select! {
            result = running.waiting() => result
                .map(|reason| info!(reason = ?reason, "Client disconnected"))
                .map_err(|e| DbError::internal(format!("Stdio transport failed: {}", e))),
            _ = wait_for_signal() => {
                // A second signal skips the cleanup below
                tokio::spawn(async {
                    wait_for_signal().await;
                    warn!("Second signal, exiting without cleanup");
                    std::process::exit(1);
                });

                service.shutdown().await;
                self.settings.pool.close().await;
                // The blocking stdin read would otherwise keep the runtime alive
                std::process::exit(0);
            }
        };

        if let Err(e) = &outcome {
            warn!(error = %e, "Stdio transport stopped with an error");
        }
        service.shutdown().await;
        info!("Closing database connections");
        self.settings.pool.close().await;
        outcome
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
