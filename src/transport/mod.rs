//! Transports that carry MCP traffic to [`SqlGateService`] instances.
//!
//! - `stdio`: one client over stdin/stdout, one transaction session
//! - `http`: streamable HTTP, one transaction session per MCP session

pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::db::SqlxPool;
use crate::error::DbResult;
use crate::mcp::SqlGateService;
use crate::tools::guard::SecurityPolicy;
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Runs an MCP server until the client goes away or the process is told to
/// stop.
pub trait Transport: Send + Sync {
    fn run(&self) -> impl Future<Output = DbResult<()>> + Send;

    fn name(&self) -> &'static str;
}

/// What every transport needs to build a service: the shared pool and the
/// settings each session is created with.
#[derive(Clone)]
pub struct ServiceSettings {
    pub pool: Arc<SqlxPool>,
    pub policy: SecurityPolicy,
    pub query_timeout_secs: u32,
}

impl ServiceSettings {
    pub fn new(pool: Arc<SqlxPool>, policy: SecurityPolicy, query_timeout_secs: u32) -> Self {
        Self {
            pool,
            policy,
            query_timeout_secs,
        }
    }

    /// A service with a fresh transaction session.
    pub fn new_service(&self) -> SqlGateService {
        SqlGateService::new(self.pool.clone(), self.policy, self.query_timeout_secs)
    }
}

/// Resolves on SIGINT or SIGTERM. A handler that cannot be installed never
/// fires.
pub(crate) async fn wait_for_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!(signal = "SIGINT", "Shutdown requested"),
        _ = terminate => info!(signal = "SIGTERM", "Shutdown requested"),
    }
}
