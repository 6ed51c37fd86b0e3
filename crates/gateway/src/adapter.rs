//! Entry point for gateway calls.
//!
//! [`GatewayAdapter::invoke`] bounds every call by the configured timeout,
//! (re)starts the interpreter process when a launcher is configured and
//! retries a call at most once after a connection failure.

use std::sync::Arc;
use std::time::Instant;

use pvscript_events::EventBus;

use crate::client::GatewayClient;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::launcher::ProcessLauncher;
use crate::messages::{InvokeRequest, InvokeResponse};
use crate::pool::ConnectionPool;

pub struct GatewayAdapter {
    config: GatewayConfig,
    pool: ConnectionPool,
    launcher: Option<ProcessLauncher>,
}

impl GatewayAdapter {
    /// Build an adapter. Nothing is connected or launched until the first call.
    pub fn new(config: GatewayConfig, events: Option<Arc<EventBus>>) -> Self {
        let pool = ConnectionPool::new(GatewayClient::new(&config.ws_url), config.pool_size, events);
        let launcher = config.command.as_deref().and_then(|command| {
            ProcessLauncher::new(command, config.python_path.clone(), config.startup_delay)
        });
        Self {
            config,
            pool,
            launcher,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Run one call against the gateway.
    ///
    /// Never waits longer than `call_timeout`, retry included.
    pub async fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, GatewayError> {
        let start = Instant::now();
        match tokio::time::timeout(self.config.call_timeout, self.invoke_with_retry(request)).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::error!(
                    call_id = %request.call_id,
                    script = %request.script_path,
                    elapsed_ms,
                    "Gateway call timed out",
                );
                Err(GatewayError::Timeout { elapsed_ms })
            }
        }
    }

    /// Close all connections and stop the interpreter process.
    pub async fn close(&self) {
        self.pool.close().await;
        if let Some(launcher) = &self.launcher {
            launcher.shutdown().await;
        }
        tracing::info!(url = %self.config.ws_url, "Gateway adapter closed");
    }

    async fn invoke_with_retry(&self, request: &InvokeRequest) -> Result<InvokeResponse, GatewayError> {
        self.ensure_process().await?;

        match self.pool.call(request).await {
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    call_id = %request.call_id,
                    script = %request.script_path,
                    error = %e,
                    "Gateway call failed, retrying once",
                );
                self.ensure_process().await?;
                self.pool.call(request).await
            }
            other => other,
        }
    }

    async fn ensure_process(&self) -> Result<(), GatewayError> {
        if let Some(launcher) = &self.launcher {
            launcher.ensure_running().await?;
        }
        Ok(())
    }
}
