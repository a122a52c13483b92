//! ServerBuilder: wires configuration, storage and collaborators into a
//! running server

use super::router::build_router;
use super::state::AppState;
use crate::config::AppConfig;
use crate::mail::Mailer;
use crate::payments::PaymentGateway;
use crate::storage::Storage;
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for the application server
///
/// # Example
///
/// ```ignore
/// let config = AppConfig::from_yaml_file("config/tourbook.yaml")?.apply_env()?;
/// ServerBuilder::new(config).serve().await?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    storage: Option<Storage>,
    mailer: Option<Arc<dyn Mailer>>,
    payments: Option<Arc<dyn PaymentGateway>>,
}

impl ServerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            storage: None,
            mailer: None,
            payments: None,
        }
    }

    /// Use `storage` instead of connecting to the configured backend
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = Some(payments);
        self
    }

    /// Connect storage (unless given) and assemble the shared state
    pub async fn build_state(self) -> Result<AppState> {
        let storage = match self.storage {
            Some(storage) => storage,
            None => Storage::connect(&self.config.database).await?,
        };

        let mut state = AppState::new(self.config, storage)?;
        if let Some(mailer) = self.mailer {
            state = state.with_mailer(mailer);
        }
        if let Some(payments) = self.payments {
            state = state.with_payments(payments);
        }
        Ok(state)
    }

    /// Build the final router
    pub async fn build(self) -> Result<Router> {
        Ok(build_router(self.build_state().await?))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the configured host and port
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.socket_addr()?;
        let environment = self.config.environment;
        let app = self.build().await?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(?environment, "Server listening on {}", addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MemoryMailer;

    #[tokio::test]
    async fn test_build_state_uses_given_collaborators() {
        let mailer = MemoryMailer::new();
        let state = ServerBuilder::new(AppConfig::default())
            .with_storage(Storage::in_memory())
            .with_mailer(Arc::new(mailer))
            .build_state()
            .await
            .unwrap();

        assert!(state.webhooks.is_none());
        assert_eq!(state.config.server.port, 3000);
    }

    #[tokio::test]
    async fn test_in_memory_backend_builds_router() {
        let router = ServerBuilder::new(AppConfig::default()).build().await;
        assert!(router.is_ok());
    }
}
