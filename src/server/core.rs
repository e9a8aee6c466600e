use log::{error, info};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::server::routes::router;
use crate::storage::StorageGateway;

pub struct Server {
    listener: TcpListener,
    gateway: Arc<StorageGateway>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Opens the storage root and binds the listener.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let gateway = StorageGateway::new(config.storage_root_path(), config.transfer_limits())
            .await?
            .with_compression_suffix(config.compression_suffix.clone());

        let addr = config.socket_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!("Server bound to {}", addr);
                listener
            }
            Err(source) => {
                error!("Failed to bind to {}: {}", addr, source);
                return Err(ServerError::Bind { addr, source });
            }
        };

        Ok(Self {
            listener,
            gateway: Arc::new(gateway),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn gateway(&self) -> Arc<StorageGateway> {
        Arc::clone(&self.gateway)
    }

    /// Serves requests until Ctrl-C, then drains in-flight requests.
    pub async fn start(self) -> Result<(), ServerError> {
        self.start_with_shutdown(shutdown_signal()).await
    }

    /// Serves requests until `signal` resolves.
    pub async fn start_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(
            "Starting RAX upload server on {} (root {}, max {} MB per file)",
            self.local_addr()?,
            self.gateway.root().display(),
            self.config.max_file_size_mb
        );

        let app = router(Arc::clone(&self.gateway));
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
