//! Signaling server listener
//!
//! Handles the TCP accept loop and spawns per-connection HTTP service
//! tasks. Each accepted socket speaks HTTP; connections that upgrade at the
//! WebSocket path become signaling endpoints, the rest are served the
//! read-only query routes.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::Http;
use hyper::service::service_fn;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::hub::ConnectionHub;
use crate::registry::{RegistryConfig, StreamRegistry};
use crate::relay::SignalingRelay;
use crate::server::config::ServerConfig;
use crate::server::http::{self, RequestContext};
use crate::stats::ServerStats;

/// WebRTC broadcast signaling server
pub struct SignalingServer {
    config: ServerConfig,
    hub: Arc<ConnectionHub>,
    registry: Arc<StreamRegistry>,
    relay: Arc<SignalingRelay>,
    stats: Arc<ServerStats>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl SignalingServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let hub = Arc::new(ConnectionHub::new());
        let registry = Arc::new(StreamRegistry::with_config(
            Arc::clone(&hub),
            registry_config,
        ));
        let relay = Arc::new(SignalingRelay::new(
            Arc::clone(&registry),
            Arc::clone(&hub),
        ));

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub,
            registry,
            relay,
            stats: Arc::new(ServerStats::new()),
            connection_semaphore,
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Get a reference to the connection hub
    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Run the accept loop on an already-bound listener
    ///
    /// Useful for binding to an ephemeral port and asking the listener for
    /// the actual address before serving.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "Signaling server listening");

        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(Arc::new(permit)),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
            }
        }

        tracing::debug!(peer = %peer_addr, "New connection");

        let ctx = RequestContext {
            config: self.config.clone(),
            hub: Arc::clone(&self.hub),
            registry: Arc::clone(&self.registry),
            relay: Arc::clone(&self.relay),
            stats: Arc::clone(&self.stats),
            _permit: permit,
        };

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let ctx = ctx.clone();
                async move { Ok::<_, std::convert::Infallible>(http::handle(req, ctx).await) }
            });

            let connection = Http::new()
                .serve_connection(socket, service)
                .with_upgrades();

            if let Err(e) = connection.await {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection error");
            }

            tracing::debug!(peer = %peer_addr, "Connection closed");
        });
    }
}
