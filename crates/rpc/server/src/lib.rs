//! gRPC server for stowage nodes.
//!
//! Exposes the deal API (client-streamed payload ingestion, market ask
//! listing and server-streamed deal watching) plus a health check service
//! and gRPC reflection for tools like grpcurl.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use stowage_rpc_server::{GrpcServer, GrpcServerConfig};
//!
//! let config = GrpcServerConfig { addr: "127.0.0.1:5002".parse()? };
//! let server = GrpcServer::with_config(config, Arc::new(engine));
//! server.start().await?;
//! ```

mod convert;
mod health;
mod ingest;
mod pipe;
mod relay;
mod service;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stowage_deals_api::DealEngine;
use tokio::sync::watch;
use tonic::transport::Server;
use tracing::{info, warn};

pub use health::HealthService;
pub use service::DealApiService;

// Re-export generated wire types.
pub mod proto {
    pub mod deals {
        tonic::include_proto!("stowage.deals.v1");
    }

    pub mod health {
        tonic::include_proto!("stowage.health.v1");
    }

    /// File descriptor set for gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("stowage_descriptor");
}

/// Default port the deal API listens on.
pub const DEFAULT_GRPC_PORT: u16 = 5002;

/// Configuration for the gRPC server.
#[derive(Debug, Clone)]
pub struct GrpcServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_GRPC_PORT)),
        }
    }
}

/// gRPC server for stowage nodes.
///
/// Serves the deal API backed by `E`, alongside health checks and
/// reflection. `start` runs until [`GrpcServer::stop`] is called or the
/// transport fails.
pub struct GrpcServer<E> {
    config: GrpcServerConfig,
    engine: Arc<E>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    running: AtomicBool,
}

impl<E: DealEngine> GrpcServer<E> {
    /// Create a server with the default configuration.
    pub fn new(engine: Arc<E>) -> Arc<Self> {
        Self::with_config(GrpcServerConfig::default(), engine)
    }

    /// Create a server with the given configuration.
    pub fn with_config(config: GrpcServerConfig, engine: Arc<E>) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Arc::new(Self {
            config,
            engine,
            shutdown_tx,
            shutdown_rx,
            running: AtomicBool::new(false),
        })
    }

    /// Start serving and accept connections until stopped.
    ///
    /// Runs until shutdown is signalled; call from a spawned task.
    pub async fn start(&self) -> eyre::Result<()> {
        let deal_service = DealApiService::new(self.engine.clone());
        let deal_server = proto::deals::deal_api_server::DealApiServer::new(deal_service);

        let health_server = proto::health::health_server::HealthServer::new(HealthService::serving());

        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
            .build_v1()?;

        info!(addr = %self.config.addr, "starting gRPC server");
        self.running.store(true, Ordering::SeqCst);

        let mut shutdown_rx = self.shutdown_rx.clone();
        let result = Server::builder()
            .add_service(deal_server)
            .add_service(health_server)
            .add_service(reflection_service)
            .serve_with_shutdown(self.config.addr, async move {
                shutdown_rx.changed().await.ok();
            })
            .await;

        self.running.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                info!("gRPC server stopped");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "gRPC server error");
                Err(err.into())
            }
        }
    }

    /// Signal the server to stop accepting connections and drain.
    pub async fn stop(&self) -> eyre::Result<()> {
        info!("stopping gRPC server");
        self.shutdown_tx.send(true)?;
        Ok(())
    }

    /// The address the server is configured to bind.
    pub fn address(&self) -> SocketAddr {
        self.config.addr
    }

    /// Whether the server is currently accepting connections.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
