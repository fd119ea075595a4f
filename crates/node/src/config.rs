//! Figment-based configuration loading.
//!
//! Configuration priority (highest wins):
//! 1. CLI arguments (applied after Figment load)
//! 2. Config file (TOML)
//! 3. Environment variables (`STOWAGE_` prefix)
//! 4. Defaults

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use eyre::{Result, WrapErr};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::args::ApiArgs;

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// API configuration.
    pub api: ApiArgs,
}

impl NodeConfig {
    /// Load configuration from defaults, environment, and config file.
    /// CLI overrides should be applied separately after loading.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(NodeConfig::default()))
            .merge(Env::prefixed("STOWAGE_").split("_"));

        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment.extract().wrap_err("failed to load configuration")
    }

    /// Get the gRPC server socket address.
    pub fn grpc_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.api
                .grpc_addr
                .parse()
                .unwrap_or(IpAddr::from([127, 0, 0, 1])),
            self.api.grpc_port,
        )
    }
}
