//! API CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};
use stowage_rpc_server::DEFAULT_GRPC_PORT;

/// API configuration.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "API")]
#[serde(default)]
pub struct ApiArgs {
    /// Disable the gRPC API server.
    #[arg(long = "grpc.disable")]
    pub disable_grpc: bool,

    /// Address for the gRPC server to bind.
    #[arg(long = "grpc.addr", default_value = "127.0.0.1", value_name = "IP")]
    pub grpc_addr: String,

    /// Port for the gRPC server to bind.
    #[arg(long = "grpc.port", default_value_t = DEFAULT_GRPC_PORT, value_name = "PORT")]
    pub grpc_port: u16,
}

impl Default for ApiArgs {
    fn default() -> Self {
        Self {
            disable_grpc: false,
            grpc_addr: "127.0.0.1".to_owned(),
            grpc_port: DEFAULT_GRPC_PORT,
        }
    }
}
