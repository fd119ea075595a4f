//! Stowage storage-deal node binary.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    stowage_node::run().await
}
