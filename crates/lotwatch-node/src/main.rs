//! Lotwatch Node binary
//!
//! Serves the lot registry of one subdivision over the local admin socket.

use lotwatch_node::{LotwatchNode, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lotwatch_node=info,lotwatch_registry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lotwatch Node");

    let config = NodeConfig::from_env();

    let node = LotwatchNode::new(config).await?;
    node.run().await?;

    Ok(())
}
