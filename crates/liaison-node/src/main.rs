//! Liaison Node binary
//!
//! Runs one agent of the mesh; the role comes from `LIAISON_ROLE`.

use liaison_node::{AgentNode, NodeConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    liaison_logging::init("liaison=info");

    let config = NodeConfig::from_env();
    tracing::info!("Starting Liaison node");
    tracing::info!("  Name: {}", config.name);
    tracing::info!("  Role: {}", config.role);
    tracing::info!("  Listen: {}", config.listen);
    tracing::info!("  Directory: {}", config.directory);

    let node = AgentNode::bind(config).await?;
    node.run().await?;

    Ok(())
}
