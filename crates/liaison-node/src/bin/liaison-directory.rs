//! Liaison Directory binary
//!
//! Serves the shared role directory on `LIAISON_DIRECTORY` (default
//! `127.0.0.1:7000`).

use liaison_protocols::{DirectoryServer, MemoryDirectory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    liaison_logging::init("liaison=info");

    let addr = std::env::var("LIAISON_DIRECTORY")
        .ok()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| "127.0.0.1:7000".to_string());

    let server = DirectoryServer::bind(MemoryDirectory::new(), &addr).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Directory shutting down"),
    }

    Ok(())
}
