//! # Mesh Runtime
//!
//! Entry point for a mesh service: `RuntimeConfig::from_env()`, start the
//! plugin stack, run until Ctrl+C, stop the stack.

use anyhow::{Context, Result};
use tracing::info;

use mesh_runtime::{MeshRuntime, RuntimeConfig};
use mesh_telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();

    // Held until exit
    let _telemetry = init_telemetry(&config.telemetry).context("failed to initialize telemetry")?;

    let runtime = MeshRuntime::new(config).context("invalid runtime configuration")?;
    runtime.start().await.context("failed to start mesh runtime")?;

    if let Some(addr) = runtime.gateway_addr() {
        info!(addr = %addr, "Mesh runtime is running. Press Ctrl+C to stop.");
    }
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    runtime.shutdown().await.context("shutdown failed")?;
    Ok(())
}
