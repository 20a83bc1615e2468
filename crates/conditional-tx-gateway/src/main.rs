//! # Conditional Transaction Gateway
//!
//! Startup sequence:
//!
//! 1. Parse flags and environment, load the optional config file
//! 2. Initialize logging
//! 3. Build the backend client and the admission pipeline
//! 4. Serve until Ctrl+C, then cancel pending admissions and drain

use anyhow::{Context, Result};
use clap::Parser;
use conditional_tx_gateway::cli::Args;
use conditional_tx_gateway::{ConditionalGatewayService, RpcBackend};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json)?;

    let config = args.load_config().context("invalid configuration")?;

    if !config.conditional.enabled {
        warn!("eth_sendRawTransactionConditional is disabled; all submissions will be rejected");
    }

    // The client is lazy, so a disabled endpoint with no backend still starts
    let backend_url = if config.conditional.backend_url.is_empty() {
        "http://127.0.0.1:8545".to_string()
    } else {
        config.conditional.backend_url.clone()
    };
    let backend = RpcBackend::connect(&backend_url, config.backend.request_timeout)
        .with_context(|| format!("failed to dial backend {}", backend_url))?;

    let service = Arc::new(
        ConditionalGatewayService::new(config, Arc::new(backend))
            .context("unable to start conditional gateway")?,
    );

    let mut server = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.start().await })
    };

    info!("Gateway is running. Press Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            info!("Received shutdown signal");

            // Graceful shutdown
            service.shutdown();
            server.await.context("server task panicked")??;
        }
        result = &mut server => {
            result.context("server task panicked")??;
        }
    }

    Ok(())
}
