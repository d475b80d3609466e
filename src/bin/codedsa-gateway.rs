// ABOUTME: Server binary for the CodeDSA chat gateway
// ABOUTME: Loads configuration, initializes logging and serves until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! # CodeDSA Gateway Binary
//!
//! Starts the HTTP server behind the tutor chat widget.

use anyhow::Result;
use clap::Parser;
use codedsa_gateway::{config::environment::ServerConfig, logging, server::GatewayServer};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "codedsa-gateway")]
#[command(about = "CodeDSA chat gateway - quota-gated streaming proxy to the LLM tutor")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override bind address
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    logging::init_from_env()?;

    info!("Starting CodeDSA chat gateway");
    info!("{}", config.summary());

    let server = GatewayServer::build(config).await.map_err(|e| {
        error!("Failed to initialize gateway: {}", e);
        e
    })?;

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
