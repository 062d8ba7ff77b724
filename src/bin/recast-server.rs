// ABOUTME: Recast API server binary: loads configuration, opens the database and serves HTTP
// ABOUTME: Runs until Ctrl-C, sweeping expired OAuth states in the background
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Recast Server Binary
//!
//! Starts the content repurposing REST API with JWT authentication, encrypted
//! key storage and the optional Twitter, Paddle, crypto and Cloudinary integrations.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use recast_server::config::environment::ServerConfig;
use recast_server::crypto::SecretCipher;
use recast_server::database::Database;
use recast_server::logging;
use recast_server::resources::ServerResources;
use recast_server::server;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "recast-server")]
#[command(about = "Recast - turn long-form content into threads, posts and summaries")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;
    info!("Starting Recast API");
    info!("{}", config.summary());

    let cipher = SecretCipher::new(*config.security.encryption_key);
    let database = Database::new(&config.database.url, cipher).await?;
    info!("Database initialized: {}", config.database.url);

    let port = config.http_port;
    let resources = Arc::new(ServerResources::new(config, database)?);

    if let Err(e) = server::run(resources, port).await {
        error!("Server error: {e}");
        return Err(e.into());
    }

    info!("Recast API stopped");
    Ok(())
}
