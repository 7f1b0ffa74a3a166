use std::net::SocketAddr;

use anyhow::{Context, Result};

use diary_vector::config;
use diary_vector::initialization::initialize_services;
use diary_vector::server;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    log::info!("diary-vector server starting.");

    let config = config::load_config()?;
    log::info!("Configuration loaded: {:?}", config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let state = initialize_services(&config).await?;
    server::serve(state, addr).await.inspect_err(|e| {
        log::error!("serving error: {:?}", e);
    })?;

    log::info!("diary-vector server stopped.");
    Ok(())
}
