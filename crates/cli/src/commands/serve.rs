//! `sage serve`: Start the HTTP API server.

use super::load_config;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(host) = host_override {
        config.gateway.host = host;
    }
    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    config.validate()?;

    println!("{}", config.assistant.name);
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Backend:    {} ({})", config.completion.backend, config.completion.model);
    println!("   Knowledge:  {}", config.knowledge.dir.display());
    println!(
        "   Search:     {}",
        if config.search.enabled { "enabled" } else { "disabled" }
    );

    sage_gateway::start(config).await?;

    Ok(())
}
