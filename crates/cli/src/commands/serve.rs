//! `flowdesk serve` — Start the HTTP API gateway.

use flowdesk_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🗂  Flowdesk Gateway");
    println!(
        "   Listening:  {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("   Engine:     {}", config.engine.registry_url);
    println!("   Index:      {}", config.index.base_url);
    println!("   Directory:  {}", config.directory.base_url);

    flowdesk_gateway::start(config).await?;

    Ok(())
}
