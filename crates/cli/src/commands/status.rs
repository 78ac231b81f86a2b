//! `flowdesk status` — Show configuration summary.

use flowdesk_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🗂  Flowdesk Status");
    println!("=================");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!(
        "  Gateway:        {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("  Engine:         {}", config.engine.registry_url);
    println!("  Index:          {}", config.index.base_url);
    println!("  Directory:      {}", config.directory.base_url);
    println!("  Notifications:  {}", config.notifications.backend);
    println!(
        "  Database:       {}",
        config.notification_db_path().display()
    );

    // Check config file existence
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `flowdesk onboard` first");
    }

    Ok(())
}
