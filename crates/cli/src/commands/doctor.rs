//! `flowdesk doctor` — Diagnose config and collaborator health.

use std::time::Duration;

use flowdesk_config::AppConfig;
use flowdesk_core::directory::Directory;
use flowdesk_core::workflow::{InstanceIndex, ProcessEngine};
use flowdesk_engine::{DirectoryClient, EngineClient, IndexClient};

/// Per-probe timeout. Doctor should report a dead service quickly instead
/// of waiting out the full request timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Flowdesk Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid");
                config
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                println!("\n  ⚠️  1 issue found. Fix the config before probing services.");
                return Ok(());
            }
        }
    } else {
        println!("  ⚠️  No config file — probing defaults (run `flowdesk onboard`)");
        issues += 1;
        AppConfig::default()
    };

    // Probe the workflow engine registry
    let engine = EngineClient::with_timeout(config.engine.registry_url.clone(), PROBE_TIMEOUT);
    match engine.health_check().await {
        Ok(true) => println!("  ✅ Engine reachable: {}", config.engine.registry_url),
        Ok(false) => {
            println!(
                "  ⚠️  Engine responded with an error: {}",
                config.engine.registry_url
            );
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Engine unreachable: {e}");
            issues += 1;
        }
    }

    // Probe the instance index
    let index = IndexClient::with_timeout(config.index.base_url.clone(), PROBE_TIMEOUT);
    match index.health_check().await {
        Ok(true) => println!("  ✅ Index reachable: {}", config.index.base_url),
        Ok(false) => {
            println!(
                "  ⚠️  Index responded with an error: {}",
                config.index.base_url
            );
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Index unreachable: {e}");
            issues += 1;
        }
    }

    // Probe the user directory
    let directory = DirectoryClient::with_timeout(config.directory.base_url.clone(), PROBE_TIMEOUT);
    match directory.health_check().await {
        Ok(true) => println!("  ✅ Directory reachable: {}", config.directory.base_url),
        Ok(false) => {
            println!(
                "  ⚠️  Directory responded with an error: {}",
                config.directory.base_url
            );
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Directory unreachable: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
