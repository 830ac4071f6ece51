//! `factchat onboard`: first-time setup.

use super::CliResult;
use factchat_config::AppConfig;

pub async fn run() -> CliResult<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let defaults = AppConfig::default();

    println!("factchat, first-time setup");
    println!("==========================\n");

    for dir in [&config_dir, &defaults.storage.blob_dir] {
        if dir.exists() {
            println!("  Directory exists: {}", dir.display());
        } else {
            tokio::fs::create_dir_all(dir).await?;
            println!("  Created {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete it and re-run onboard.\n");
        return Ok(());
    }

    tokio::fs::write(&config_path, AppConfig::default_toml()).await?;
    println!("  Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. Set api_key in {} (or export OPENAI_API_KEY)", config_path.display());
    println!("   2. Set SERPAPI_API_KEY to enable web search");
    println!("   3. Run: factchat serve");
    println!("   4. In another terminal: factchat chat\n");

    Ok(())
}
