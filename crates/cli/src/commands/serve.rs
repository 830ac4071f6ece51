//! `factchat serve`: start the HTTP gateway.

use super::CliResult;
use factchat_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> CliResult<()> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() && !matches!(config.provider.as_str(), "ollama" | "vllm" | "llamacpp") {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set FACTCHAT_API_KEY or OPENAI_API_KEY, or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    println!("factchat gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.completion.model);
    println!("   Facts:     {}", config.storage.blob_dir.display());
    if config.storage.allow_kill_all_facts {
        println!("   WARNING:   kill-all-facts is enabled");
    }

    factchat_gateway::start(config).await?;

    Ok(())
}
