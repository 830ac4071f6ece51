//! `factchat index-facts`: embed a facts file into the background index.

use super::CliResult;
use factchat_config::AppConfig;
use factchat_memory::EmbeddingIndex;
use std::path::Path;

pub async fn run(file: &Path) -> CliResult<()> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = factchat_providers::router::build_from_config(&config)?;

    let index_path = config.retrieval.index_path.clone();
    if let Some(parent) = index_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let index = EmbeddingIndex::open(index_path.clone(), provider, config.completion.embedding_model.clone());
    println!("Indexing {} with {}...", file.display(), config.completion.embedding_model);

    let count = index.index_facts(file).await?;
    println!("Indexed {count} facts; {} entries in {}", index.len().await, index_path.display());

    Ok(())
}
