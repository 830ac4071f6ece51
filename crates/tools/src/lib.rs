//! Built-in tool implementations for factchat.
//!
//! Tools give the assistant capabilities it cannot answer from the prompt
//! alone. The model requests one by writing `$name(argument)`.

pub mod web_search;

use std::sync::Arc;
use factchat_config::AppConfig;
use factchat_core::error::ToolError;
use factchat_core::tool::ToolRegistry;

pub use web_search::{SearchBackend, SerpApiClient, WebSearchTool, best_answer};

/// Create the default tool registry from configuration.
///
/// Every invocation is bounded by `timeouts.tool_secs`.
pub fn default_registry(config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new().with_timeout(config.timeouts.tool());

    let serpapi = SerpApiClient::new(config.search.clone(), config.timeouts.tool())?;
    registry.register(Arc::new(WebSearchTool::new(Arc::new(serpapi))));

    Ok(registry)
}
