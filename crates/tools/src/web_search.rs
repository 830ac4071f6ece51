//! Web search tool backed by SerpAPI.
//!
//! The search backend returns heterogeneous result objects (answer boxes,
//! sports spotlights, knowledge graphs, organic results). [`best_answer`]
//! collapses them into one line of text for the model, and every organic
//! result link is kept as provenance.

use async_trait::async_trait;
use factchat_core::error::ToolError;
use factchat_core::tool::{Tool, ToolOutput};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Returned when no result shape carries a usable answer.
pub const NO_RESULT: &str = "No good result found";

/// A raw search backend: free-text query in, structured result object out.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Value, ToolError>;
}

/// SerpAPI Google search client.
pub struct SerpApiClient {
    client: reqwest::Client,
    config: factchat_config::SearchConfig,
}

impl SerpApiClient {
    pub fn new(config: factchat_config::SearchConfig, timeout: std::time::Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| failed(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn query_params<'a>(&'a self, query: &'a str, api_key: &'a str) -> Vec<(&'static str, String)> {
        vec![
            ("engine", self.config.engine.clone()),
            ("google_domain", self.config.google_domain.clone()),
            ("gl", self.config.gl.clone()),
            ("hl", self.config.hl.clone()),
            ("num", self.config.num.to_string()),
            ("api_key", api_key.to_string()),
            ("q", query.to_string()),
        ]
    }
}

#[async_trait]
impl SearchBackend for SerpApiClient {
    async fn search(&self, query: &str) -> Result<Value, ToolError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| failed("No search API key configured (SERPAPI_API_KEY)"))?;

        let url = format!("{}/search.json", self.config.base_url.trim_end_matches('/'));
        debug!(query = %query, "Querying search backend");

        let response = self
            .client
            .get(&url)
            .query(&self.query_params(query, api_key))
            .send()
            .await
            .map_err(|e| failed(format!("Search request failed: {e}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| failed(format!("Failed to parse search response: {e}")))?;

        if !status.is_success() && body.get("error").is_none() {
            return Err(failed(format!("Search backend returned HTTP {status}")));
        }

        Ok(body)
    }
}

fn failed(reason: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "search".into(),
        reason: reason.into(),
    }
}

/// Text form of a result field; strings are used as-is, objects as JSON.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Pick the single best answer out of a search result object.
///
/// Precedence: answer box answer, answer box snippet, first highlighted
/// word, sports game spotlight, knowledge graph description, first organic
/// snippet, then [`NO_RESULT`].
pub fn best_answer(result: &Value) -> String {
    let answer_box = &result["answer_box"];

    as_text(&answer_box["answer"])
        .or_else(|| as_text(&answer_box["snippet"]))
        .or_else(|| as_text(&answer_box["snippet_highlighted_words"][0]))
        .or_else(|| as_text(&result["sports_results"]["game_spotlight"]))
        .or_else(|| as_text(&result["knowledge_graph"]["description"]))
        .or_else(|| as_text(&result["organic_results"][0]["snippet"]))
        .unwrap_or_else(|| NO_RESULT.to_string())
}

/// Every organic result link, in result order.
pub fn organic_links(result: &Value) -> Vec<String> {
    result["organic_results"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .filter_map(|r| r["link"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// The `search` tool the model calls as `$search(term)`.
pub struct WebSearchTool {
    backend: Arc<dyn SearchBackend>,
}

impl WebSearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web for information needed to answer the question."
    }

    fn parameter_hint(&self) -> &str {
        "search term"
    }

    async fn execute(&self, argument: &str) -> Result<ToolOutput, ToolError> {
        let result = self.backend.search(argument).await?;

        if let Some(error) = result.get("error") {
            return Err(failed(format!(
                "Search backend error: {}",
                as_text(error).unwrap_or_default()
            )));
        }

        Ok(ToolOutput {
            result: best_answer(&result),
            provenance: organic_links(&result),
        })
    }
}
