//! Tool trait: the abstraction over external capabilities.
//!
//! The model requests a tool by writing `$name(argument)` in its reply; the
//! orchestrator parses that into a [`ToolCall`] and runs it through the
//! [`ToolRegistry`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use crate::error::ToolError;

/// A tool invocation parsed from one model response. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute
    pub name: String,

    /// The single free-text argument, quotes removed
    pub argument: String,
}

/// The result of a successful tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text that answers the argument
    pub result: String,

    /// Source references backing the result (e.g. result links)
    #[serde(default)]
    pub provenance: Vec<String>,
}

/// Static description of a registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// What the single argument means (e.g. "search term")
    pub parameter_hint: String,
}

/// The core Tool trait.
///
/// Each capability (web search, ...) implements this trait and is registered
/// by name in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool, as the model writes it after `$`.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// What the argument should contain.
    fn parameter_hint(&self) -> &str;

    /// Execute the tool with the given argument.
    async fn execute(&self, argument: &str) -> std::result::Result<ToolOutput, ToolError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameter_hint: self.parameter_hint().to_string(),
        }
    }
}

/// Default per-invocation time limit.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(20);

/// A registry of available tools, in registration order.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Bound every invocation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Descriptors of all registered tools, in registration order.
    pub fn describe(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.descriptor())
            .collect()
    }

    /// Run the named tool with `argument`.
    ///
    /// Fails with `ToolError::NotFound` for unregistered names and
    /// `ToolError::Timeout` when the tool exceeds the registry time limit.
    pub async fn invoke(&self, name: &str, argument: &str) -> std::result::Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        match tokio::time::timeout(self.timeout, tool.execute(argument)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(tool = %name, timeout_secs = self.timeout.as_secs(), "Tool timed out");
                Err(ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Execute a parsed tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolOutput, ToolError> {
        self.invoke(&call.name, &call.argument).await
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
