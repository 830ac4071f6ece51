//! Error types for the factchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum; `Error` wraps them all.

use thiserror::Error;

/// The top-level error type for all factchat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Blob storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Background retrieval errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Prompt template errors ---
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },
}

impl ToolError {
    /// True for failures of a registered tool's collaborator (as opposed to
    /// the model naming a tool that does not exist).
    pub fn is_execution_failure(&self) -> bool {
        !matches!(self, ToolError::NotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob backend failure: {0}")]
    Backend(String),

    #[error("Blob serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation disabled: {0}")]
    Disabled(String),

    #[error("Storage operation timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Template '{template}' references field '{field}' which was not supplied")]
    MissingField { template: String, field: String },

    #[error("Template '{template}' cannot use field '{field}'")]
    UnsupportedField { template: String, field: String },

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
}
