//! # factchat core
//!
//! Domain types, traits, and error definitions for the factchat assistant
//! backend. Every collaborator (completion provider, tools, blob store,
//! background index) is a trait here; implementations live in their own
//! crates so the conversation engine can be tested against stubs.

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod storage;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use memory::{BackgroundRetriever, IndexRecord, NoBackground};
pub use message::{Message, Role, SessionId};
pub use provider::{CompletionSettings, Provider, ProviderRequest, ProviderResponse};
pub use storage::{BlobStore, Fact, TrainingRecord};
pub use tool::{Tool, ToolCall, ToolDescriptor, ToolOutput, ToolRegistry};
