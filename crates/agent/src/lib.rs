//! The conversation engine for factchat.
//!
//! Each question goes through a bounded **prompt → complete → tool** loop:
//!
//! 1. **Assemble** the prompt from instructions, background, summary, recent turns
//! 2. **Complete** it with the configured provider
//! 3. **If the reply contains `$tool(arg)`**: run the tool, record its result, re-prompt
//! 4. **Otherwise**: the reply is the answer
//!
//! History is compressed into a model-written summary once enough turns pile
//! up, so prompt size stays bounded however long a session runs.

pub mod context;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod response;
pub mod sessions;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{Clock, ContextProvider};
pub use orchestrator::{APOLOGY, ConversationOrchestrator, MAX_ATTEMPTS};
pub use prompt::{MessageTemplate, PromptTemplateLibrary, TemplateName};
pub use response::{Reply, ResponseKind};
pub use sessions::{MAX_SESSIONS, SessionManager};
pub use state::ConversationState;
