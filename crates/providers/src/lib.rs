//! Completion provider implementations for factchat.
//!
//! All providers implement the `factchat_core::Provider` trait.
//! `router::build_from_config` selects one from configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
