//! Subcommand implementations.

pub mod chat;
pub mod client;
pub mod facts;
pub mod index;
pub mod onboard;
pub mod serve;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;
