//! Storage implementations for factchat.
//!
//! - Blob stores holding one JSON fact per key (directory, in-memory)
//! - [`FactStore`] for writing facts and exporting training files
//! - [`EmbeddingIndex`], the similarity index behind background retrieval

pub mod facts;
pub mod file_backend;
pub mod in_memory;
pub mod index;
pub mod vector;

pub use facts::{FactStore, TrainingExport, fact_key};
pub use file_backend::DirectoryBlobStore;
pub use in_memory::InMemoryBlobStore;
pub use index::EmbeddingIndex;
pub use vector::{best_match, cosine_similarity, vector_search};
