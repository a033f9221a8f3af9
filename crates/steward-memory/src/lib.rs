//! `steward-memory` — semantic memory over text embeddings.
//!
//! Memories are embedded through an [`embeddings::Embedder`] (OpenAI by
//! default) and stored alongside their vectors in SQLite. Retrieval embeds
//! the query and returns the stored memories within a cosine-distance
//! threshold, nearest first.

pub mod db;
pub mod embeddings;
pub mod error;
pub mod service;
pub mod store;
pub mod types;

pub use embeddings::{Embedder, OpenAiEmbedder};
pub use error::{MemoryError, Result};
pub use service::{MemoryService, DEFAULT_THRESHOLD, DEFAULT_TOP_K};
pub use store::MemoryStore;
pub use types::{Memory, MemorySearchResult, NewMemory, RetrievedContext, SaveMemoryResult};
