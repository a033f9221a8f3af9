use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored memory. The embedding is not carried outside the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A memory matched by a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySearchResult {
    pub id: String,
    pub content: String,
    pub category: Option<String>,
    /// `1 - cosine distance`: 1.0 is identical, -1.0 is opposite.
    pub similarity: f64,
    pub created_at: DateTime<Utc>,
}

/// One item of a batch save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    pub content: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMemoryResult {
    pub id: String,
    pub status: String,
}

/// One entry of a context retrieval, as returned to API callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub content: String,
    pub similarity: f64,
    pub category: Option<String>,
}

impl From<MemorySearchResult> for RetrievedContext {
    fn from(r: MemorySearchResult) -> Self {
        Self {
            content: r.content,
            similarity: r.similarity,
            category: r.category,
        }
    }
}
