use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use steward_audit::ActionLog;
use tracing::info;

use crate::{
    embeddings::Embedder,
    error::Result,
    store::MemoryStore,
    types::{Memory, MemorySearchResult, NewMemory, RetrievedContext, SaveMemoryResult},
};

const SAVE_TOOL: &str = "memory_save";
const SAVE_BATCH_TOOL: &str = "memory_save_batch";
const RETRIEVE_TOOL: &str = "memory_retrieve";
const DELETE_TOOL: &str = "memory_delete";
/// Characters of content or query kept in the audit input snapshot.
const AUDIT_INPUT_CHARS: usize = 100;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Embeds and stores memories, and finds the ones relevant to a query.
pub struct MemoryService {
    embedder: Arc<dyn Embedder>,
    store: Arc<MemoryStore>,
    audit: Arc<ActionLog>,
}

impl MemoryService {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<MemoryStore>, audit: Arc<ActionLog>) -> Self {
        Self {
            embedder,
            store,
            audit,
        }
    }

    pub async fn save_memory(&self, content: &str, category: Option<&str>) -> Result<SaveMemoryResult> {
        let started = Instant::now();
        let input = json!({
            "content": truncate(content),
            "category": category,
        });

        let outcome: Result<Memory> = async {
            let embedding = self.embedder.embed(content).await?;
            self.store.save(content, &embedding, category)
        }
        .await;

        let summary = match &outcome {
            Ok(memory) => format!("Saved memory: {}", memory.id),
            Err(e) => format!("Error: {e}"),
        };
        self.audit.record(
            SAVE_TOOL,
            Some(&input),
            Some(&summary),
            Some(started.elapsed().as_millis() as i64),
        );

        let memory = outcome?;
        info!(memory_id = %memory.id, "memory stored");
        Ok(SaveMemoryResult {
            id: memory.id,
            status: "saved".to_string(),
        })
    }

    /// Save several memories with a single embeddings request.
    ///
    /// Either every item is stored or, on an embeddings failure, none is.
    pub async fn save_memories(&self, items: &[NewMemory]) -> Result<Vec<SaveMemoryResult>> {
        let started = Instant::now();
        let input = json!({ "count": items.len() });

        let outcome: Result<Vec<Memory>> = async {
            let texts: Vec<String> = items.iter().map(|m| m.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            items
                .iter()
                .zip(&vectors)
                .map(|(item, v)| self.store.save(&item.content, v, item.category.as_deref()))
                .collect()
        }
        .await;

        let summary = match &outcome {
            Ok(saved) => format!("Saved {} memories", saved.len()),
            Err(e) => format!("Error: {e}"),
        };
        self.audit.record(
            SAVE_BATCH_TOOL,
            Some(&input),
            Some(&summary),
            Some(started.elapsed().as_millis() as i64),
        );

        let saved = outcome?;
        info!(count = saved.len(), "memories stored");
        Ok(saved
            .into_iter()
            .map(|m| SaveMemoryResult {
                id: m.id,
                status: "saved".to_string(),
            })
            .collect())
    }

    /// Every stored memory, newest first.
    pub fn list_memories(&self) -> Result<Vec<Memory>> {
        self.store.list_all()
    }

    /// Returns `false` when no memory had that id.
    pub fn delete_memory(&self, id: &str) -> Result<bool> {
        let started = Instant::now();
        let outcome = self.store.delete(id);
        let summary = match &outcome {
            Ok(true) => format!("Deleted memory: {id}"),
            Ok(false) => format!("Memory not found: {id}"),
            Err(e) => format!("Error: {e}"),
        };
        self.audit.record(
            DELETE_TOOL,
            Some(&json!({ "id": id })),
            Some(&summary),
            Some(started.elapsed().as_millis() as i64),
        );
        outcome
    }

    pub async fn retrieve_context(
        &self,
        query: &str,
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<RetrievedContext>> {
        let started = Instant::now();
        let input = json!({
            "query": truncate(query),
            "top_k": top_k,
            "threshold": threshold,
        });

        let outcome: Result<Vec<MemorySearchResult>> = async {
            let vector = self.embedder.embed(query).await?;
            self.store.search_similar(&vector, top_k, threshold)
        }
        .await;

        let summary = match &outcome {
            Ok(hits) => format!("Found {} relevant memories", hits.len()),
            Err(e) => format!("Error: {e}"),
        };
        self.audit.record(
            RETRIEVE_TOOL,
            Some(&input),
            Some(&summary),
            Some(started.elapsed().as_millis() as i64),
        );

        Ok(outcome?.into_iter().map(RetrievedContext::from).collect())
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(AUDIT_INPUT_CHARS).collect()
}
