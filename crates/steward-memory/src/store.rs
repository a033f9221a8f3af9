use std::sync::Mutex;

use chrono::Utc;
use rusqlite::Connection;
use steward_core::time;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::{MemoryError, Result},
    types::{Memory, MemorySearchResult},
};

/// Memories with their embeddings, searched by cosine distance.
///
/// Distances are computed in process over every stored row, which is fine
/// for a single user's memory but does not scale to large corpora.
pub struct MemoryStore {
    db: Mutex<Connection>,
}

impl MemoryStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn save(&self, content: &str, embedding: &[f32], category: Option<&str>) -> Result<Memory> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let vector = serde_json::to_string(embedding)?;

        let db = self.db.lock().expect("memory store connection poisoned");
        db.execute(
            "INSERT INTO memories (id, content, embedding, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, content, vector, category, time::to_db(now)],
        )?;
        debug!(memory_id = %id, dims = embedding.len(), "memory saved");

        Ok(Memory {
            id,
            content: content.to_string(),
            category: category.map(String::from),
            created_at: now,
        })
    }

    /// The `top_k` memories whose cosine distance to `query` is below
    /// `threshold`, nearest first.
    pub fn search_similar(
        &self,
        query: &[f32],
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<MemorySearchResult>> {
        let db = self.db.lock().expect("memory store connection poisoned");
        let mut stmt =
            db.prepare("SELECT id, content, embedding, category, created_at FROM memories")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, content, vector, category, created_at) = row?;
            let embedding: Vec<f32> = match serde_json::from_str(&vector) {
                Ok(v) => v,
                Err(e) => {
                    warn!(memory_id = %id, error = %e, "skipping memory with unreadable embedding");
                    continue;
                }
            };
            let Some(distance) = cosine_distance(query, &embedding) else {
                warn!(memory_id = %id, "skipping memory with incompatible embedding");
                continue;
            };
            if distance >= threshold {
                continue;
            }
            scored.push((
                distance,
                MemorySearchResult {
                    id,
                    content,
                    category,
                    similarity: 1.0 - distance,
                    created_at: parse_ts(&created_at)?,
                },
            ));
        }

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored.into_iter().take(top_k).map(|(_, r)| r).collect())
    }

    /// Every memory, newest first.
    pub fn list_all(&self) -> Result<Vec<Memory>> {
        let db = self.db.lock().expect("memory store connection poisoned");
        let mut stmt = db.prepare(
            "SELECT id, content, category, created_at FROM memories
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, content, category, created_at) = row?;
            out.push(Memory {
                id,
                content,
                category,
                created_at: parse_ts(&created_at)?,
            });
        }
        Ok(out)
    }

    /// Returns `false` when no memory had that id.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().expect("memory store connection poisoned");
        let n = db.execute("DELETE FROM memories WHERE id = ?1", [id])?;
        Ok(n > 0)
    }
}

fn parse_ts(s: &str) -> Result<chrono::DateTime<Utc>> {
    time::from_db(s).map_err(|e| MemoryError::Timestamp(e.to_string()))
}

/// Cosine distance in `[0, 2]`. `None` for mismatched lengths or a zero vector.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    Some(1.0 - similarity)
}
