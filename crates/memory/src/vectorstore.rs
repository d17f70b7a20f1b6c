//! Brute-force cosine-similarity vector store backed by SQLite.
//!
//! The source system used Qdrant for approximate nearest-neighbour search.
//! Nothing in this stack pulls in a vector database or an ANN crate, so
//! this store keeps embeddings as BLOBs in `documents`/`vectors` and scans
//! them at query time — fine at the corpus sizes a personal assistant's
//! memory actually reaches, and it keeps the whole engine in one file
//! instead of a second service to operate.

use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::db;
use crate::error::Result;
use crate::types::{ScoredPoint, VectorPoint};

pub struct VectorStore {
    conn: Mutex<Connection>,
}

impl VectorStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = db::open(path)?;
        db::init_memory_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_memory_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a document row plus its embedding in one transaction.
    pub fn insert(
        &self,
        filename: &str,
        content: &str,
        unix_timestamp: i64,
        importance: i32,
        embedding: &[f32],
    ) -> Result<i64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO documents (filename, content, processed, unix_timestamp, importance)
             VALUES (?1, ?2, 0, ?3, ?4)",
            params![filename, content, unix_timestamp, importance],
        )?;
        let doc_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO vectors (document_id, embedding) VALUES (?1, ?2)",
            params![doc_id, db::encode_embedding(embedding)],
        )?;
        tx.commit()?;
        Ok(doc_id)
    }

    /// Return the `limit` points with highest cosine similarity to `query`.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT d.id, d.content, d.unix_timestamp, d.importance, v.embedding
             FROM documents d JOIN vectors v ON v.document_id = d.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, Vec<u8>>(4)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, text, unix_timestamp, importance, blob) = row?;
            let embedding = db::decode_embedding(&blob);
            let similarity = gw_embedder::cosine_similarity(query, &embedding);
            scored.push(ScoredPoint {
                id,
                text,
                similarity,
                unix_timestamp,
                importance,
            });
        }
        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        scored.truncate(limit);
        Ok(scored)
    }

    pub fn get(&self, id: i64) -> Result<Option<VectorPoint>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT d.id, d.content, d.unix_timestamp, d.importance, v.embedding
             FROM documents d JOIN vectors v ON v.document_id = d.id
             WHERE d.id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(VectorPoint {
                id: row.get(0)?,
                text: row.get(1)?,
                unix_timestamp: row.get(2)?,
                importance: row.get(3)?,
                embedding: db::decode_embedding(&row.get::<_, Vec<u8>>(4)?),
            }))
        } else {
            Ok(None)
        }
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?)
    }

    /// Reclaim space left by deleted rows. Rewrites the whole file, so the
    /// maintenance loop calls this far less often than its pruning passes.
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_ranks_closer_vectors_first() {
        let store = VectorStore::in_memory().unwrap();
        store.insert("a", "alpha", 1_000, 5, &[1.0, 0.0, 0.0]).unwrap();
        store.insert("b", "beta", 1_000, 5, &[0.0, 1.0, 0.0]).unwrap();
        store.insert("c", "gamma", 1_000, 5, &[0.9, 0.1, 0.0]).unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "alpha");
        assert_eq!(hits[1].text, "gamma");
    }

    #[test]
    fn count_reflects_inserted_rows() {
        let store = VectorStore::in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        store.insert("a", "one", 1, 5, &[1.0]).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
