use rusqlite::{Connection, Result};

/// Open a connection with the pragmas the original system relied on for
/// concurrent readers during writes: WAL journaling and relaxed sync.
pub fn open(path: &str) -> Result<Connection> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(conn)
}

/// Idempotent schema creation for the vector-store / document database.
pub fn init_memory_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS documents (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            filename        TEXT NOT NULL,
            content         TEXT NOT NULL,
            processed       INTEGER NOT NULL DEFAULT 0,
            unix_timestamp  INTEGER NOT NULL,
            importance      INTEGER NOT NULL DEFAULT 5
        );
        CREATE INDEX IF NOT EXISTS idx_documents_timestamp ON documents(unix_timestamp);

        CREATE TABLE IF NOT EXISTS vectors (
            document_id INTEGER PRIMARY KEY REFERENCES documents(id),
            embedding   BLOB NOT NULL
        );",
    )
}

/// Idempotent schema creation for the knowledge-graph database — a separate
/// file from the vector store, matching the source system's split between
/// `memory.db` and `knowledge_graph.db`.
pub fn init_graph_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS nodes (
            name        TEXT PRIMARY KEY,
            type        TEXT DEFAULT 'entity',
            properties  TEXT DEFAULT '{}',
            created_at  REAL,
            updated_at  REAL
        );
        CREATE TABLE IF NOT EXISTS edges (
            source      TEXT NOT NULL,
            target      TEXT NOT NULL,
            relation    TEXT NOT NULL,
            weight      REAL DEFAULT 1.0,
            evidence    TEXT DEFAULT '',
            created_at  REAL,
            PRIMARY KEY (source, target, relation),
            FOREIGN KEY (source) REFERENCES nodes(name),
            FOREIGN KEY (target) REFERENCES nodes(name)
        );
        CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
        CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);
        CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation);
        CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(type);",
    )
}

/// Encode an embedding vector as a little-endian f32 blob for storage.
pub fn encode_embedding(v: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.len() * 4);
    for x in v {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    buf
}

/// Decode a blob produced by [`encode_embedding`] back into an f32 vector.
pub fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_round_trips_through_blob_encoding() {
        let v = vec![0.1f32, -0.5, 2.75, 0.0];
        let blob = encode_embedding(&v);
        let decoded = decode_embedding(&blob);
        assert_eq!(v, decoded);
    }

    #[test]
    fn schemas_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_memory_db(&conn).unwrap();
        init_memory_db(&conn).unwrap();
        init_graph_db(&conn).unwrap();
        init_graph_db(&conn).unwrap();
    }
}
