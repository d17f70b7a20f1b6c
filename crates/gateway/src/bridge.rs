//! Inbound-message bookkeeping — a small relational index recording every
//! message that crossed the HTTP ingress, independent of the task queue's
//! own in-memory history. Grounded in the source system's `whatsapp_bridge.db`
//! (one `inbound_messages` table), kept here rather than in `gw-memory`
//! since it's ingress plumbing, not retrieval-relevant memory.

use std::sync::Mutex;

use rusqlite::{params, Connection};

pub struct BridgeIndex {
    conn: Mutex<Connection>,
}

impl BridgeIndex {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init(conn: &Connection) -> anyhow::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS inbound_messages (
                message_id  TEXT PRIMARY KEY,
                channel     TEXT NOT NULL,
                from_id     TEXT NOT NULL,
                to_id       TEXT NOT NULL,
                text        TEXT NOT NULL,
                status      TEXT NOT NULL,
                task_id     TEXT,
                reply       TEXT,
                error       TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn record_inbound(&self, message_id: &str, channel: &str, from_id: &str, to_id: &str, text: &str, task_id: Option<&str>) {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let _ = conn.execute(
            "INSERT INTO inbound_messages (message_id, channel, from_id, to_id, text, status, task_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'queued', ?6, ?7, ?7)
             ON CONFLICT(message_id) DO NOTHING",
            params![message_id, channel, from_id, to_id, text, task_id, now],
        );
    }

    pub fn record_outcome(&self, message_id: &str, status: &str, reply: Option<&str>, error: Option<&str>) {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        let _ = conn.execute(
            "UPDATE inbound_messages SET status = ?2, reply = ?3, error = ?4, updated_at = ?5 WHERE message_id = ?1",
            params![message_id, status, reply, error, now],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_inbound_then_outcome_round_trips() {
        let index = BridgeIndex::in_memory().unwrap();
        index.record_inbound("m1", "whatsapp", "u1", "bot", "hello", Some("t1"));
        index.record_outcome("m1", "completed", Some("hi there"), None);

        let conn = index.conn.lock().unwrap();
        let status: String = conn
            .query_row("SELECT status FROM inbound_messages WHERE message_id = 'm1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "completed");
    }

    #[test]
    fn duplicate_message_id_is_ignored_on_insert() {
        let index = BridgeIndex::in_memory().unwrap();
        index.record_inbound("m1", "whatsapp", "u1", "bot", "hello", None);
        index.record_inbound("m1", "whatsapp", "u1", "bot", "hello again", None);

        let conn = index.conn.lock().unwrap();
        let text: String = conn
            .query_row("SELECT text FROM inbound_messages WHERE message_id = 'm1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(text, "hello");
    }
}
