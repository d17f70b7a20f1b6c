//! Knowledge graph stored as relational rows rather than an in-memory object
//! graph — a direct port of the source system's `sqlite_graph.py`, including
//! its `has_node`/`neighbors` single-query lookups. The NetworkX-migration
//! surface (`save_graph`, `migrate_from_networkx_file`) is not ported — it
//! existed only to stand in for a prior in-memory `networkx.DiGraph` API
//! this port never had, and there is no `knowledge_graph.json.gz` to migrate
//! from here.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::error::Result;
use crate::types::Node;

pub struct KnowledgeGraph {
    conn: Mutex<Connection>,
}

impl KnowledgeGraph {
    pub fn open(path: &str) -> Result<Self> {
        let conn = db::open(path)?;
        db::init_graph_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_graph_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn add_node(&self, name: &str, node_type: &str, properties: &serde_json::Value) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = now_unix_f64();
        conn.execute(
            "INSERT INTO nodes (name, type, properties, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(name) DO UPDATE SET
                type = excluded.type,
                properties = excluded.properties,
                updated_at = excluded.updated_at",
            params![name, node_type, properties.to_string(), now],
        )?;
        Ok(())
    }

    /// Upsert an edge, accumulating evidence with `" | "` rather than
    /// overwriting it, and ensuring both endpoints exist as bare nodes.
    pub fn add_edge(&self, source: &str, target: &str, relation: &str, weight: f64, evidence: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = now_unix_f64();
        for name in [source, target] {
            conn.execute(
                "INSERT OR IGNORE INTO nodes (name, type, properties, created_at, updated_at)
                 VALUES (?1, 'entity', '{}', ?2, ?2)",
                params![name, now],
            )?;
        }
        conn.execute(
            "INSERT INTO edges (source, target, relation, weight, evidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(source, target, relation) DO UPDATE SET
                weight = excluded.weight,
                evidence = edges.evidence || ' | ' || excluded.evidence",
            params![source, target, relation, weight, evidence, now],
        )?;
        Ok(())
    }

    /// Render the top 20 edges touching `entity` (in or out), ordered by
    /// weight descending, in the exact format the dashboard displayed:
    /// `"Knowledge about {entity}:\n  {source} --[{relation}]--> {target} (w={weight:.2f})"`.
    pub fn get_entity_neighborhood(&self, entity: &str) -> Result<String> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT source, target, relation, weight FROM edges
             WHERE source = ?1 OR target = ?1
             ORDER BY weight DESC LIMIT 20",
        )?;
        let rows = stmt.query_map(params![entity], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut lines = Vec::new();
        for row in rows {
            let (source, target, relation, weight) = row?;
            lines.push(format!("  {source} --[{relation}]--> {target} (w={weight:.2})"));
        }
        if lines.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("Knowledge about {entity}:\n{}", lines.join("\n")))
    }

    /// Breadth-first search for a path from `start` to `end`, at most
    /// `max_depth` hops, treating edges as undirected.
    pub fn find_connection_path(&self, start: &str, end: &str, max_depth: usize) -> Result<Option<Vec<String>>> {
        if start == end {
            return Ok(Some(vec![start.to_string()]));
        }
        let conn = self.conn.lock().unwrap();
        let mut queue: VecDeque<Vec<String>> = VecDeque::new();
        queue.push_back(vec![start.to_string()]);
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());

        while let Some(path) = queue.pop_front() {
            if path.len() - 1 >= max_depth {
                continue;
            }
            let current = path.last().unwrap().clone();
            let mut stmt = conn.prepare(
                "SELECT target FROM edges WHERE source = ?1
                 UNION SELECT source FROM edges WHERE target = ?1",
            )?;
            let neighbors: Vec<String> = stmt
                .query_map(params![current], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<_>>()?;

            for next in neighbors {
                if next == end {
                    let mut found = path.clone();
                    found.push(next);
                    return Ok(Some(found));
                }
                if visited.insert(next.clone()) {
                    let mut extended = path.clone();
                    extended.push(next);
                    queue.push_back(extended);
                }
            }
        }
        Ok(None)
    }

    /// Whether a node named `name` exists.
    pub fn has_node(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists = conn
            .query_row("SELECT 1 FROM nodes WHERE name = ?1 LIMIT 1", params![name], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(exists)
    }

    /// Nodes reachable from `node` by an outgoing edge.
    pub fn neighbors(&self, node: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT target FROM edges WHERE source = ?1")?;
        let names = stmt
            .query_map(params![node], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn get_node(&self, name: &str) -> Result<Option<Node>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT name, type, properties FROM nodes WHERE name = ?1",
                params![name],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;
        Ok(row.map(|(name, node_type, properties)| Node {
            name,
            node_type,
            properties: serde_json::from_str(&properties).unwrap_or(serde_json::Value::Null),
        }))
    }

    pub fn get_all_node_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT name FROM nodes")?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn number_of_nodes(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))?)
    }

    pub fn number_of_edges(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM edges", [], |r| r.get(0))?)
    }

    /// Delete edges below `min_weight`, matching the original's periodic
    /// graph-maintenance sweep.
    pub fn prune_weak_edges(&self, min_weight: f64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM edges WHERE weight < ?1", params![min_weight])?;
        Ok(n)
    }

    /// Reclaim space left by deleted edges/nodes.
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}

fn now_unix_f64() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_accumulates_evidence_on_conflict() {
        let g = KnowledgeGraph::in_memory().unwrap();
        g.add_edge("alice", "bob", "knows", 1.0, "met at work").unwrap();
        g.add_edge("alice", "bob", "knows", 1.0, "also neighbours").unwrap();

        let neighborhood = g.get_entity_neighborhood("alice").unwrap();
        assert!(neighborhood.contains("alice --[knows]--> bob"));
    }

    #[test]
    fn find_connection_path_bfs() {
        let g = KnowledgeGraph::in_memory().unwrap();
        g.add_edge("a", "b", "rel", 1.0, "").unwrap();
        g.add_edge("b", "c", "rel", 1.0, "").unwrap();

        let path = g.find_connection_path("a", "c", 4).unwrap().unwrap();
        assert_eq!(path, vec!["a", "b", "c"]);
    }

    #[test]
    fn prune_weak_edges_removes_below_threshold() {
        let g = KnowledgeGraph::in_memory().unwrap();
        g.add_edge("a", "b", "rel", 0.05, "").unwrap();
        g.add_edge("a", "c", "rel", 0.9, "").unwrap();
        let removed = g.prune_weak_edges(0.1).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(g.number_of_edges().unwrap(), 1);
    }
}
