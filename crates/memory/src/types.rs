use serde::{Deserialize, Serialize};

/// A stored document plus its vector embedding and scoring metadata —
/// the unit `VectorStore::insert`/`search` operate on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: i64,
    pub text: String,
    pub embedding: Vec<f32>,
    pub unix_timestamp: i64,
    pub importance: i32,
}

/// A single hit returned from `VectorStore::search`, before the 3-factor
/// combined score is applied by the memory engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: i64,
    pub text: String,
    pub similarity: f32,
    pub unix_timestamp: i64,
    pub importance: i32,
}

impl ScoredPoint {
    /// `0.4*similarity + 0.3*temporal_score + 0.3*(importance/10)`.
    pub fn combined_score(&self, now_unix: i64) -> f32 {
        let diff_days = ((now_unix - self.unix_timestamp) as f32 / 86_400.0).max(0.0);
        let temporal = 1.0 / (1.0 + (1.0 + diff_days).ln());
        0.4 * self.similarity + 0.3 * temporal + 0.3 * (self.importance as f32 / 10.0)
    }
}

/// A single retrieval result as handed to the cognition layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub content: String,
    pub score: f32,
    pub source: &'static str,
}

/// Which tier of the retrieval pipeline produced a query's results.
///
/// `Reranked` is a disclosed misnomer kept for wire compatibility with the
/// two-tier contract: no reranking model runs in this stack (the source
/// system's `flashrank` cross-encoder has no counterpart among this corpus's
/// crates), so this tier is the combined-score ordering over the full
/// candidate set rather than just the fast-gated subset. See
/// `MemoryEngine::query_inner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalTier {
    FastGate,
    Reranked,
    Error,
}

/// Temporal routing label derived from keyword matches in the query text —
/// informational, surfaced to callers but not currently branched on beyond
/// logging (kept for parity with the dashboard that displays it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalRouting {
    Historical,
    CurrentState,
    DefaultHybrid,
}

/// Result of a memory query: retrieved hits plus the context the caller
/// needs to build a cognition prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub results: Vec<MemoryHit>,
    pub tier: RetrievalTier,
    pub entities: Vec<String>,
    pub graph_context: String,
    pub routing: TemporalRouting,
}

/// A knowledge-graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub node_type: String,
    pub properties: serde_json::Value,
}

/// A knowledge-graph edge, uniquely keyed by `(source, target, relation)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub weight: f64,
    pub evidence: String,
}

/// Decision returned by `ConflictManager::check_conflict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    New,
    Same,
    Overwrite,
    Ignore,
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictOption {
    pub fact: String,
    pub source: String,
}

/// A pending or resolved contradiction between a stored fact and a new
/// observation, as tracked by the conflict manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: String,
    pub subject: String,
    pub timestamp: f64,
    pub option_a: ConflictOption,
    pub option_b: ConflictOption,
    pub status: ConflictStatus,
    pub resolution: Option<String>,
}
