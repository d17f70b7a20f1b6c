//! Orchestrates the vector store, knowledge graph and conflict manager into
//! the single `query`/`add_memory` surface the cognition layer calls — a
//! port of the source system's `MemoryEngine`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gw_embedder::Embedder;
use gw_llm::{ChatRequest, Router, RoutingLabel};
use tracing::warn;

use crate::error::{MemoryError, Result};
use crate::graph::KnowledgeGraph;
use crate::types::{MemoryHit, QueryResult, RetrievalTier, TemporalRouting};
use crate::vectorstore::VectorStore;

const HISTORICAL_KEYWORDS: &[&str] = &["was", "did", "history", "back then", "2024", "2025", "past"];
const CURRENT_KEYWORDS: &[&str] = &["current", "now", "latest", "status", "currently", "today"];

const EMOTIONAL_WORDS: &[&str] = &[
    "love", "hate", "angry", "sad", "happy", "excited", "scared", "proud", "ashamed", "miss",
    "breakup", "fight", "sorry", "grateful", "cry", "depressed",
];
const LIFE_EVENT_WORDS: &[&str] = &[
    "interview", "job", "exam", "result", "hospital", "birthday", "anniversary", "moving",
    "travel", "married", "died", "born", "graduated", "fired", "hired",
];

const FAST_GATE_THRESHOLD: f32 = 0.80;

pub struct MemoryEngine {
    vectors: VectorStore,
    graph: KnowledgeGraph,
    embedder: Arc<dyn Embedder>,
    llm: Option<Arc<Router>>,
    backup_path: std::path::PathBuf,
}

impl MemoryEngine {
    pub fn new(
        vectors: VectorStore,
        graph: KnowledgeGraph,
        embedder: Arc<dyn Embedder>,
        llm: Option<Arc<Router>>,
        backup_path: impl AsRef<Path>,
    ) -> Self {
        Self {
            vectors,
            graph,
            embedder,
            llm,
            backup_path: backup_path.as_ref().to_path_buf(),
        }
    }

    /// Retry `f` against SQLite lock contention with exponential backoff,
    /// mirroring the original's `with_retry(retries, delay)` decorator:
    /// delay doubles each attempt (`delay * 2^i`).
    async fn with_retry<T, F, Fut>(&self, retries: u32, delay: Duration, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(MemoryError::Database(rusqlite::Error::SqliteFailure(e, ref msg)))
                    if e.code == rusqlite::ErrorCode::DatabaseBusy
                        || msg.as_deref().unwrap_or("").contains("locked") =>
                {
                    attempt += 1;
                    if attempt >= retries {
                        return Err(MemoryError::LockContention { attempts: attempt });
                    }
                    tokio::time::sleep(delay * 2u32.pow(attempt - 1)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Extract entities from `text` by scanning known graph node names for
    /// case-insensitive whole-word matches. The source system used FlashText
    /// for this; nothing in this stack provides an equivalent multi-pattern
    /// matcher, and the graph's own node list is already the exact
    /// vocabulary worth matching against, so it doubles as the dictionary.
    fn extract_entities(&self, text: &str) -> Result<Vec<String>> {
        let lowered = text.to_lowercase();
        let names = self.graph.get_all_node_names()?;
        let mut hits: Vec<String> = names
            .into_iter()
            .filter(|name| {
                let needle = name.to_lowercase();
                word_contains(&lowered, &needle)
            })
            .collect();
        hits.sort();
        hits.dedup();
        Ok(hits)
    }

    fn route_temporally(&self, query: &str) -> TemporalRouting {
        let lowered = query.to_lowercase();
        let historical = HISTORICAL_KEYWORDS.iter().any(|k| lowered.contains(k));
        let current = CURRENT_KEYWORDS.iter().any(|k| lowered.contains(k));
        match (historical, current) {
            (true, false) => TemporalRouting::Historical,
            (false, true) => TemporalRouting::CurrentState,
            _ => TemporalRouting::DefaultHybrid,
        }
    }

    /// Hybrid retrieval: entity extraction + graph context, vector search
    /// over `limit*3` candidates, combined-score ranking, fast-gate
    /// short-circuit, reranker fallback. Never returns `Err` — a failure
    /// degrades to an empty result with `RetrievalTier::Error`, matching the
    /// original's catch-all.
    pub async fn query(&self, text: &str, limit: usize) -> QueryResult {
        match self.query_inner(text, limit).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "memory query failed, degrading to empty result");
                QueryResult {
                    results: Vec::new(),
                    tier: RetrievalTier::Error,
                    entities: Vec::new(),
                    graph_context: String::new(),
                    routing: TemporalRouting::DefaultHybrid,
                }
            }
        }
    }

    async fn query_inner(&self, text: &str, limit: usize) -> Result<QueryResult> {
        let entities = self.extract_entities(text)?;
        let mut graph_context = String::new();
        for entity in &entities {
            let chunk = self.graph.get_entity_neighborhood(entity)?;
            if !chunk.is_empty() {
                if !graph_context.is_empty() {
                    graph_context.push('\n');
                }
                graph_context.push_str(&chunk);
            }
        }

        let routing = self.route_temporally(text);

        let query_embedding = self.embedder.embed(text).await?;
        let candidates = self.vectors.search(&query_embedding, limit * 3)?;

        let now = now_unix();
        let mut scored: Vec<(f32, &crate::types::ScoredPoint)> = candidates
            .iter()
            .map(|p| (p.combined_score(now), p))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

        let high_confidence: Vec<_> = scored
            .iter()
            .filter(|(score, point)| {
                *score > FAST_GATE_THRESHOLD
                    && (entities.is_empty()
                        || entities
                            .iter()
                            .any(|e| point.text.to_lowercase().contains(&e.to_lowercase())))
            })
            .collect();

        if high_confidence.len() >= limit {
            let results = high_confidence
                .into_iter()
                .take(limit)
                .map(|(score, point)| MemoryHit {
                    content: point.text.clone(),
                    score: *score,
                    source: "vector",
                })
                .collect();
            return Ok(QueryResult {
                results,
                tier: RetrievalTier::FastGate,
                entities,
                graph_context,
                routing,
            });
        }

        // No reranking model backs this tier (see RetrievalTier::Reranked) —
        // it returns the same combined-score ordering the fast-gate tier
        // uses, just over the full candidate set instead of the filtered one.
        let results = scored
            .into_iter()
            .take(limit)
            .map(|(score, point)| MemoryHit {
                content: point.text.clone(),
                score,
                source: "vector",
            })
            .collect();

        Ok(QueryResult {
            results,
            tier: RetrievalTier::Reranked,
            entities,
            graph_context,
            routing,
        })
    }

    /// Write a JSONL backup line, then insert the document + embedding in a
    /// single transaction (the original wrote the backup before opening its
    /// own separate connection for the insert; here both steps share one
    /// `VectorStore::insert` transaction since nothing else needs to
    /// interleave with it).
    pub async fn add_memory(&self, content: &str, category: &str) -> Result<i64> {
        self.append_backup(content, category)?;

        let importance = self.score_importance(content).await;
        let embedding = self.embedder.embed(content).await?;
        let now = now_unix();

        self.with_retry(5, Duration::from_millis(100), || async {
            self.vectors.insert(category, content, now, importance, &embedding)
        })
        .await
    }

    fn append_backup(&self, content: &str, category: &str) -> Result<()> {
        use std::io::Write;
        if let Some(parent) = self.backup_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.backup_path)?;
        let line = serde_json::json!({
            "content": content,
            "category": category,
            "unix_timestamp": now_unix(),
        });
        writeln!(file, "{}", serde_json::to_string(&line)?)?;
        Ok(())
    }

    /// `base=3, +2` per emotional-word match, `+2` per life-event-word
    /// match, `-2` if fewer than 5 words, clamped to `[1, 10]`.
    fn score_importance_heuristic(&self, content: &str) -> i32 {
        let lowered = content.to_lowercase();
        let mut score = 3i32;
        if EMOTIONAL_WORDS.iter().any(|w| lowered.contains(w)) {
            score += 2;
        }
        if LIFE_EVENT_WORDS.iter().any(|w| lowered.contains(w)) {
            score += 2;
        }
        if content.split_whitespace().count() < 5 {
            score -= 2;
        }
        score.clamp(1, 10)
    }

    async fn score_importance_llm(&self, content: &str) -> i32 {
        let Some(llm) = &self.llm else {
            return 5;
        };
        let prompt = format!(
            "Rate the importance of this memory on a scale of 1 to 10. \
             1 = mundane, forgettable. 5 = moderately notable. 10 = life-altering. \
             Return ONLY a single integer 1-10:\n\n{content}"
        );
        let req = ChatRequest::new(llm.model_for(RoutingLabel::Casual), "You rate the importance of personal memories.").with_user(&prompt);
        match llm.chat(&req).await {
            Ok(resp) => resp
                .content
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse::<i32>()
                .map(|n| n.clamp(1, 10))
                .unwrap_or(5),
            Err(_) => 5,
        }
    }

    /// Hybrid dispatcher: the heuristic decides outright outside the grey
    /// zone (`<=3` or `>=8`); only `4..=7` escalates to an LLM call.
    pub async fn score_importance(&self, content: &str) -> i32 {
        let heuristic = self.score_importance_heuristic(content);
        if heuristic <= 3 || heuristic >= 8 {
            return heuristic;
        }
        self.score_importance_llm(content).await
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn vectors(&self) -> &VectorStore {
        &self.vectors
    }
}

fn word_contains(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == needle)
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_embedder::HashEmbedder;
    use tempfile::NamedTempFile;

    fn engine() -> (MemoryEngine, NamedTempFile) {
        let backup = NamedTempFile::new().unwrap();
        let vectors = VectorStore::in_memory().unwrap();
        let graph = KnowledgeGraph::in_memory().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        (
            MemoryEngine::new(vectors, graph, embedder, None, backup.path()),
            backup,
        )
    }

    #[test]
    fn heuristic_scores_emotional_content_higher() {
        let (engine, _f) = engine();
        let plain = engine.score_importance_heuristic("went to the shop today to buy bread");
        let emotional = engine.score_importance_heuristic("I am so happy we got married today");
        assert!(emotional > plain);
    }

    #[test]
    fn heuristic_penalizes_short_content() {
        let (engine, _f) = engine();
        let score = engine.score_importance_heuristic("fine thanks");
        assert_eq!(score, 1);
    }

    #[tokio::test]
    async fn add_memory_then_query_finds_it() {
        let (engine, _f) = engine();
        engine.add_memory("my sister got married last weekend", "direct_entry").await.unwrap();
        let result = engine.query("tell me about the wedding", 5).await;
        assert!(!matches!(result.tier, RetrievalTier::Error));
    }

    #[tokio::test]
    async fn score_importance_outside_grey_zone_skips_llm() {
        let (engine, _f) = engine();
        let score = engine.score_importance("hi").await;
        assert_eq!(score, 1);
    }

    #[test]
    fn temporal_routing_detects_historical_keywords() {
        let (engine, _f) = engine();
        assert_eq!(engine.route_temporally("what happened back then"), TemporalRouting::Historical);
        assert_eq!(engine.route_temporally("what's my current status"), TemporalRouting::CurrentState);
        assert_eq!(engine.route_temporally("tell me something"), TemporalRouting::DefaultHybrid);
    }
}
