//! Text embedding with an injectable back-end and an in-process LRU cache,
//! mirroring the original system's `functools.lru_cache`d `get_embedding`.
//!
//! Two concrete implementations are provided: `OllamaEmbedder` (primary,
//! `nomic-embed-text` served locally) and `HashEmbedder` (deterministic,
//! dependency-free fallback used in tests and when no embedding server is
//! reachable — never used to silently degrade production quality, only to
//! keep the memory pipeline exercisable offline).

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

pub const DEFAULT_DIM: usize = 384;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding server returned malformed response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Calls an Ollama-compatible `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dim: usize,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dim: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            dim,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            model: &'a str,
            prompt: &'a str,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&Req {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;
        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| EmbedError::Parse(e.to_string()))?;
        Ok(parsed.embedding)
    }
}

/// Deterministic, dependency-free embedder: hashes overlapping character
/// shingles into a fixed-size vector and L2-normalizes it. Produces vectors
/// that are stable across calls and cluster similar strings closely enough
/// to drive cosine-similarity tests without a live model server.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash-fallback"
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut v = vec![0.0f32; self.dim];
        let lowered = text.to_lowercase();
        let bytes = lowered.as_bytes();
        let shingle_len = 3usize;

        if bytes.len() < shingle_len {
            hash_into(bytes, &mut v);
        } else {
            for window in bytes.windows(shingle_len) {
                hash_into(window, &mut v);
            }
        }

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

fn hash_into(bytes: &[u8], v: &mut [f32]) {
    // FNV-1a, good enough for a deterministic bucket hash — not cryptographic.
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    let idx = (hash as usize) % v.len();
    let sign = if (hash >> 63) & 1 == 1 { 1.0 } else { -1.0 };
    v[idx] += sign;
}

/// Bounded LRU cache wrapping any `Embedder`, keyed on the input text.
/// Grounded in the source system's `functools.lru_cache` on `get_embedding`,
/// implemented in the teacher's manner (`Mutex` + bounded eviction, as
/// `MemoryManager`'s `UserContext` cache does).
pub struct CachedEmbedder<E: Embedder> {
    inner: E,
    cache: Mutex<LruMap>,
}

struct LruMap {
    capacity: usize,
    order: VecDeque<String>,
    entries: std::collections::HashMap<String, Vec<f32>>,
}

impl LruMap {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            entries: std::collections::HashMap::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<Vec<f32>> {
        if let Some(v) = self.entries.get(key).cloned() {
            self.order.retain(|k| k != key);
            self.order.push_back(key.to_string());
            Some(v)
        } else {
            None
        }
    }

    fn put(&mut self, key: String, value: Vec<f32>) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }
}

impl<E: Embedder> CachedEmbedder<E> {
    pub const DEFAULT_CAPACITY: usize = 500;

    pub fn new(inner: E) -> Self {
        Self::with_capacity(inner, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: E, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruMap::new(capacity)),
        }
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if let Some(cached) = self.cache.lock().unwrap().get(text) {
            return Ok(cached);
        }
        let v = self.inner.embed(text).await?;
        self.cache.lock().unwrap().put(text.to_string(), v.clone());
        Ok(v)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let e = HashEmbedder::default();
        let a = e.embed("hello world").await.unwrap();
        let b = e.embed("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn identical_text_has_similarity_one() {
        let e = HashEmbedder::default();
        let a = e.embed("the cat sat on the mat").await.unwrap();
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn cached_embedder_hits_cache_on_repeat() {
        let cached = CachedEmbedder::with_capacity(HashEmbedder::default(), 2);
        let a = cached.embed("x").await.unwrap();
        let b = cached.embed("x").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn cache_evicts_oldest_entry_past_capacity() {
        let cached = CachedEmbedder::with_capacity(HashEmbedder::default(), 1);
        cached.embed("first").await.unwrap();
        cached.embed("second").await.unwrap();
        // capacity 1 means "first" has been evicted; cache still functions
        let v = cached.embed("second").await.unwrap();
        assert_eq!(v.len(), DEFAULT_DIM);
    }
}
