use std::net::SocketAddr;
use std::sync::Arc;

use gw_core::{GatewayConfig, ProfileStore};
use gw_cognition::{CognitionEngine, EmotionalTrajectory};
use gw_embedder::{CachedEmbedder, Embedder, OllamaEmbedder};
use gw_llm::Router;
use gw_memory::{ConflictManager, KnowledgeGraph, MemoryEngine, VectorStore};
use tokio::sync::Mutex;
use tracing::info;

mod app;
mod bridge;
mod dedup;
mod flood;
mod http;
mod maintenance;
mod queue;
mod responder;
mod sender;
mod worker;

use bridge::BridgeIndex;
use dedup::MessageDeduplicator;
use flood::FloodGate;
use queue::TaskQueue;
use responder::CognitiveResponder;
use sender::Sender;
use worker::{MessageWorkerPool, Responder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gw_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("GATEWAY_CONFIG").ok();
    let config = GatewayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        GatewayConfig::default()
    });

    let router = Router::new(&config.llm);

    let vectors = VectorStore::open(&config.database.memory_db_path)?;
    let graph = KnowledgeGraph::open(&config.database.graph_db_path)?;
    let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(OllamaEmbedder::new(
        "http://127.0.0.1:11434",
        "nomic-embed-text",
        gw_embedder::DEFAULT_DIM,
    )));
    let memory = Arc::new(MemoryEngine::new(
        vectors,
        graph,
        embedder,
        Some(Arc::new(Router::new(&config.llm))),
        &config.database.memory_backup_path,
    ));

    let conflicts = Arc::new(Mutex::new(ConflictManager::open(&config.database.conflicts_path)?));

    let trajectory = EmotionalTrajectory::new(config.cognition.trajectory_window, config.cognition.trajectory_min_turns);
    let cognition = CognitionEngine::new(router, memory.clone(), Some(trajectory), config.cognition.fast_phrases.clone());

    let profile = if config.profile.enabled {
        Some(ProfileStore::open(&config.profile.profile_dir)?)
    } else {
        None
    };

    let dedup = MessageDeduplicator::new(config.pipeline.dedup_window_secs);
    let queue = Arc::new(TaskQueue::new(config.pipeline.queue_max_size, config.pipeline.queue_max_history));
    let flood = FloodGate::new(config.pipeline.batch_window_secs, queue.clone());
    let sender = Arc::new(Sender::new(
        config.sender.cli_command.clone(),
        config.sender.channel.clone(),
        config.sender.chunk_size,
        config.sender.cli_timeout_secs,
    ));
    let bridge = BridgeIndex::open(&format!("{}/../whatsapp_bridge.db", config.database.memory_db_path))?;

    let responder: Arc<dyn Responder> = Arc::new(CognitiveResponder::new(cognition, profile.clone()));
    let worker_pool = MessageWorkerPool::new(
        queue.clone(),
        sender.clone(),
        responder,
        config.pipeline.worker_count,
        config.pipeline.typing_interval_secs,
    );
    let _worker_handles = worker_pool.spawn();
    let _maintenance_handle = maintenance::spawn(memory.clone(), conflicts.clone());

    let host = config.server.host.clone();
    let port = config.server.port;

    let state = Arc::new(app::AppState {
        config,
        started_at: std::time::Instant::now(),
        dedup,
        flood,
        queue,
        sender,
        memory,
        conflicts,
        bridge,
        profile,
    });
    let app_router = app::build_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(%addr, "gateway listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app_router).await?;

    Ok(())
}
