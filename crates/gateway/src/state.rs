//! Application context shared by every handler

use std::sync::Arc;

use convorag_common::{
    config::AppConfig,
    embeddings::create_embedder,
    errors::Result,
    llm::create_chat_model,
};
use convorag_context::{Responder, ResponderOptions, SessionStore};
use convorag_ingestion::{Chunker, DocumentProcessor};
use convorag_search::{Retriever, VectorIndex};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

/// Built once at startup and cloned into each request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub index: Arc<VectorIndex>,
    pub sessions: Arc<SessionStore>,
    pub processor: Arc<DocumentProcessor>,
    pub responder: Arc<Responder>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire up every component from configuration, restoring a persisted index if present
    pub async fn build(config: AppConfig, metrics: Option<PrometheusHandle>) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        info!(
            model = embedder.model_name(),
            dimension = embedder.dimension(),
            "Embedder ready"
        );

        let index = Arc::new(VectorIndex::load(embedder, config.vector_store_dir()).await);
        let chat_model = create_chat_model(&config.llm)?;
        let processor = Arc::new(DocumentProcessor::new(Chunker::new(&config.chunking)?));
        let sessions = Arc::new(SessionStore::from_config(&config.session));

        let retriever: Arc<dyn Retriever> = index.clone();
        let responder = Arc::new(Responder::new(
            retriever,
            chat_model,
            ResponderOptions::from(&config.retrieval),
        ));

        info!(
            llm_enabled = responder.generation_enabled(),
            persist = config.vector_store.persist,
            "Application state built"
        );

        Ok(Self {
            config: Arc::new(config),
            index,
            sessions,
            processor,
            responder,
            metrics,
        })
    }
}
