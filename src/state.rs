// src/state.rs
// Application state: the component graph shared by both gateways

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    api::hub::ChannelHub,
    cache::{KvStore, MemoryStore, RedisStore},
    config::RagConfig,
    embeddings::{Embedder, EmbeddingProvider, JinaEmbeddings},
    error::Result,
    http::create_shared_client,
    llm::{GeminiModel, LanguageModel, ResponseGenerator},
    pipeline::QueryOrchestrator,
    retrieval::{QdrantIndex, Retriever, VectorIndex},
    session::SessionStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RagConfig>,

    // -------- Storage --------
    pub cache: Arc<dyn KvStore>,
    pub sessions: Arc<SessionStore>,
    pub index: Arc<dyn VectorIndex>,

    // -------- Pipeline --------
    pub embedder: Arc<Embedder>,
    pub orchestrator: Arc<QueryOrchestrator>,

    // -------- Push delivery --------
    pub hub: Arc<ChannelHub>,
}

/// External collaborators that `AppState::assemble` wires together.
pub struct Components {
    pub cache: Arc<dyn KvStore>,
    pub index: Arc<dyn VectorIndex>,
    pub embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    pub model: Option<Arc<dyn LanguageModel>>,
}

impl AppState {
    /// Wire the pipeline from already-constructed collaborators.
    pub fn assemble(config: RagConfig, components: Components) -> Self {
        let Components {
            cache,
            index,
            embedding_provider,
            model,
        } = components;

        let sessions = Arc::new(SessionStore::new(cache.clone(), config.session_ttl()));
        let embedder = Arc::new(Embedder::new(embedding_provider));
        debug!(embeddings = embedder.provider_name(), "Assembling query pipeline");
        let retriever = Arc::new(Retriever::new(
            embedder.clone(),
            index.clone(),
            config.retrieval_top_k,
        ));
        let generator = Arc::new(ResponseGenerator::new(model));
        let orchestrator = Arc::new(QueryOrchestrator::new(
            cache.clone(),
            retriever,
            generator,
            sessions.clone(),
            config.cache_ttl(),
        ));

        Self {
            config: Arc::new(config),
            cache,
            sessions,
            index,
            embedder,
            orchestrator,
            hub: Arc::new(ChannelHub::new()),
        }
    }

    /// Build the production graph: Redis (or in-process) cache, Qdrant
    /// index, and Jina embeddings and Gemini generation when their keys are
    /// configured.
    pub async fn open(config: RagConfig) -> Result<Self> {
        config.validate()?;

        let cache: Arc<dyn KvStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisStore::connect(url, config.redis_password.as_deref()).await?),
            None => {
                info!("REDIS_URL not set; sessions and answers are kept in process memory");
                Arc::new(MemoryStore::new())
            }
        };

        let http_client = create_shared_client();

        let index = QdrantIndex::open(
            http_client.clone(),
            &config.qdrant_url,
            &config.qdrant_collection,
            config.index_dimension(),
        )
        .await?;
        info!(
            collection = %index.collection_name,
            url = %config.qdrant_url,
            dimension = config.index_dimension(),
            "Vector index ready"
        );

        let embedding_provider: Option<Arc<dyn EmbeddingProvider>> = match &config.jina_api_key {
            Some(key) => Some(Arc::new(JinaEmbeddings::new(key.clone(), http_client.clone()))),
            None => {
                warn!("JINA_API_KEY not set; using local fallback embeddings");
                None
            }
        };

        let model: Option<Arc<dyn LanguageModel>> = match &config.gemini_api_key {
            Some(key) => Some(Arc::new(GeminiModel::new(
                http_client,
                key.clone(),
                config.gemini_model.clone(),
            ))),
            None => {
                warn!("GEMINI_API_KEY not set; queries with documents will get the apology answer");
                None
            }
        };

        Ok(Self::assemble(
            config,
            Components {
                cache,
                index: Arc::new(index),
                embedding_provider,
                model,
            },
        ))
    }

    /// Release the cache. Later cache calls fail as unavailable.
    pub async fn close(&self) {
        self.cache.close().await;
        info!("Application state closed");
    }
}
