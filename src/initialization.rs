use crate::application::entry_service::EntryServiceImpl;
use crate::config::{AppConfig, EmbeddingConfig, EmbeddingProvider, StoreBackend};
use crate::domain::embedder::Embedder;
use crate::infrastructure::{EmbeddingModel, FastEmbedder, HashingEmbedder, StoreClient};
use crate::server::AppState;

use anyhow::Result;
use std::sync::Arc;

const EMBEDDING_MODEL: EmbeddingModel = EmbeddingModel::AllMiniLML6V2;

/// Builds the configured embedder. Model loading runs on the blocking pool.
pub async fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::FastEmbed => {
            let cache_dir = config.cache_dir.clone();
            log::info!("Loading embedding model {:?} (cache: {:?})...", EMBEDDING_MODEL, cache_dir);
            let embedder =
                tokio::task::spawn_blocking(move || FastEmbedder::new(EMBEDDING_MODEL, cache_dir))
                    .await?;
            match embedder {
                Ok(embedder) => Ok(Arc::new(embedder)),
                Err(e) => {
                    log::error!("Failed to create FastEmbedder: {:?}", e);
                    Err(e)
                }
            }
        }
        EmbeddingProvider::Hashing => {
            log::info!("Using hashing embedder with dimension {}.", config.dimension);
            Ok(Arc::new(HashingEmbedder::new(config.dimension)))
        }
    }
}

pub fn build_store_client(config: &AppConfig, embedder: Arc<dyn Embedder>) -> StoreClient {
    match config.store.backend {
        StoreBackend::Memory => StoreClient::in_memory(embedder),
        StoreBackend::Qdrant => StoreClient::qdrant(config.store.qdrant_url.clone(), embedder),
    }
}

/// Wires embedder, store client and the single process-wide collection handle.
pub async fn initialize_services(config: &AppConfig) -> Result<AppState> {
    let embedder = build_embedder(&config.embedding).await?;
    let client = build_store_client(config, embedder);
    let collection = client
        .get_or_create_collection(&config.store.collection_name)
        .await?;
    log::info!(
        "Collection '{}' ready on the {} backend.",
        config.store.collection_name,
        client.backend_name()
    );

    Ok(AppState {
        entries: Arc::new(EntryServiceImpl::new(collection)),
        collection_name: config.store.collection_name.clone(),
        backend: client.backend_name(),
    })
}
