use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::Mutex;

use crate::domain::collection::Collection;
use crate::domain::embedder::Embedder;
use crate::infrastructure::memory_store::MemoryCollection;
use crate::infrastructure::vector_db::{qdrant_client::Qdrant, QdrantCollection};

enum Backend {
    Memory,
    Qdrant { url: String },
}

/// Hands out named collections on one backend. Asking twice for the same
/// name returns the same handle.
pub struct StoreClient {
    backend: Backend,
    embedder: Arc<dyn Embedder>,
    collections: Mutex<HashMap<String, Arc<dyn Collection>>>,
}

impl StoreClient {
    /// Embedded client: collections live in this process.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_backend(Backend::Memory, embedder)
    }

    pub fn qdrant(url: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        Self::with_backend(Backend::Qdrant { url: url.into() }, embedder)
    }

    fn with_backend(backend: Backend, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            backend,
            embedder,
            collections: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Memory => "memory",
            Backend::Qdrant { .. } => "qdrant",
        }
    }

    pub async fn get_or_create_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        if name.is_empty() {
            return Err(anyhow!("Collection name cannot be empty"));
        }
        let mut collections = self.collections.lock().await;
        if let Some(existing) = collections.get(name) {
            return Ok(existing.clone());
        }

        let collection: Arc<dyn Collection> = match &self.backend {
            Backend::Memory => {
                let memory = MemoryCollection::new(name, self.embedder.clone());
                log::info!("Created in-memory collection '{}'.", memory.name());
                Arc::new(memory)
            }
            Backend::Qdrant { url } => {
                log::info!("Connecting to Qdrant at {}...", url);
                let client = Qdrant::from_url(url).build()?;
                let qdrant = QdrantCollection::new(client, name.to_string(), self.embedder.clone())?;
                qdrant.initialize_collection().await?;
                log::info!("Qdrant collection '{}' is ready.", qdrant.name());
                Arc::new(qdrant)
            }
        };
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }
}
