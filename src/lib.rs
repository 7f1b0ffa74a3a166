pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod initialization;
pub mod server;

/// Re-export necessary items for main.rs and tests
pub use application::entry_service::EntryServiceImpl;
pub use config::{load_config, AppConfig};
pub use domain::collection::{AddBatch, Collection, CollectionQuery, QueryResult, StoreError};
pub use domain::embedder::Embedder;
pub use domain::entry::{
    owner_key, Entry, EntryService, Hit, Metadata, QueryRequest, QueryResponse, UpsertRequest,
    UpsertResponse,
};
pub use infrastructure::vector_db::qdrant_client;
pub use infrastructure::{HashingEmbedder, MemoryCollection, QdrantCollection, StoreClient};
pub use server::{create_router, AppState};
