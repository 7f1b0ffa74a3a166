pub mod embedding;
pub mod memory_store;
pub mod store_client;
pub mod vector_db;

// Re-export key types for easier access from the application layer
pub use embedding::{FastEmbedder, HashingEmbedder};
pub use memory_store::MemoryCollection;
pub use store_client::StoreClient;
pub use vector_db::QdrantCollection;

// Re-export EmbeddingModel directly from the dependency
pub use fastembed::EmbeddingModel;
