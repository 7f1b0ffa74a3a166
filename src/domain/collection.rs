// Store-facing contract: a named collection of (id, document, metadata) records
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entry::Metadata;

/// Conjunction of metadata equality predicates, e.g. `{"user_id": "1"}`.
pub type MetadataFilter = Metadata;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("batch lengths differ: {ids} ids, {documents} documents, {metadatas} metadatas")]
    MismatchedBatch {
        ids: usize,
        documents: usize,
        metadatas: usize,
    },
    #[error("n_results must be greater than zero")]
    InvalidResultCount,
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("embedding dimension ({actual}) does not match collection dimension ({expected})")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Records to add, as three parallel sequences. Index `i` of each describes one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddBatch {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl AddBatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        let ids = self.ids.len();
        if self.documents.len() != ids || self.metadatas.len() != ids {
            return Err(StoreError::MismatchedBatch {
                ids,
                documents: self.documents.len(),
                metadatas: self.metadatas.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    pub query_texts: Vec<String>,
    pub n_results: usize,
    pub filter: MetadataFilter,
}

/// Query output, one inner list per query text, ordered most similar first.
///
/// Backends leave a field `None` when they cannot supply it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Option<Vec<Vec<String>>>,
    pub metadatas: Option<Vec<Vec<Metadata>>>,
    pub distances: Option<Vec<Vec<f32>>>,
}

pub fn filter_matches(filter: &MetadataFilter, metadata: &Metadata) -> bool {
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Collection: Send + Sync {
    /// Inserts the batch, overwriting records whose id already exists.
    async fn add(&self, batch: AddBatch) -> Result<(), StoreError>;

    async fn query(&self, query: CollectionQuery) -> Result<QueryResult, StoreError>;
}
