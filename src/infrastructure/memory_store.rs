//! In-process collection backend.
//!
//! Records live in a map guarded by a read/write lock; queries are a linear
//! cosine-similarity scan over the records that pass the metadata filter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::collection::{
    filter_matches, AddBatch, Collection, CollectionQuery, QueryResult, StoreError,
};
use crate::domain::embedder::Embedder;
use crate::domain::entry::Metadata;
use crate::infrastructure::embedding::{cosine_similarity, embed_blocking};

#[derive(Debug, Clone)]
struct StoredRecord {
    document: String,
    metadata: Metadata,
    embedding: Vec<f32>,
    // Insertion sequence, used to break similarity ties deterministically
    seq: u64,
}

#[derive(Default)]
struct Records {
    by_id: HashMap<String, StoredRecord>,
    next_seq: u64,
}

pub struct MemoryCollection {
    name: String,
    embedder: Arc<dyn Embedder>,
    records: RwLock<Records>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            name: name.into(),
            embedder,
            records: RwLock::new(Records::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn add(&self, batch: AddBatch) -> Result<(), StoreError> {
        batch.validate()?;
        if batch.is_empty() {
            return Ok(());
        }
        log::debug!("Embedding {} documents for collection '{}'", batch.len(), self.name);
        let embeddings = embed_blocking(self.embedder.clone(), batch.documents.clone()).await?;

        // One write lock for the whole batch: concurrent queries see all of it or none.
        let mut records = self.records.write();
        for (((id, document), metadata), embedding) in batch
            .ids
            .into_iter()
            .zip(batch.documents)
            .zip(batch.metadatas)
            .zip(embeddings)
        {
            let seq = records.next_seq;
            records.next_seq += 1;
            records.by_id.insert(
                id,
                StoredRecord {
                    document,
                    metadata,
                    embedding,
                    seq,
                },
            );
        }
        log::info!(
            "Collection '{}' now holds {} records.",
            self.name,
            records.by_id.len()
        );
        Ok(())
    }

    async fn query(&self, query: CollectionQuery) -> Result<QueryResult, StoreError> {
        if query.n_results == 0 {
            return Err(StoreError::InvalidResultCount);
        }
        let query_vectors = embed_blocking(self.embedder.clone(), query.query_texts.clone()).await?;

        let records = self.records.read();
        let mut result = QueryResult {
            ids: Vec::with_capacity(query_vectors.len()),
            documents: Some(Vec::with_capacity(query_vectors.len())),
            metadatas: Some(Vec::with_capacity(query_vectors.len())),
            distances: Some(Vec::with_capacity(query_vectors.len())),
        };

        for query_vector in &query_vectors {
            let mut scored: Vec<(&String, &StoredRecord, f32)> = records
                .by_id
                .iter()
                .filter(|(_, record)| filter_matches(&query.filter, &record.metadata))
                .map(|(id, record)| (id, record, cosine_similarity(query_vector, &record.embedding)))
                .collect();
            scored.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.1.seq.cmp(&b.1.seq)));
            scored.truncate(query.n_results);

            result.ids.push(scored.iter().map(|(id, _, _)| (*id).clone()).collect());
            if let Some(documents) = result.documents.as_mut() {
                documents.push(scored.iter().map(|(_, r, _)| r.document.clone()).collect());
            }
            if let Some(metadatas) = result.metadatas.as_mut() {
                metadatas.push(scored.iter().map(|(_, r, _)| r.metadata.clone()).collect());
            }
            if let Some(distances) = result.distances.as_mut() {
                distances.push(scored.iter().map(|(_, _, score)| 1.0 - score).collect());
            }
        }
        Ok(result)
    }
}
