// Qdrant-backed collection. Embeddings are computed locally, then written as points.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

pub use qdrant_client; // Re-export so tests can build clients without a direct dependency
use self::qdrant_client::qdrant::value::Kind as QdrantValueKind;
use self::qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use self::qdrant_client::{Payload, Qdrant};

use crate::domain::collection::{AddBatch, Collection, CollectionQuery, QueryResult, StoreError};
use crate::domain::embedder::Embedder;
use crate::domain::entry::Metadata;
use crate::infrastructure::embedding::embed_blocking;

// Payload keys that are not part of the record's metadata
const DOCUMENT_KEY: &str = "document";
const ENTRY_ID_KEY: &str = "entry_id";

/// Qdrant point ids must be integers or UUIDs, so entry ids are mapped to a
/// name-based UUID. The same entry id always lands on the same point, which
/// makes `add` overwrite.
pub fn point_id_for(entry_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, entry_id.as_bytes()).to_string()
}

pub struct QdrantCollection {
    client: Qdrant,
    collection_name: String,
    embedder: Arc<dyn Embedder>,
}

impl QdrantCollection {
    /// Creates a handle; call [`QdrantCollection::initialize_collection`] before use.
    pub fn new(
        client: Qdrant,
        collection_name: String,
        embedder: Arc<dyn Embedder>,
    ) -> anyhow::Result<Self> {
        if collection_name.is_empty() {
            return Err(anyhow::anyhow!("Collection name cannot be empty"));
        }
        if embedder.dimension() == 0 {
            return Err(anyhow::anyhow!("Vector size must be greater than zero"));
        }
        Ok(Self {
            client,
            collection_name,
            embedder,
        })
    }

    pub fn name(&self) -> &str {
        &self.collection_name
    }

    /// Creates the collection (cosine distance) if it doesn't exist yet.
    pub async fn initialize_collection(&self) -> anyhow::Result<()> {
        log::info!("Checking if collection '{}' exists...", self.collection_name);
        if self.client.collection_exists(&self.collection_name).await? {
            log::info!("Collection '{}' already exists.", self.collection_name);
            return Ok(());
        }

        let vector_size = self.embedder.dimension() as u64;
        log::info!(
            "Creating collection '{}' with size {} and distance Cosine...",
            self.collection_name,
            vector_size
        );
        let create = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine));

        match self.client.create_collection(create).await {
            Ok(_) => {
                log::info!("Successfully created collection '{}'.", self.collection_name);
                Ok(())
            }
            // Another instance may have created it between the check and the create
            Err(e) if e.to_string().contains("already exists") => {
                log::warn!("Collection '{}' was created concurrently.", self.collection_name);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to create collection '{}': {}", self.collection_name, e);
                Err(anyhow::anyhow!("Failed to create collection: {}", e))
            }
        }
    }

    fn build_point(
        id: &str,
        document: &str,
        metadata: &Metadata,
        vector: Vec<f32>,
    ) -> Result<PointStruct, StoreError> {
        let mut payload_value = serde_json::Map::new();
        for (key, value) in metadata {
            payload_value.insert(key.clone(), serde_json::Value::String(value.clone()));
        }
        payload_value.insert(DOCUMENT_KEY.to_string(), document.into());
        payload_value.insert(ENTRY_ID_KEY.to_string(), id.into());

        let payload = Payload::try_from(serde_json::Value::Object(payload_value))
            .map_err(|e| StoreError::Backend(format!("invalid payload for '{}': {}", id, e)))?;
        Ok(PointStruct::new(point_id_for(id), vector, payload))
    }

    // Splits a point payload back into (entry id, document, metadata)
    fn split_payload(
        payload: HashMap<String, QdrantValue>,
    ) -> Option<(String, String, Metadata)> {
        let mut entry_id = None;
        let mut document = None;
        let mut metadata = Metadata::new();
        for (key, value) in payload {
            let text = match value.kind {
                Some(QdrantValueKind::StringValue(s)) => s,
                Some(QdrantValueKind::IntegerValue(i)) => i.to_string(),
                Some(QdrantValueKind::DoubleValue(d)) => d.to_string(),
                Some(QdrantValueKind::BoolValue(b)) => b.to_string(),
                _ => continue,
            };
            match key.as_str() {
                DOCUMENT_KEY => document = Some(text),
                ENTRY_ID_KEY => entry_id = Some(text),
                _ => {
                    metadata.insert(key, text);
                }
            }
        }
        Some((entry_id?, document?, metadata))
    }

    fn build_filter(filter: &Metadata) -> Option<Filter> {
        if filter.is_empty() {
            return None;
        }
        Some(Filter::must(
            filter
                .iter()
                .map(|(key, value)| Condition::matches(key.as_str(), value.clone())),
        ))
    }
}

#[async_trait]
impl Collection for QdrantCollection {
    async fn add(&self, batch: AddBatch) -> Result<(), StoreError> {
        batch.validate()?;
        if batch.is_empty() {
            log::info!("No documents provided for upsert.");
            return Ok(());
        }

        let vectors = embed_blocking(self.embedder.clone(), batch.documents.clone()).await?;
        let points = batch
            .ids
            .iter()
            .zip(&batch.documents)
            .zip(&batch.metadatas)
            .zip(vectors)
            .map(|(((id, document), metadata), vector)| {
                Self::build_point(id, document, metadata, vector)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let points_count = points.len();
        log::info!(
            "Upserting {} points into collection '{}'...",
            points_count,
            self.collection_name
        );
        let upsert = UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true);
        match self.client.upsert_points(upsert).await {
            Ok(response) => {
                log::debug!("Upsert response: {:?}", response);
                Ok(())
            }
            Err(e) => {
                log::error!(
                    "Failed to upsert points into collection '{}': {}",
                    self.collection_name,
                    e
                );
                Err(StoreError::Backend(format!("Qdrant upsert failed: {}", e)))
            }
        }
    }

    async fn query(&self, query: CollectionQuery) -> Result<QueryResult, StoreError> {
        if query.n_results == 0 {
            return Err(StoreError::InvalidResultCount);
        }
        let query_vectors = embed_blocking(self.embedder.clone(), query.query_texts.clone()).await?;
        let filter = Self::build_filter(&query.filter);

        let mut result = QueryResult {
            ids: Vec::new(),
            documents: Some(Vec::new()),
            metadatas: Some(Vec::new()),
            distances: Some(Vec::new()),
        };

        for vector in query_vectors {
            let mut search =
                SearchPointsBuilder::new(self.collection_name.clone(), vector, query.n_results as u64)
                    .with_payload(true);
            if let Some(filter) = filter.clone() {
                search = search.filter(filter);
            }

            let response = self.client.search_points(search).await.map_err(|e| {
                log::error!("Qdrant search failed in collection '{}': {}", self.collection_name, e);
                StoreError::Backend(format!("Qdrant search failed: {}", e))
            })?;
            log::debug!("Search returned {} points.", response.result.len());

            let (mut ids, mut documents, mut metadatas, mut distances) =
                (Vec::new(), Vec::new(), Vec::new(), Vec::new());
            for ScoredPoint { id, payload, score, .. } in response.result {
                match Self::split_payload(payload) {
                    Some((entry_id, document, metadata)) => {
                        ids.push(entry_id);
                        documents.push(document);
                        metadatas.push(metadata);
                        distances.push(1.0 - score);
                    }
                    None => log::warn!("Point {:?} has an incomplete payload, skipping.", id),
                }
            }
            result.ids.push(ids);
            if let Some(all) = result.documents.as_mut() {
                all.push(documents);
            }
            if let Some(all) = result.metadatas.as_mut() {
                all.push(metadatas);
            }
            if let Some(all) = result.distances.as_mut() {
                all.push(distances);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable_per_entry() {
        assert_eq!(point_id_for("u1_1"), point_id_for("u1_1"));
        assert_ne!(point_id_for("u1_1"), point_id_for("u1_2"));
        assert!(Uuid::parse_str(&point_id_for("anything")).is_ok());
    }

    #[test]
    fn test_split_payload_separates_reserved_keys() {
        let payload: HashMap<String, QdrantValue> = HashMap::from([
            (DOCUMENT_KEY.to_string(), QdrantValue::from("had a great day".to_string())),
            (ENTRY_ID_KEY.to_string(), QdrantValue::from("u1_1".to_string())),
            ("user_id".to_string(), QdrantValue::from("1".to_string())),
            ("created_at".to_string(), QdrantValue::from("2025-01-01".to_string())),
        ]);
        let (entry_id, document, metadata) = QdrantCollection::split_payload(payload).unwrap();
        assert_eq!(entry_id, "u1_1");
        assert_eq!(document, "had a great day");
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["user_id"], "1");
        assert_eq!(metadata["created_at"], "2025-01-01");
    }

    #[test]
    fn test_split_payload_requires_document() {
        let payload: HashMap<String, QdrantValue> = HashMap::from([(
            ENTRY_ID_KEY.to_string(),
            QdrantValue::from("u1_1".to_string()),
        )]);
        assert!(QdrantCollection::split_payload(payload).is_none());
    }

    #[test]
    fn test_build_filter_empty_is_none() {
        assert!(QdrantCollection::build_filter(&Metadata::new()).is_none());
        let filter = QdrantCollection::build_filter(&Metadata::from([(
            "user_id".to_string(),
            "7".to_string(),
        )]))
        .unwrap();
        assert_eq!(filter.must.len(), 1);
    }
}
