use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};

use crate::domain::collection::{AddBatch, Collection, CollectionQuery, StoreError};
use crate::domain::entry::{
    owner_key, EntryService, Hit, Metadata, QueryRequest, QueryResponse, UpsertRequest,
    UpsertResponse, USER_ID_KEY,
};

/// Entry operations over one shared collection handle.
pub struct EntryServiceImpl {
    collection: Arc<dyn Collection>,
}

impl EntryServiceImpl {
    pub fn new(collection: Arc<dyn Collection>) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl EntryService for EntryServiceImpl {
    async fn upsert_entries(&self, request: UpsertRequest) -> Result<UpsertResponse, StoreError> {
        if request.entries.is_empty() {
            debug!("Empty upsert request, store not contacted.");
            return Ok(UpsertResponse::ok(0));
        }

        let count = request.entries.len();
        let mut batch = AddBatch {
            ids: Vec::with_capacity(count),
            documents: Vec::with_capacity(count),
            metadatas: Vec::with_capacity(count),
        };
        for entry in request.entries {
            batch.metadatas.push(entry.metadata());
            batch.ids.push(entry.id);
            batch.documents.push(entry.text);
        }

        info!("Upserting {} entries.", count);
        if let Err(e) = self.collection.add(batch).await {
            error!("Upsert of {} entries failed: {}", count, e);
            return Err(e);
        }
        Ok(UpsertResponse::ok(count))
    }

    async fn query_entries(&self, request: QueryRequest) -> Result<QueryResponse, StoreError> {
        info!(
            "Querying entries for user {} with top_k {}",
            request.user_id, request.top_k
        );
        let query = CollectionQuery {
            query_texts: vec![request.question],
            n_results: request.top_k,
            filter: Metadata::from([(USER_ID_KEY.to_string(), owner_key(request.user_id))]),
        };
        let result = match self.collection.query(query).await {
            Ok(result) => result,
            Err(e) => {
                error!("Query for user {} failed: {}", request.user_id, e);
                return Err(e);
            }
        };

        // Results are per query text; only one was sent. Missing fields read as empty.
        let documents = result
            .documents
            .and_then(|mut all| (!all.is_empty()).then(|| all.swap_remove(0)))
            .unwrap_or_default();
        let metadatas = result
            .metadatas
            .and_then(|mut all| (!all.is_empty()).then(|| all.swap_remove(0)))
            .unwrap_or_default();

        let hits: Vec<Hit> = documents
            .into_iter()
            .zip(metadatas)
            .map(|(text, metadata)| Hit { text, metadata })
            .collect();
        debug!("Query returned {} hits.", hits.len());
        Ok(QueryResponse { hits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collection::{MockCollection, QueryResult};
    use crate::domain::entry::{Entry, CREATED_AT_KEY};
    use assert_matches::assert_matches;
    use mockall::predicate::function;

    fn entry(id: &str, user_id: i64, text: &str, created_at: Option<&str>) -> Entry {
        Entry {
            id: id.to_string(),
            user_id,
            text: text.to_string(),
            created_at: created_at.map(String::from),
        }
    }

    fn meta(user: &str, created_at: &str) -> Metadata {
        Metadata::from([
            (USER_ID_KEY.to_string(), user.to_string()),
            (CREATED_AT_KEY.to_string(), created_at.to_string()),
        ])
    }

    #[tokio::test]
    async fn test_upsert_empty_does_not_contact_store() {
        let mut mock = MockCollection::new();
        mock.expect_add().never();
        let service = EntryServiceImpl::new(Arc::new(mock));

        let response = service
            .upsert_entries(UpsertRequest { entries: vec![] })
            .await
            .unwrap();
        assert_eq!(response, UpsertResponse::ok(0));
    }

    #[tokio::test]
    async fn test_upsert_builds_parallel_sequences() {
        let mut mock = MockCollection::new();
        mock.expect_add()
            .times(1)
            .with(function(|batch: &AddBatch| {
                batch.ids == vec!["u1_1".to_string(), "u2_1".to_string()]
                    && batch.documents
                        == vec!["had a great day".to_string(), "long meeting".to_string()]
                    && batch.metadatas == vec![meta("1", "2025-01-01"), meta("2", "")]
            }))
            .returning(|_| Ok(()));
        let service = EntryServiceImpl::new(Arc::new(mock));

        let response = service
            .upsert_entries(UpsertRequest {
                entries: vec![
                    entry("u1_1", 1, "had a great day", Some("2025-01-01")),
                    entry("u2_1", 2, "long meeting", None),
                ],
            })
            .await
            .unwrap();
        assert_eq!(response, UpsertResponse::ok(2));
    }

    #[tokio::test]
    async fn test_upsert_propagates_store_error() {
        let mut mock = MockCollection::new();
        mock.expect_add()
            .returning(|_| Err(StoreError::Backend("connection refused".to_string())));
        let service = EntryServiceImpl::new(Arc::new(mock));

        let result = service
            .upsert_entries(UpsertRequest {
                entries: vec![entry("a", 1, "text", None)],
            })
            .await;
        assert_matches!(result, Err(StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn test_query_filters_on_stringified_user_id() {
        let mut mock = MockCollection::new();
        mock.expect_query()
            .times(1)
            .with(function(|query: &CollectionQuery| {
                query.query_texts == vec!["great day".to_string()]
                    && query.n_results == 3
                    && query.filter == Metadata::from([(USER_ID_KEY.to_string(), "17".to_string())])
            }))
            .returning(|_| {
                Ok(QueryResult {
                    ids: vec![vec!["a".into(), "b".into()]],
                    documents: Some(vec![vec!["had a great day".into(), "ok day".into()]]),
                    metadatas: Some(vec![vec![meta("17", "2025-11-21"), meta("17", "")]]),
                    distances: Some(vec![vec![0.1, 0.4]]),
                })
            });
        let service = EntryServiceImpl::new(Arc::new(mock));

        let response = service
            .query_entries(QueryRequest {
                user_id: 17,
                question: "great day".to_string(),
                top_k: 3,
            })
            .await
            .unwrap();
        assert_eq!(
            response.hits,
            vec![
                Hit {
                    text: "had a great day".to_string(),
                    metadata: meta("17", "2025-11-21"),
                },
                Hit {
                    text: "ok day".to_string(),
                    metadata: meta("17", ""),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_query_missing_fields_yield_no_hits() {
        let mut mock = MockCollection::new();
        mock.expect_query().returning(|_| {
            Ok(QueryResult {
                ids: vec![vec!["a".into()]],
                documents: None,
                metadatas: Some(vec![vec![meta("1", "")]]),
                distances: None,
            })
        });
        let service = EntryServiceImpl::new(Arc::new(mock));

        let response = service
            .query_entries(QueryRequest {
                user_id: 1,
                question: "anything".to_string(),
                top_k: 5,
            })
            .await
            .unwrap();
        assert!(response.hits.is_empty());
    }

    #[tokio::test]
    async fn test_query_empty_outer_lists_yield_no_hits() {
        let mut mock = MockCollection::new();
        mock.expect_query().returning(|_| {
            Ok(QueryResult {
                ids: vec![],
                documents: Some(vec![]),
                metadatas: Some(vec![]),
                distances: None,
            })
        });
        let service = EntryServiceImpl::new(Arc::new(mock));

        let response = service
            .query_entries(QueryRequest {
                user_id: 1,
                question: "anything".to_string(),
                top_k: 5,
            })
            .await
            .unwrap();
        assert_eq!(response, QueryResponse { hits: vec![] });
    }
}
