use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::collection::StoreError;

/// Metadata attached to every stored record. Values are always strings so the
/// store's equality filter compares like with like.
pub type Metadata = BTreeMap<String, String>;

pub const USER_ID_KEY: &str = "user_id";
pub const CREATED_AT_KEY: &str = "created_at";

const DEFAULT_TOP_K: usize = 5;

/// String form of a user id as written to (and filtered on in) the store.
///
/// Both the write path and the read path must go through this function,
/// otherwise per-user filtering silently matches nothing.
pub fn owner_key(user_id: i64) -> String {
    user_id.to_string()
}

// A single diary entry as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String, // e.g. "user_1_2025-11-21_1"
    pub user_id: i64,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Entry {
    /// Metadata stored alongside the entry text.
    pub fn metadata(&self) -> Metadata {
        Metadata::from([
            (USER_ID_KEY.to_string(), owner_key(self.user_id)),
            (
                CREATED_AT_KEY.to_string(),
                self.created_at.clone().unwrap_or_default(),
            ),
        ])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub status: String,
    pub count: usize,
}

impl UpsertResponse {
    pub fn ok(count: usize) -> Self {
        Self {
            status: "ok".to_string(),
            count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub user_id: i64,
    pub question: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

// A document returned by a similarity query, paired with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub text: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub hits: Vec<Hit>,
}

#[async_trait]
pub trait EntryService: Send + Sync {
    /// Writes every entry into the collection. An empty batch never reaches the store.
    async fn upsert_entries(&self, request: UpsertRequest) -> Result<UpsertResponse, StoreError>;

    /// Returns up to `top_k` entries owned by `user_id`, most similar first.
    async fn query_entries(&self, request: QueryRequest) -> Result<QueryResponse, StoreError>;
}
