use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::entry::{QueryRequest, QueryResponse, UpsertRequest, UpsertResponse};
use crate::server::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub collection: String,
    pub backend: String,
}

// Maps axum's JSON rejection (syntax, missing field, wrong type, content type) to a 422
fn validated<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            let detail = rejection.body_text();
            log::warn!("Rejected request body: {}", detail);
            Err(ApiError::Validation(detail))
        }
    }
}

/// POST /upsert_entries
pub async fn upsert_entries(
    State(state): State<AppState>,
    payload: Result<Json<UpsertRequest>, JsonRejection>,
) -> Result<Json<UpsertResponse>, ApiError> {
    let request = validated(payload)?;
    let response = state.entries.upsert_entries(request).await?;
    Ok(Json(response))
}

/// POST /query
pub async fn query_entries(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let request = validated(payload)?;
    if request.top_k == 0 {
        return Err(ApiError::Validation("top_k must be greater than zero".to_string()));
    }
    let response = state.entries.query_entries(request).await?;
    Ok(Json(response))
}

/// GET /health. Does not touch the store.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        collection: state.collection_name.clone(),
        backend: state.backend.to_string(),
    })
}
