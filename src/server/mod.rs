//! HTTP surface.
//!
//! # Endpoints
//!
//! - `POST /upsert_entries` - Add or overwrite diary entries
//! - `POST /query` - Similarity search over one user's entries
//! - `GET /health` - Liveness and the collection being served

pub mod error;
pub mod handler;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::domain::entry::EntryService;

/// Shared application state. The entry service wraps the single
/// process-wide collection handle.
#[derive(Clone)]
pub struct AppState {
    pub entries: Arc<dyn EntryService>,
    pub collection_name: String,
    pub backend: &'static str,
}

/// Builds the router. Request bodies are not size-capped: a batch upsert of
/// any size is a valid request.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/upsert_entries", post(handler::upsert_entries))
        .route("/query", post(handler::query_entries))
        .route("/health", get(handler::health))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Binds `addr` and serves until Ctrl-C or SIGTERM.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("Shutdown signal received, draining connections.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collection::StoreError;
    use crate::domain::entry::{QueryRequest, QueryResponse, UpsertRequest, UpsertResponse};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Mutex;
    use tower::ServiceExt;

    // Records calls and fails every store interaction
    #[derive(Default)]
    struct FailingEntryService {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl EntryService for FailingEntryService {
        async fn upsert_entries(&self, _request: UpsertRequest) -> Result<UpsertResponse, StoreError> {
            *self.calls.lock().unwrap() += 1;
            Err(StoreError::Backend("store unavailable".to_string()))
        }

        async fn query_entries(&self, _request: QueryRequest) -> Result<QueryResponse, StoreError> {
            *self.calls.lock().unwrap() += 1;
            Err(StoreError::Backend("store unavailable".to_string()))
        }
    }

    fn router_with(service: Arc<FailingEntryService>) -> Router {
        create_router(AppState {
            entries: service,
            collection_name: "diary_entries".to_string(),
            backend: "memory",
        })
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_500() {
        let service = Arc::new(FailingEntryService::default());
        let router = router_with(service.clone());

        let response = router
            .oneshot(post_json("/query", r#"{"user_id":1,"question":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Internal Server Error");
        assert_eq!(*service.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_field_is_rejected_before_store() {
        let service = Arc::new(FailingEntryService::default());
        let router = router_with(service.clone());

        let response = router
            .oneshot(post_json(
                "/upsert_entries",
                r#"{"entries":[{"id":"a","text":"no owner"}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("user_id"));
        assert_eq!(*service.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let service = Arc::new(FailingEntryService::default());
        let router = router_with(service.clone());

        let response = router
            .oneshot(post_json("/query", r#"{"user_id":1,"question":"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(*service.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_top_k_is_rejected() {
        let service = Arc::new(FailingEntryService::default());
        let router = router_with(service.clone());

        let response = router
            .oneshot(post_json("/query", r#"{"user_id":1,"question":"hi","top_k":0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(*service.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let service = Arc::new(FailingEntryService::default());
        let router = router_with(service.clone());

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["collection"], "diary_entries");
        assert_eq!(body["backend"], "memory");
        assert_eq!(*service.calls.lock().unwrap(), 0);
    }
}
