//! API Routes
//!
//! Configures the Axum router with the inventory endpoints and the asset
//! fallback.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    asset_handler, cache_stats_handler, delete_handler, events_handler, export_handler,
    get_handler, health_handler, import_handler, list_handler, submit_handler, AppState,
};

/// Upper bound for uploads, camera photos included
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /api/items?q=` - List records matching the filter
/// - `POST /api/items` - Submit form (create, or update with `edit_id`)
/// - `GET /api/items/:id` - Fetch one record
/// - `DELETE /api/items/:id` - Delete a record
/// - `GET /api/export` - Download all records as JSON
/// - `POST /api/import` - Import an exported document
/// - `GET /api/events` - Change notifications (SSE)
/// - `GET /api/cache/stats` - Cache statistics
/// - `GET /health` - Health check endpoint
/// - anything else - Static assets through the cache worker
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/items", get(list_handler).post(submit_handler))
        .route("/api/items/:id", get(get_handler).delete(delete_handler))
        .route("/api/export", get(export_handler))
        .route("/api/import", post(import_handler))
        .route("/api/events", get(events_handler))
        .route("/api/cache/stats", get(cache_stats_handler))
        .route("/health", get(health_handler))
        .fallback(asset_handler)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;
    use url::Url;

    use crate::cache::fetcher::testing::StaticFetcher;
    use crate::cache::{CacheController, CacheStorage};
    use crate::events::Notifier;
    use crate::images::ImageOptions;
    use crate::inventory::RecordStore;
    use crate::tasks::spawn_cache_worker;

    const BOUNDARY: &str = "X-INVENTORY-BOUNDARY";

    async fn create_test_app() -> Router {
        let store = RecordStore::in_memory(Notifier::new()).await.unwrap();
        let origin = Url::parse("http://assets.local/").unwrap();
        let controller = CacheController::new(
            origin.clone(),
            CacheStorage::in_memory(),
            Arc::new(StaticFetcher::new()),
        );
        let (worker, _handle) = spawn_cache_worker(Arc::new(controller));
        create_router(AppState::new(store, worker, origin, ImageOptions::default()))
    }

    fn form(fields: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        Request::builder()
            .method("POST")
            .uri("/api/items")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cache_stats_endpoint() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/cache/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submit_endpoint() {
        let app = create_test_app().await;

        let response = app
            .oneshot(form(&[("name", "Widget"), ("price", "9.99")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_price() {
        let app = create_test_app().await;

        let response = app
            .oneshot(form(&[("name", "Widget"), ("price", "cheap")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/items/99")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_asset_is_forwarded() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/missing.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Not activated yet, so the upstream 404 comes straight through
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
