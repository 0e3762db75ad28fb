//! API Handlers
//!
//! HTTP request handlers for the inventory endpoints and the asset fallback.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode, Uri},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{AssetRequest, CachedResponse};
use crate::error::{InventoryError, Result};
use crate::images::{self, ImageOptions};
use crate::inventory::{Record, RecordFields, RecordStore};
use crate::models::{
    CacheStatsResponse, DeleteResponse, HealthResponse, ImportResponse, ListQuery, SubmitForm,
    SubmitResponse,
};
use crate::tasks::CacheWorker;
use crate::transfer::{self, EXPORT_FILE_NAME};

/// Largest request body the asset fallback forwards upstream
const MAX_ASSET_BODY: usize = 2 * 1024 * 1024;

/// Headers describing one connection, never copied across it.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Record store, also owns the notifier
    pub store: RecordStore,
    /// Handle to the cache worker
    pub cache: CacheWorker,
    /// Origin that unmatched paths are resolved against
    pub asset_origin: Url,
    pub image: ImageOptions,
}

impl AppState {
    pub fn new(
        store: RecordStore,
        cache: CacheWorker,
        asset_origin: Url,
        image: ImageOptions,
    ) -> Self {
        Self {
            store,
            cache,
            asset_origin,
            image,
        }
    }

    /// Publishes an operation-failed notification for errors.
    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!(kind = err.kind(), "Operation failed: {}", err);
            self.store.notifier().operation_failed(err);
        }
        result
    }
}

/// Handler for POST /api/items
///
/// Creates a record, or updates one when the form carries `edit_id`. A
/// picked image goes through the ingestion pipeline first; on update
/// without an image the stored one is kept.
pub async fn submit_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>> {
    let result: Result<SubmitResponse> = async {
        let form = SubmitForm::from_multipart(multipart).await?;
        let image = match form.image {
            Some(bytes) => Some(images::ingest(bytes, state.image).await?),
            None => None,
        };
        let fields = RecordFields::new(form.name, form.price, image);

        match form.edit_id {
            Some(id) => {
                let record = state.store.update(id, fields).await?;
                Ok(SubmitResponse::updated(record.id))
            }
            None => {
                let id = state.store.create(fields).await?;
                Ok(SubmitResponse::created(id))
            }
        }
    }
    .await;

    state.report(result).map(Json)
}

/// Handler for GET /api/items
///
/// Lists records in ascending id order, filtered by `?q=`.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Record>>> {
    let records = state.store.list(query.filter()).await;
    state.report(records).map(Json)
}

/// Handler for GET /api/items/:id
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Record>> {
    let record = state
        .store
        .get(id)
        .await
        .and_then(|record| record.ok_or(InventoryError::NotFound(id)));
    state.report(record).map(Json)
}

/// Handler for DELETE /api/items/:id
///
/// Deleting an absent id succeeds with `removed: false`.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>> {
    let removed = state.report(state.store.delete(id).await)?;
    Ok(Json(DeleteResponse::new(id, removed)))
}

/// Handler for GET /api/export
///
/// Returns every record as a pretty-printed JSON attachment.
pub async fn export_handler(State(state): State<AppState>) -> Result<Response> {
    let document = state.report(transfer::export(&state.store).await)?;

    let headers = [
        (header::CONTENT_TYPE, "application/json".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
        ),
    ];
    Ok((headers, document).into_response())
}

/// Handler for POST /api/import
///
/// The body is an exported document. Nothing is written unless every
/// entry parses; ids in the document are ignored.
pub async fn import_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportResponse>> {
    let summary = state.report(transfer::import(&state.store, &body).await)?;
    Ok(Json(ImportResponse::new(summary.ids)))
}

/// Handler for GET /api/events
///
/// Streams store notifications as server-sent events.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.store.notifier().subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    let event = Event::default().event(notification.event_name());
                    let event = match event.json_data(&notification) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("Failed to encode notification: {}", e);
                            Event::default().event(notification.event_name())
                        }
                    };
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Event subscriber lagged, skipped {} notifications", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handler for GET /api/cache/stats
pub async fn cache_stats_handler(
    State(state): State<AppState>,
) -> Result<Json<CacheStatsResponse>> {
    let stats = state.cache.stats().await?;
    Ok(Json(stats.into()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let records = state.store.count().await?;
    Ok(Json(HealthResponse::healthy(records)))
}

/// Fallback handler for every other path.
///
/// The path is resolved against the asset origin and handed to the cache
/// worker, which answers from the active region, the network or a
/// degraded fallback.
pub async fn asset_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();

    let url = asset_url(&state.asset_origin, &parts.uri)?;

    let accept = parts
        .headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    let body = axum::body::to_bytes(body, MAX_ASSET_BODY)
        .await
        .map_err(|e| InventoryError::Read(e.to_string()))?;

    let request = AssetRequest::new(parts.method.as_str(), url, accept)
        .with_headers(forwarded_headers(&parts.headers))
        .with_body(body.to_vec());
    let cached = state.cache.fetch(request).await?;

    Ok(into_http_response(cached))
}

/// Places the request path and query under the asset origin.
///
/// The result always has the origin's scheme, host and port, whatever the
/// path looks like.
fn asset_url(origin: &Url, uri: &Uri) -> Result<Url> {
    let mut url = origin.clone();
    let base = origin.path().trim_end_matches('/');
    url.set_path(&format!("{}{}", base, uri.path()));
    url.set_query(uri.query());
    url.set_fragment(None);

    if url.origin() != origin.origin() {
        return Err(InventoryError::InvalidRequest(format!(
            "{} resolves outside the asset origin",
            uri
        )));
    }
    Ok(url)
}

/// End-to-end headers of an incoming request, minus `Host`.
fn forwarded_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| **name != header::HOST && !HOP_BY_HOP.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn into_http_response(cached: CachedResponse) -> Response {
    let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);

    for (name, value) in &cached.headers {
        if HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        match HeaderName::try_from(name.as_str()) {
            Ok(name) => builder = builder.header(name, value.as_str()),
            Err(_) => debug!("Dropping invalid cached header '{}'", name),
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}
