use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Feed, FeedEvent, Item};
use crate::services::{catalog, engagement, feed, session, ConnectionRegistry};

use super::AppState;

/// How long a stream waits for a queued event before emitting a keepalive
/// ping; the stream never terminates on idle
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub preferred_tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EngagementRequest {
    pub session_id: String,
    pub item_id: String,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked_tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DislikeResponse {
    pub disliked_tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub id: String,
    pub url: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopItemsQuery {
    pub count: Option<usize>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Round-trip health check against the store
pub async fn health_redis(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.store.ping().await?;
    Ok(StatusCode::OK)
}

/// Create a session seeded with the caller's preferred tags
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> AppResult<(StatusCode, Json<CreateSessionResponse>)> {
    let session_id =
        session::create_session(&state.store, state.session_ttl_secs, &request.preferred_tags)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id }),
    ))
}

/// Next feed page for a session
pub async fn get_feed(
    State(state): State<AppState>,
    Query(params): Query<SessionQuery>,
) -> AppResult<Json<Feed>> {
    let feed =
        feed::generate_feed(&state.store, state.session_ttl_secs, &params.session_id).await?;
    Ok(Json(feed))
}

/// Record a like and return the affected tags
pub async fn like(
    State(state): State<AppState>,
    Json(request): Json<EngagementRequest>,
) -> AppResult<Json<LikeResponse>> {
    let liked_tags = feed::like(
        &state.store,
        &state.registry,
        state.session_ttl_secs,
        &request.session_id,
        &request.item_id,
    )
    .await?;
    Ok(Json(LikeResponse { liked_tags }))
}

/// Record a dislike and return the affected tags
pub async fn dislike(
    State(state): State<AppState>,
    Json(request): Json<EngagementRequest>,
) -> AppResult<Json<DislikeResponse>> {
    let disliked_tags = feed::dislike(
        &state.store,
        &state.registry,
        state.session_ttl_secs,
        &request.session_id,
        &request.item_id,
    )
    .await?;
    Ok(Json(DislikeResponse { disliked_tags }))
}

/// Ingest one item into the catalog
pub async fn create_item(
    State(state): State<AppState>,
    Json(request): Json<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let item = Item::new(request.id, request.url, request.tags);
    catalog::store_item(&state.store, &item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Most popular items catalog-wide
pub async fn top_items(
    State(state): State<AppState>,
    Query(params): Query<TopItemsQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let count = params.count.unwrap_or(feed::VISIBLE_COUNT);
    let ids = engagement::top_global(&state.store, count).await?;

    let mut items = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(item) = catalog::get_item(&state.store, id).await? {
            items.push(item);
        }
    }
    Ok(Json(items))
}

/// Unregisters the stream's subscriber when the connection goes away, however
/// that happens (client disconnect, eviction, server shutdown)
struct StreamGuard {
    registry: Arc<ConnectionRegistry>,
    session_id: String,
    subscriber_id: Uuid,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.session_id, self.subscriber_id);
    }
}

fn sse_event(event: &FeedEvent) -> Result<Event, Infallible> {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Event serialization error");
        "{}".to_string()
    });
    Ok(Event::default().data(data))
}

/// Builds one subscriber's event stream: a `connected` event, then whatever
/// the broadcaster queues, with a `ping` after every `idle_timeout` of
/// silence
///
/// The idle timeout never ends the stream; only eviction from the registry
/// or the client going away does. Exposed separately from the handler so the
/// timeout can be shortened under test.
pub fn update_stream(
    registry: Arc<ConnectionRegistry>,
    session_id: String,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let (subscriber_id, rx) = registry.register(&session_id);
    let guard = StreamGuard {
        registry,
        session_id: session_id.clone(),
        subscriber_id,
    };

    let connected = sse_event(&FeedEvent::Connected { session_id });

    // The guard rides along in the stream state so dropping the stream
    // deterministically unregisters the queue.
    let updates = stream::unfold((rx, guard), move |(mut rx, guard)| async move {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(event)) => Some((sse_event(&event), (rx, guard))),
            // Sender dropped: this subscriber was evicted from the registry.
            Ok(None) => None,
            Err(_) => Some((sse_event(&FeedEvent::Ping), (rx, guard))),
        }
    });

    stream::once(async move { connected }).chain(updates)
}

/// Live update stream for a session
pub async fn stream_updates(
    State(state): State<AppState>,
    Query(params): Query<SessionQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(update_stream(
        Arc::clone(&state.registry),
        params.session_id,
        STREAM_IDLE_TIMEOUT,
    ))
}
