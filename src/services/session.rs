use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::db::{Store, StoreKey};
use crate::error::AppResult;

/// Affinity granted to each tag the caller names at session creation
pub const PREFERRED_TAG_SEED: f64 = 3.0;

/// Creates a fresh session seeded with the caller's preferred tags
///
/// Each preferred tag is bumped by +3.0 rather than overwritten, so a tag
/// repeated in the request accumulates.
pub async fn create_session(
    store: &Store,
    ttl_secs: u64,
    preferred_tags: &[String],
) -> AppResult<String> {
    let session_id = Uuid::new_v4().to_string();
    ensure_session(store, ttl_secs, &session_id).await?;

    for tag in preferred_tags {
        bump_tag_score(store, ttl_secs, &session_id, tag, PREFERRED_TAG_SEED).await?;
    }

    Ok(session_id)
}

/// Idempotently reconciles a session's storage after TTL expiry
///
/// Empty sets and hashes are implicit in Redis, so an absent key needs no
/// initialization write; existing keys only get their TTL re-armed. Never
/// clobbers data.
pub async fn ensure_session(store: &Store, ttl_secs: u64, session_id: &str) -> AppResult<()> {
    let tags_key = StoreKey::SessionTags(session_id.to_string());
    let seen_key = StoreKey::SessionSeen(session_id.to_string());

    if store.key_exists(&tags_key).await? {
        store.expire(&tags_key, ttl_secs).await?;
    }
    if store.key_exists(&seen_key).await? {
        store.expire(&seen_key, ttl_secs).await?;
    }
    Ok(())
}

/// Records an item as served to the session; true iff it was newly added
///
/// The seen-set only ever grows within a session's lifetime.
pub async fn mark_seen(
    store: &Store,
    ttl_secs: u64,
    session_id: &str,
    item_id: &str,
) -> AppResult<bool> {
    let key = StoreKey::SessionSeen(session_id.to_string());
    let added = store.set_add(&key, item_id).await?;
    store.expire(&key, ttl_secs).await?;
    Ok(added)
}

/// All item ids the session has been served so far
pub async fn seen_items(store: &Store, session_id: &str) -> AppResult<HashSet<String>> {
    store
        .set_members(&StoreKey::SessionSeen(session_id.to_string()))
        .await
}

/// The session's tag affinity map; tags never touched are simply absent
pub async fn tag_scores(store: &Store, session_id: &str) -> AppResult<HashMap<String, f64>> {
    store
        .hash_get_all_f64(&StoreKey::SessionTags(session_id.to_string()))
        .await
}

/// Additively adjusts one tag's affinity, creating it at 0 first
///
/// Goes through the store's atomic float increment, so concurrent engagement
/// events on the same tag cannot lose updates. Returns the new score.
pub async fn bump_tag_score(
    store: &Store,
    ttl_secs: u64,
    session_id: &str,
    tag: &str,
    delta: f64,
) -> AppResult<f64> {
    let key = StoreKey::SessionTags(session_id.to_string());
    let score = store.hash_incr_f64(&key, tag, delta).await?;
    store.expire(&key, ttl_secs).await?;
    Ok(score)
}
