use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{Feed, FeedEvent, Item};

use super::broadcast::ConnectionRegistry;
use super::{catalog, engagement, session};

/// A session stops getting fresh pages once it has seen this many items
pub const SEEN_CAP: usize = 50;

/// Items in the immediately visible slice of one feed page
pub const VISIBLE_COUNT: usize = 10;

/// Items in the look-ahead slice of one feed page
pub const PREFETCH_COUNT: usize = 10;

/// How many of the session's strongest tags widen the candidate pool
pub const TOP_TAG_COUNT: usize = 3;

/// Affinity granted per tag on a liked item
pub const LIKE_TAG_BOOST: f64 = 1.0;

/// The session's strongest `count` tags, highest affinity first
///
/// Ties break by tag name ascending; hash iteration order must never leak
/// into tag selection.
fn top_tags(tag_scores: &HashMap<String, f64>, count: usize) -> Vec<String> {
    let mut tags: Vec<(&String, f64)> = tag_scores.iter().map(|(t, s)| (t, *s)).collect();
    tags.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    tags.into_iter().take(count).map(|(t, _)| t.clone()).collect()
}

/// Sum of the session's affinities over an item's tags; absent tags count 0
fn tag_boost(tags: &[String], tag_scores: &HashMap<String, f64>) -> f64 {
    tags.iter()
        .map(|tag| tag_scores.get(tag).copied().unwrap_or(0.0))
        .sum()
}

/// Decay applied to one tag's affinity on a dislike, given its value before
/// the event
///
/// Positive affinity decays softly (-0.5), already-negative affinity is
/// pushed down harder (-1.0), and a tag the session has no opinion on yet
/// (exactly 0) is left alone.
fn dislike_decay(current: f64) -> f64 {
    if current > 0.0 {
        -0.5
    } else if current < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Builds the candidate pool for a session's next page: the whole catalog
/// plus everything indexed under the session's top tags
///
/// Seen items are not excluded here; that happens in ranking.
pub async fn candidate_items(store: &Store, session_id: &str) -> AppResult<HashSet<String>> {
    let mut candidates = catalog::all_items(store).await?;

    let tag_scores = session::tag_scores(store, session_id).await?;
    for tag in top_tags(&tag_scores, TOP_TAG_COUNT) {
        candidates.extend(catalog::items_by_tag(store, &tag).await?);
    }

    Ok(candidates)
}

/// Scores and orders candidates for a session, highest first
///
/// Seen candidates are excluded, global scores come back in one batched
/// lookup, and candidates whose item record has vanished are silently
/// dropped. Ties keep candidate iteration order (the sort is stable).
pub async fn rank(
    store: &Store,
    session_id: &str,
    candidates: HashSet<String>,
) -> AppResult<Vec<(String, f64)>> {
    let seen = session::seen_items(store, session_id).await?;
    let available: Vec<String> = candidates.into_iter().filter(|id| !seen.contains(id)).collect();

    let global_scores = engagement::global_scores(store, &available).await?;
    let tag_scores = session::tag_scores(store, session_id).await?;

    let mut scored = Vec::with_capacity(available.len());
    for item_id in available {
        let Some(item) = catalog::get_item(store, &item_id).await? else {
            continue;
        };
        let global = global_scores.get(&item_id).copied().unwrap_or(0.0);
        let score = global + tag_boost(&item.tags, &tag_scores);
        scored.push((item_id, score));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Ok(scored)
}

/// Produces the session's next feed page and commits its seen-state
///
/// Returns `Exhausted` once the session has seen 50 items or no unseen
/// candidates remain. Otherwise the top 20 ranked items split into a visible
/// and a prefetched batch of up to 10 each, and every returned id is marked
/// seen before the response is assembled.
pub async fn generate_feed(store: &Store, ttl_secs: u64, session_id: &str) -> AppResult<Feed> {
    session::ensure_session(store, ttl_secs, session_id).await?;

    let seen = session::seen_items(store, session_id).await?;
    if seen.len() >= SEEN_CAP {
        return Ok(Feed::exhausted());
    }

    let candidates = candidate_items(store, session_id).await?;
    let ranked = rank(store, session_id, candidates).await?;
    if ranked.is_empty() {
        return Ok(Feed::exhausted());
    }

    let page: Vec<String> = ranked
        .into_iter()
        .take(VISIBLE_COUNT + PREFETCH_COUNT)
        .map(|(id, _)| id)
        .collect();

    // Commit point: everything handed out counts against the seen budget,
    // prefetched items included.
    for item_id in &page {
        session::mark_seen(store, ttl_secs, session_id, item_id).await?;
    }

    let mut items = Vec::with_capacity(page.len());
    for item_id in &page {
        if let Some(item) = catalog::get_item(store, item_id).await? {
            items.push(item);
        }
    }

    let split = VISIBLE_COUNT.min(items.len());
    let prefetched = items.split_off(split);
    Ok(Feed::Ready {
        visible: items,
        prefetched,
    })
}

/// Read-only preview of the session's next `count` items
///
/// Same pipeline as `generate_feed` but deliberately never marks anything
/// seen: the broadcaster recomputes look-ahead batches on the client's
/// behalf and must not consume its seen budget.
pub async fn prefetched_batch(
    store: &Store,
    session_id: &str,
    count: usize,
) -> AppResult<Vec<Item>> {
    let candidates = candidate_items(store, session_id).await?;
    let ranked = rank(store, session_id, candidates).await?;

    let mut items = Vec::new();
    for (item_id, _) in ranked.into_iter().take(count) {
        if let Some(item) = catalog::get_item(store, &item_id).await? {
            items.push(item);
        }
    }
    Ok(items)
}

/// Records a like: counters, global score, +1 affinity per item tag, and a
/// push-channel refresh for live subscribers
///
/// Returns the liked item's tags. Fails with `NotFound` before any mutation
/// if the item is unknown.
pub async fn like(
    store: &Store,
    registry: &Arc<ConnectionRegistry>,
    ttl_secs: u64,
    session_id: &str,
    item_id: &str,
) -> AppResult<Vec<String>> {
    session::ensure_session(store, ttl_secs, session_id).await?;
    let item = catalog::get_item(store, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {}", item_id)))?;

    engagement::increment_likes(store, item_id).await?;
    engagement::recompute_global_score(store, item_id).await?;

    for tag in &item.tags {
        session::bump_tag_score(store, ttl_secs, session_id, tag, LIKE_TAG_BOOST).await?;
    }

    schedule_prefetch_push(store, registry, session_id);
    Ok(item.tags)
}

/// Records a dislike: counters, global score, asymmetric per-tag decay, and
/// a push-channel refresh for live subscribers
///
/// The decay is computed against the affinities as they stood before this
/// call touched anything, read once up front.
pub async fn dislike(
    store: &Store,
    registry: &Arc<ConnectionRegistry>,
    ttl_secs: u64,
    session_id: &str,
    item_id: &str,
) -> AppResult<Vec<String>> {
    session::ensure_session(store, ttl_secs, session_id).await?;
    let item = catalog::get_item(store, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {}", item_id)))?;

    let scores_before = session::tag_scores(store, session_id).await?;

    engagement::increment_dislikes(store, item_id).await?;
    engagement::recompute_global_score(store, item_id).await?;

    for tag in &item.tags {
        let current = scores_before.get(tag).copied().unwrap_or(0.0);
        let delta = dislike_decay(current);
        if delta != 0.0 {
            session::bump_tag_score(store, ttl_secs, session_id, tag, delta).await?;
        }
    }

    schedule_prefetch_push(store, registry, session_id);
    Ok(item.tags)
}

/// Fires a detached task that recomputes the session's look-ahead batch and
/// broadcasts it to live subscribers
///
/// Skipped entirely when nobody is listening. Failures are logged and never
/// reach the engagement call that triggered the refresh.
fn schedule_prefetch_push(store: &Store, registry: &Arc<ConnectionRegistry>, session_id: &str) {
    if !registry.has_subscribers(session_id) {
        return;
    }

    let store = store.clone();
    let registry = Arc::clone(registry);
    let session_id = session_id.to_string();
    tokio::spawn(async move {
        match prefetched_batch(&store, &session_id, PREFETCH_COUNT).await {
            Ok(prefetched) => {
                registry.broadcast(&session_id, &FeedEvent::PrefetchUpdate { prefetched });
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Prefetch recompute failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_tags_orders_by_affinity_descending() {
        let scores = HashMap::from([
            ("nature".to_string(), 3.0),
            ("city".to_string(), 5.0),
            ("food".to_string(), 1.0),
        ]);
        assert_eq!(top_tags(&scores, 2), vec!["city", "nature"]);
    }

    #[test]
    fn test_top_tags_ties_break_by_name() {
        let scores = HashMap::from([
            ("zebra".to_string(), 2.0),
            ("apple".to_string(), 2.0),
            ("mango".to_string(), 2.0),
        ]);
        assert_eq!(top_tags(&scores, 3), vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_top_tags_empty_scores() {
        assert!(top_tags(&HashMap::new(), 3).is_empty());
    }

    #[test]
    fn test_tag_boost_sums_known_tags_only() {
        let scores = HashMap::from([
            ("nature".to_string(), 3.0),
            ("city".to_string(), -1.5),
        ]);
        let tags = vec![
            "nature".to_string(),
            "city".to_string(),
            "unknown".to_string(),
        ];
        assert_eq!(tag_boost(&tags, &scores), 1.5);
    }

    #[test]
    fn test_tag_boost_no_tags() {
        assert_eq!(tag_boost(&[], &HashMap::new()), 0.0);
    }

    #[test]
    fn test_dislike_decay_is_asymmetric() {
        assert_eq!(dislike_decay(2.5), -0.5);
        assert_eq!(dislike_decay(-1.0), -1.0);
        assert_eq!(dislike_decay(0.0), 0.0);
    }
}
