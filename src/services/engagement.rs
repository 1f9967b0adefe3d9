use std::collections::HashMap;

use crate::db::{Store, StoreKey};
use crate::error::{AppError, AppResult};
use crate::models::Engagement;

/// Bumps an item's like counter; returns the new total
pub async fn increment_likes(store: &Store, item_id: &str) -> AppResult<i64> {
    store
        .counter_incr(&StoreKey::ItemLikes(item_id.to_string()))
        .await
}

/// Bumps an item's dislike counter; returns the new total
pub async fn increment_dislikes(store: &Store, item_id: &str) -> AppResult<i64> {
    store
        .counter_incr(&StoreKey::ItemDislikes(item_id.to_string()))
        .await
}

/// Current like/dislike totals; missing counters read as 0
pub async fn engagement(store: &Store, item_id: &str) -> AppResult<Engagement> {
    let likes = store
        .counter_get(&StoreKey::ItemLikes(item_id.to_string()))
        .await?;
    let dislikes = store
        .counter_get(&StoreKey::ItemDislikes(item_id.to_string()))
        .await?;
    Ok(Engagement { likes, dislikes })
}

/// Recomputes an item's global score from its counters and upserts it into
/// the global ranking
///
/// The score is a pure function of the current counters (2*likes - dislikes),
/// never carried forward incrementally. Fails with `NotFound` if the item's
/// base record does not exist.
pub async fn recompute_global_score(store: &Store, item_id: &str) -> AppResult<f64> {
    let record = store
        .hash_get_all(&StoreKey::Item(item_id.to_string()))
        .await?;
    if record.is_empty() {
        return Err(AppError::NotFound(format!("item {}", item_id)));
    }

    let score = engagement(store, item_id).await?.global_score();
    store
        .ranking_upsert(&StoreKey::GlobalRanking, item_id, score)
        .await?;
    Ok(score)
}

/// One item's global score, 0.0 if it has never been ranked
pub async fn global_score(store: &Store, item_id: &str) -> AppResult<f64> {
    let ids = [item_id.to_string()];
    let scores = global_scores(store, &ids).await?;
    Ok(scores.get(item_id).copied().unwrap_or(0.0))
}

/// Global scores for a batch of items in a single round trip
///
/// Ids missing from the ranking default to 0.0 so callers never have to
/// distinguish "unranked" from "scored zero".
pub async fn global_scores(
    store: &Store,
    item_ids: &[String],
) -> AppResult<HashMap<String, f64>> {
    let raw = store
        .ranking_scores(&StoreKey::GlobalRanking, item_ids)
        .await?;

    Ok(item_ids
        .iter()
        .zip(raw)
        .map(|(id, score)| (id.clone(), score.unwrap_or(0.0)))
        .collect())
}

/// The `count` most popular item ids catalog-wide
pub async fn top_global(store: &Store, count: usize) -> AppResult<Vec<String>> {
    store.ranking_top(&StoreKey::GlobalRanking, count).await
}
