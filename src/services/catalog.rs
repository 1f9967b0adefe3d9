use std::collections::HashSet;

use crate::db::{Store, StoreKey};
use crate::error::{AppError, AppResult};
use crate::models::Item;

use super::engagement;

/// Ingests an item: record hash, catalog set, per-tag index, and an initial
/// entry in the global ranking
pub async fn store_item(store: &Store, item: &Item) -> AppResult<()> {
    let tags_json = serde_json::to_string(&item.tags)
        .map_err(|e| AppError::Internal(format!("tag serialization error: {}", e)))?;

    store
        .hash_set(
            &StoreKey::Item(item.id.clone()),
            &[("url", item.url.clone()), ("tags", tags_json)],
        )
        .await?;

    store.set_add(&StoreKey::AllItems, &item.id).await?;
    for tag in &item.tags {
        store
            .set_add(&StoreKey::TagItems(tag.clone()), &item.id)
            .await?;
    }

    // Rank the item immediately so it is visible to top-K queries before its
    // first engagement event.
    engagement::recompute_global_score(store, &item.id).await?;
    Ok(())
}

/// Fetches an item record; `None` when the record is missing (soft-deleted
/// or never ingested)
pub async fn get_item(store: &Store, item_id: &str) -> AppResult<Option<Item>> {
    let record = store
        .hash_get_all(&StoreKey::Item(item_id.to_string()))
        .await?;
    if record.is_empty() {
        return Ok(None);
    }

    let url = record.get("url").cloned().unwrap_or_default();
    let tags: Vec<String> = match record.get("tags") {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError::Internal(format!("corrupt tags for item {}: {}", item_id, e)))?,
        None => Vec::new(),
    };

    Ok(Some(Item::new(item_id, url, tags)))
}

/// Every item id the catalog knows about
pub async fn all_items(store: &Store) -> AppResult<HashSet<String>> {
    store.set_members(&StoreKey::AllItems).await
}

/// Item ids indexed under one tag
pub async fn items_by_tag(store: &Store, tag: &str) -> AppResult<HashSet<String>> {
    store
        .set_members(&StoreKey::TagItems(tag.to_string()))
        .await
}
