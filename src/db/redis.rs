use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use redis::Client;

use crate::error::AppResult;

/// Keys for everything the feed core stores in Redis
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Hash of tag -> affinity score for one session
    SessionTags(String),
    /// Set of item ids the session has already been served
    SessionSeen(String),
    /// Hash holding one item's record (url, tags)
    Item(String),
    /// Like counter for one item
    ItemLikes(String),
    /// Dislike counter for one item
    ItemDislikes(String),
    /// Set of item ids carrying one tag
    TagItems(String),
    /// Set of every known item id
    AllItems,
    /// Sorted set of item id -> global popularity score
    GlobalRanking,
}

impl Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKey::SessionTags(id) => write!(f, "session:{}:tags", id),
            StoreKey::SessionSeen(id) => write!(f, "session:{}:seen", id),
            StoreKey::Item(id) => write!(f, "item:{}", id),
            StoreKey::ItemLikes(id) => write!(f, "item:{}:likes", id),
            StoreKey::ItemDislikes(id) => write!(f, "item:{}:dislikes", id),
            StoreKey::TagItems(tag) => write!(f, "tag:{}:items", tag),
            StoreKey::AllItems => write!(f, "items:all"),
            StoreKey::GlobalRanking => write!(f, "feed:global"),
        }
    }
}

/// Creates a Redis client for the feed store
///
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Store adapter over Redis
///
/// Every operation grabs a multiplexed connection and surfaces connectivity
/// failures as `AppError::Store`; retry policy is not this layer's job.
#[derive(Clone)]
pub struct Store {
    redis_client: Client,
}

impl Store {
    pub fn new(redis_client: Client) -> Self {
        Self { redis_client }
    }

    /// Convenience constructor from a connection URL
    pub fn connect(redis_url: &str) -> anyhow::Result<Self> {
        Ok(Self::new(create_redis_client(redis_url)?))
    }

    async fn conn(&self) -> AppResult<MultiplexedConnection> {
        Ok(self.redis_client.get_multiplexed_async_connection().await?)
    }

    /// Round-trip health check
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Reads all fields of a hash; empty map if the key is absent
    pub async fn hash_get_all(&self, key: &StoreKey) -> AppResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, String> = conn.hgetall(key.to_string()).await?;
        Ok(fields)
    }

    /// Reads a hash whose values are floats (tag affinity scores)
    pub async fn hash_get_all_f64(&self, key: &StoreKey) -> AppResult<HashMap<String, f64>> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, f64> = conn.hgetall(key.to_string()).await?;
        Ok(fields)
    }

    /// Writes multiple hash fields at once
    pub async fn hash_set(&self, key: &StoreKey, fields: &[(&str, String)]) -> AppResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.hset_multiple(key.to_string(), fields).await?;
        Ok(())
    }

    /// Atomically increments a float hash field, creating it at 0 if absent
    ///
    /// HINCRBYFLOAT, so two concurrent bumps to the same field never race
    /// as read-modify-write. Returns the new value.
    pub async fn hash_incr_f64(&self, key: &StoreKey, field: &str, delta: f64) -> AppResult<f64> {
        let mut conn = self.conn().await?;
        let value: f64 = conn.hincr(key.to_string(), field, delta).await?;
        Ok(value)
    }

    /// Adds a member to a set; true iff it was not already present
    pub async fn set_add(&self, key: &StoreKey, member: &str) -> AppResult<bool> {
        let mut conn = self.conn().await?;
        let added: i64 = conn.sadd(key.to_string(), member).await?;
        Ok(added > 0)
    }

    /// All members of a set; empty if the key is absent
    pub async fn set_members(&self, key: &StoreKey) -> AppResult<HashSet<String>> {
        let mut conn = self.conn().await?;
        let members: HashSet<String> = conn.smembers(key.to_string()).await?;
        Ok(members)
    }

    pub async fn key_exists(&self, key: &StoreKey) -> AppResult<bool> {
        let mut conn = self.conn().await?;
        let exists: bool = conn.exists(key.to_string()).await?;
        Ok(exists)
    }

    /// Atomic integer counter increment; creates the counter at 0
    pub async fn counter_incr(&self, key: &StoreKey) -> AppResult<i64> {
        let mut conn = self.conn().await?;
        let total: i64 = conn.incr(key.to_string(), 1i64).await?;
        Ok(total)
    }

    /// Reads an integer counter, absent reading as 0
    pub async fn counter_get(&self, key: &StoreKey) -> AppResult<i64> {
        let mut conn = self.conn().await?;
        let value: Option<i64> = conn.get(key.to_string()).await?;
        Ok(value.unwrap_or(0))
    }

    /// Upserts one member's score in a sorted set
    pub async fn ranking_upsert(&self, key: &StoreKey, member: &str, score: f64) -> AppResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.zadd(key.to_string(), member, score).await?;
        Ok(())
    }

    /// Top `count` members of a sorted set, highest score first
    pub async fn ranking_top(&self, key: &StoreKey, count: usize) -> AppResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn
            .zrevrange(key.to_string(), 0, count as isize - 1)
            .await?;
        Ok(members)
    }

    /// Scores for a batch of members in one round trip; absent members are None
    pub async fn ranking_scores(
        &self,
        key: &StoreKey,
        members: &[String],
    ) -> AppResult<Vec<Option<f64>>> {
        // ZMSCORE rejects an empty member list
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let scores: Vec<Option<f64>> = conn.zscore_multiple(key.to_string(), members).await?;
        Ok(scores)
    }

    /// (Re)arms a key's TTL; no-op if the key does not exist
    pub async fn expire(&self, key: &StoreKey, ttl_secs: u64) -> AppResult<()> {
        let mut conn = self.conn().await?;
        let _: bool = conn.expire(key.to_string(), ttl_secs as i64).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_display_session_tags() {
        let key = StoreKey::SessionTags("abc-123".to_string());
        assert_eq!(format!("{}", key), "session:abc-123:tags");
    }

    #[test]
    fn test_store_key_display_session_seen() {
        let key = StoreKey::SessionSeen("abc-123".to_string());
        assert_eq!(format!("{}", key), "session:abc-123:seen");
    }

    #[test]
    fn test_store_key_display_item() {
        let key = StoreKey::Item("img42".to_string());
        assert_eq!(format!("{}", key), "item:img42");
    }

    #[test]
    fn test_store_key_display_counters() {
        assert_eq!(
            format!("{}", StoreKey::ItemLikes("img42".to_string())),
            "item:img42:likes"
        );
        assert_eq!(
            format!("{}", StoreKey::ItemDislikes("img42".to_string())),
            "item:img42:dislikes"
        );
    }

    #[test]
    fn test_store_key_display_tag_index() {
        let key = StoreKey::TagItems("nature".to_string());
        assert_eq!(format!("{}", key), "tag:nature:items");
    }

    #[test]
    fn test_store_key_display_globals() {
        assert_eq!(format!("{}", StoreKey::AllItems), "items:all");
        assert_eq!(format!("{}", StoreKey::GlobalRanking), "feed:global");
    }
}
