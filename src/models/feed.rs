use serde::Serialize;

use super::Item;

/// One feed response: a page of fresh items, or the terminal state once the
/// session's seen budget or the catalog is used up
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Feed {
    Ready {
        visible: Vec<Item>,
        prefetched: Vec<Item>,
    },
    Exhausted {
        exhausted: bool,
    },
}

impl Feed {
    pub fn exhausted() -> Self {
        Feed::Exhausted { exhausted: true }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Feed::Exhausted { .. })
    }
}

/// Events pushed over a session's update stream
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    Connected { session_id: String },
    Ping,
    PrefetchUpdate { prefetched: Vec<Item> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_serialization() {
        let json = serde_json::to_value(Feed::exhausted()).unwrap();
        assert_eq!(json, serde_json::json!({"exhausted": true}));
    }

    #[test]
    fn test_ready_serialization_keeps_both_batches() {
        let feed = Feed::Ready {
            visible: vec![Item::new("a", "https://example.com/a.jpg", vec![])],
            prefetched: vec![],
        };
        let json = serde_json::to_value(&feed).unwrap();
        assert_eq!(json["visible"][0]["id"], "a");
        assert!(json["prefetched"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_event_type_tags() {
        let ping = serde_json::to_value(FeedEvent::Ping).unwrap();
        assert_eq!(ping, serde_json::json!({"type": "ping"}));

        let connected = serde_json::to_value(FeedEvent::Connected {
            session_id: "s1".to_string(),
        })
        .unwrap();
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["session_id"], "s1");

        let update = serde_json::to_value(FeedEvent::PrefetchUpdate { prefetched: vec![] }).unwrap();
        assert_eq!(update["type"], "prefetch_update");
    }
}
