use serde::{Deserialize, Serialize};

/// A catalog item served through the feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Unique identifier for the item
    pub id: String,
    /// Where the content lives
    pub url: String,
    /// Tags driving personalization and the tag index
    pub tags: Vec<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, url: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            tags,
        }
    }
}

/// Like/dislike totals for one item; absent counters read as zero
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Engagement {
    pub likes: i64,
    pub dislikes: i64,
}

impl Engagement {
    /// Global popularity score derived from the counters
    pub fn global_score(&self) -> f64 {
        (2 * self.likes - self.dislikes) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_score_weighs_likes_double() {
        let engagement = Engagement {
            likes: 2,
            dislikes: 1,
        };
        assert_eq!(engagement.global_score(), 3.0);
    }

    #[test]
    fn test_global_score_default_is_zero() {
        assert_eq!(Engagement::default().global_score(), 0.0);
    }

    #[test]
    fn test_global_score_can_go_negative() {
        let engagement = Engagement {
            likes: 1,
            dislikes: 5,
        };
        assert_eq!(engagement.global_score(), -3.0);
    }
}
