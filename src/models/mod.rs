pub mod feed;
pub mod item;

pub use feed::Feed;
pub use feed::FeedEvent;
pub use item::Engagement;
pub use item::Item;
