pub mod broadcast;
pub mod catalog;
pub mod engagement;
pub mod feed;
pub mod session;

pub use broadcast::ConnectionRegistry;
