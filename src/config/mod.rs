pub mod feed;

pub use feed::{FeedConfig, FetchConfig, FetchMode};
