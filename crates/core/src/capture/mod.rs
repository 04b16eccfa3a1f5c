pub mod domain;
pub mod infrastructure;
pub mod live_feed;
