//! Sync layer: HTTP transport for the notification API and the feed
//! synchronizer that reconciles it with local read state.

mod api;
pub use api::NotificationApi;

mod error;
pub use error::SyncError;

pub mod feed;
pub use feed::{FeedConfig, FeedHandle, MarkOutcome, Notice};

pub mod http;
pub use http::{ClientConfig, NotificationClient};
