use snapnotify_core::FeedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("not authenticated: server returned 401")]
    Unauthorized,

    #[error("invalid notification feed: {0}")]
    InvalidFeed(#[from] FeedError),

    #[error("invalid base URL {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("feed synchronizer has shut down")]
    Closed,
}
