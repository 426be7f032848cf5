//! Server-owned notification records and strict parsing of the feed payload.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Severity class attached to a notification by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Warning,
    Danger,
    Info,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification as returned by `GET /notifications/`.
///
/// Ids are backend-generated strings such as `violation_12` or
/// `detection_<uuid>`. `read` is the server's view only; the client-side
/// view is derived in [`crate::view`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Backend emits ISO 8601 with an offset; stored as UTC.
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    /// Detection this notification points at. Used to build a link, never resolved here.
    #[serde(default)]
    pub detection_id: Option<String>,
    #[serde(default)]
    pub violation_id: Option<i64>,
}

impl Notification {
    /// Path of the detection detail page this notification links to, if any.
    pub fn detection_path(&self) -> Option<String> {
        self.detection_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("/detections/{id}"))
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("malformed notification feed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("notification at index {index} has an empty id")]
    EmptyId { index: usize },

    #[error("duplicate notification id in feed: {0}")]
    DuplicateId(String),
}

/// Parse a raw `GET /notifications/` body.
///
/// Fails closed: any shape mismatch, unknown `type`, unparsable timestamp,
/// empty id, or repeated id rejects the whole payload.
pub fn parse_feed(body: &str) -> Result<Vec<Notification>, FeedError> {
    let feed: Vec<Notification> = serde_json::from_str(body)?;
    validate_feed(&feed)?;
    debug!(count = feed.len(), "parsed notification feed");
    Ok(feed)
}

/// Check the id invariants of an already-deserialized feed.
fn validate_feed(feed: &[Notification]) -> Result<(), FeedError> {
    let mut seen = HashSet::with_capacity(feed.len());
    for (index, n) in feed.iter().enumerate() {
        if n.id.trim().is_empty() {
            return Err(FeedError::EmptyId { index });
        }
        if !seen.insert(n.id.as_str()) {
            return Err(FeedError::DuplicateId(n.id.clone()));
        }
    }
    Ok(())
}
