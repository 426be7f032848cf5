//! Read-state reconciliation: server feed + local read set → view model.
//!
//! A notification is read iff the server says so or its id is in the local
//! [`ReadSet`]. The two sources are never required to agree; the local set
//! covers the window where the server has not yet persisted a mark-read.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Notification, ReadSet};

/// Badge text is capped at this count.
pub const BADGE_CAP: usize = 9;

/// One notification with its derived read state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub notification: Notification,
    pub is_read: bool,
    /// A mark-read for this id has been sent and not yet answered.
    pub pending: bool,
}

/// The reconciled feed, in server order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedView {
    pub entries: Vec<FeedEntry>,
    /// True count; capping happens only in [`badge_label`].
    pub unread_count: usize,
    /// When the underlying feed was last fetched. `None` before the first fetch.
    pub fetched_at: Option<DateTime<Utc>>,
}

pub fn is_read(notification: &Notification, local: &ReadSet) -> bool {
    notification.read || local.contains(&notification.id)
}

impl FeedView {
    /// Merge a server feed with local read state.
    pub fn reconcile(
        feed: &[Notification],
        local: &ReadSet,
        pending: &HashSet<String>,
        fetched_at: Option<DateTime<Utc>>,
    ) -> Self {
        let entries: Vec<FeedEntry> = feed
            .iter()
            .map(|n| FeedEntry {
                is_read: is_read(n, local),
                pending: pending.contains(&n.id),
                notification: n.clone(),
            })
            .collect();
        let unread_count = entries.iter().filter(|e| !e.is_read).count();
        Self {
            entries,
            unread_count,
            fetched_at,
        }
    }

    pub fn entry(&self, id: &str) -> Option<&FeedEntry> {
        self.entries.iter().find(|e| e.notification.id == id)
    }

    /// `None` if the id is not in the feed.
    pub fn is_read(&self, id: &str) -> Option<bool> {
        self.entry(id).map(|e| e.is_read)
    }

    pub fn unread(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter().filter(|e| !e.is_read)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.notification.id.as_str())
    }

    pub fn badge(&self) -> Option<String> {
        badge_label(self.unread_count)
    }
}

/// Unread badge text: nothing for zero, the count up to 9, then `9+`.
pub fn badge_label(count: usize) -> Option<String> {
    match count {
        0 => None,
        n if n > BADGE_CAP => Some(format!("{BADGE_CAP}+")),
        n => Some(n.to_string()),
    }
}
