//! Plain-text rendering of the reconciled feed.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use snapnotify_core::{FeedEntry, FeedView, NotificationKind, relative_time};

fn icon(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Success => "✓",
        NotificationKind::Warning => "⚠",
        NotificationKind::Danger => "✗",
        NotificationKind::Info => "i",
    }
}

/// `●` unread, `◐` read locally but not yet confirmed, blank once read.
fn marker(entry: &FeedEntry) -> &'static str {
    if entry.pending {
        "◐"
    } else if entry.is_read {
        " "
    } else {
        "●"
    }
}

/// Render one notification as a three-line block.
pub fn render_entry(entry: &FeedEntry, now: DateTime<Utc>) -> String {
    let n = &entry.notification;
    let mut out = String::new();
    let _ = writeln!(out, "{} {} {}  ({})", marker(entry), icon(n.kind), n.title, n.id);
    let _ = writeln!(out, "    {}", n.message);
    let when = relative_time(n.timestamp, now);
    match n.detection_path() {
        Some(path) => {
            let _ = writeln!(out, "    {when} · View details → {path}");
        }
        None => {
            let _ = writeln!(out, "    {when}");
        }
    }
    out
}

/// Header line: unread count with the capped badge.
pub fn render_summary(view: &FeedView) -> String {
    match view.badge() {
        Some(badge) => format!(
            "Notifications [{badge}] · {} unread of {}",
            view.unread_count,
            view.entries.len()
        ),
        None => format!("Notifications · all {} read", view.entries.len()),
    }
}

pub fn render_feed(view: &FeedView, unread_only: bool, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", render_summary(view));

    let entries: Vec<&FeedEntry> = if unread_only {
        view.unread().collect()
    } else {
        view.entries.iter().collect()
    };

    if entries.is_empty() {
        out.push_str("No notifications\n");
        out.push_str("You'll see updates about detections and violations here\n");
        return out;
    }
    for entry in entries {
        out.push('\n');
        out.push_str(&render_entry(entry, now));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapnotify_core::{Notification, ReadSet};
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        "2026-02-21T12:00:00Z".parse().unwrap()
    }

    fn notification(id: &str, kind: NotificationKind, read: bool) -> Notification {
        Notification {
            id: id.into(),
            kind,
            title: format!("title {id}"),
            message: format!("message {id}"),
            timestamp: "2026-02-21T11:55:00Z".parse().unwrap(),
            read,
            detection_id: Some("d-1".into()),
            violation_id: None,
        }
    }

    fn view(feed: &[Notification]) -> FeedView {
        FeedView::reconcile(feed, &ReadSet::new(), &HashSet::new(), None)
    }

    #[test]
    fn entry_block() {
        let v = view(&[notification("violation_1", NotificationKind::Danger, false)]);
        let text = render_entry(&v.entries[0], now());
        assert_eq!(
            text,
            "● ✗ title violation_1  (violation_1)\n    message violation_1\n    5 minutes ago · View details → /detections/d-1\n"
        );
    }

    #[test]
    fn summary_caps_badge() {
        let feed: Vec<Notification> = (0..12)
            .map(|i| notification(&format!("n{i}"), NotificationKind::Info, false))
            .collect();
        assert_eq!(render_summary(&view(&feed)), "Notifications [9+] · 12 unread of 12");
    }

    #[test]
    fn summary_all_read() {
        let feed = vec![notification("a", NotificationKind::Success, true)];
        assert_eq!(render_summary(&view(&feed)), "Notifications · all 1 read");
    }

    #[test]
    fn unread_filter_and_empty_state() {
        let feed = vec![notification("a", NotificationKind::Success, true)];
        let text = render_feed(&view(&feed), true, now());
        assert!(text.contains("No notifications"));

        let text = render_feed(&view(&feed), false, now());
        assert!(text.contains("title a"));
    }
}
