//! Human-readable distance between a notification timestamp and now.
//!
//! Phrasing follows the thresholds of date-fns `formatDistanceToNow`, so the
//! terminal listing reads the same as the web dashboard:
//!
//! - under 30 s: "less than a minute"
//! - under 45 min: "N minutes" (rounded)
//! - under 90 min: "about 1 hour"
//! - under 24 h: "about N hours"
//! - under 42 h: "1 day"
//! - under 30 days: "N days"
//! - under 60 days: "about N months"
//! - under 12 months: "N months"
//! - beyond: "about / over / almost N years"

use chrono::{DateTime, Utc};

const MINUTES_IN_DAY: u64 = 1440;
const MINUTES_IN_MONTH: u64 = 43_200;
const MINUTES_IN_TWO_MONTHS: u64 = 86_400;

/// "5 minutes ago" for past timestamps, "in 5 minutes" for future ones.
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(ts);
    let seconds = delta.num_seconds();
    let phrase = distance_phrase(seconds.unsigned_abs());
    if seconds >= 0 {
        format!("{phrase} ago")
    } else {
        format!("in {phrase}")
    }
}

fn distance_phrase(seconds: u64) -> String {
    let minutes = (seconds + 30) / 60;

    if minutes < 2 {
        return if minutes == 0 {
            "less than a minute".to_string()
        } else {
            "1 minute".to_string()
        };
    }
    if minutes < 45 {
        return format!("{minutes} minutes");
    }
    if minutes < 90 {
        return "about 1 hour".to_string();
    }
    if minutes < MINUTES_IN_DAY {
        let hours = (minutes + 30) / 60;
        return format!("about {hours} hours");
    }
    if minutes < 2520 {
        return "1 day".to_string();
    }
    if minutes < MINUTES_IN_MONTH {
        let days = (minutes + MINUTES_IN_DAY / 2) / MINUTES_IN_DAY;
        return format!("{days} days");
    }
    if minutes < MINUTES_IN_TWO_MONTHS {
        let months = (minutes + MINUTES_IN_MONTH / 2) / MINUTES_IN_MONTH;
        return plural("about", months, "month");
    }

    let months = minutes / MINUTES_IN_MONTH;
    if months < 12 {
        let nearest = (minutes + MINUTES_IN_MONTH / 2) / MINUTES_IN_MONTH;
        return format!("{nearest} months");
    }

    let years = months / 12;
    match months % 12 {
        0..=2 => plural("about", years, "year"),
        3..=8 => plural("over", years, "year"),
        _ => plural("almost", years + 1, "year"),
    }
}

fn plural(prefix: &str, n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{prefix} 1 {unit}")
    } else {
        format!("{prefix} {n} {unit}s")
    }
}
