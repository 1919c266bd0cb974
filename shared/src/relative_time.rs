use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Whole seconds from `then` to `now`, clamped at zero for timestamps in the future.
pub fn seconds_between(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_seconds().max(0)
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Minute-granular label shown on an open thread.
pub fn format_relative_time(elapsed_secs: i64) -> String {
    let secs = elapsed_secs.max(0);
    if secs < MINUTE {
        "less than a minute ago".to_string()
    } else if secs < HOUR {
        plural(secs / MINUTE, "minute")
    } else if secs < DAY {
        plural(secs / HOUR, "hour")
    } else {
        plural(secs / DAY, "day")
    }
}

/// Hour-granular label used in the thread list.
pub fn format_age_label(elapsed_secs: i64) -> String {
    let hours = elapsed_secs.max(0) / HOUR;
    if hours < 1 {
        "just now".to_string()
    } else if hours < 24 {
        plural(hours, "hour")
    } else {
        plural(hours / 24, "day")
    }
}
