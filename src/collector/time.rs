use chrono::{DateTime, Utc};

/// Whether `t` lies within `[start, end]`. Swapped bounds are accepted.
pub fn time_between(t: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    start <= t && t <= end
}
