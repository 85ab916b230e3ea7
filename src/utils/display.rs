use chrono::{DateTime, Duration, Utc};

/// Format a duration as "HH:MM:SS", ignoring its sign
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().unsigned_abs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Time since `time`, like "00:04:12"
pub fn format_age(time: DateTime<Utc>) -> String {
    format_duration(Utc::now().signed_duration_since(time))
}

/// Time between two instants, or "running" while unfinished
pub fn format_span(started: DateTime<Utc>, ended: Option<DateTime<Utc>>) -> String {
    match ended {
        Some(ended) => format_duration(ended.signed_duration_since(started)),
        None => "running".to_string(),
    }
}
