use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ImageRecord;

/// One card in the gallery grid
#[derive(Debug, Clone, Serialize)]
pub struct ImageCard {
    pub id: u64,
    pub file_name: String,
    pub file_size: u64,
    pub size_label: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub relative_time: String,
}

impl ImageCard {
    pub fn new(record: &ImageRecord, url: String, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            file_name: record.file_name.clone(),
            file_size: record.file_size,
            size_label: format_bytes(record.file_size),
            url,
            created_at: record.created_at,
            relative_time: relative_time(record.created_at, now),
        }
    }
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Describe how long ago `then` was, e.g. "5 minutes ago"
///
/// Thresholds follow the usual "time ago" conventions: anything under 45 seconds
/// is "a few seconds ago", under 90 seconds is "a minute ago", and so on up to
/// years. Timestamps in the future are treated as just now.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0) as f64;
    let minutes = seconds / 60.0;
    let hours = minutes / 60.0;
    let days = hours / 24.0;

    if seconds < 45.0 {
        "a few seconds ago".to_string()
    } else if seconds < 90.0 {
        "a minute ago".to_string()
    } else if minutes < 45.0 {
        format!("{} minutes ago", (minutes.round() as u64).max(2))
    } else if minutes < 90.0 {
        "an hour ago".to_string()
    } else if hours < 22.0 {
        format!("{} hours ago", (hours.round() as u64).max(2))
    } else if hours < 36.0 {
        "a day ago".to_string()
    } else if days < 26.0 {
        format!("{} days ago", (days.round() as u64).max(2))
    } else if days < 46.0 {
        "a month ago".to_string()
    } else if days < 320.0 {
        format!("{} months ago", ((days / 30.4).round() as u64).max(2))
    } else if days < 548.0 {
        "a year ago".to_string()
    } else {
        format!("{} years ago", ((days / 365.0).round() as u64).max(2))
    }
}
