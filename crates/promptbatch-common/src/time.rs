use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Compact UTC stamp used in summary file names, e.g. `20240131_235959`.
pub fn format_file_stamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d_%H%M%S").to_string()
}

pub fn elapsed_seconds(started_at: &DateTime<Utc>, ended_at: &DateTime<Utc>) -> f64 {
    let millis = ended_at.signed_duration_since(*started_at).num_milliseconds();
    millis.max(0) as f64 / 1000.0
}
