use std::time::Duration;

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format a read throughput as human-readable string
pub fn format_read_rate(reads_per_sec: f64) -> String {
    if reads_per_sec >= 1_000_000.0 {
        format!("{:.2} M reads/s", reads_per_sec / 1_000_000.0)
    } else if reads_per_sec >= 1_000.0 {
        format!("{:.2} k reads/s", reads_per_sec / 1_000.0)
    } else {
        format!("{:.2} reads/s", reads_per_sec)
    }
}

/// Format a duration as e.g. "45s", "2m 15s" or "1h 30m"
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Calculate the share of reads the server kept, in percent
pub fn calculate_kept_percentage(kept: usize, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (kept as f64 / total as f64) * 100.0
}
