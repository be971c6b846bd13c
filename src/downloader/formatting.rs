// Human-readable sizes, durations and speeds

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// "1.5 MB"; "Unknown" for zero
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "Unknown".to_string();
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// "1:30" or "1:01:01"; "Unknown" for zero/negative
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "Unknown".to_string();
    }

    let total = seconds as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

pub fn format_speed(bytes_per_second: u64) -> String {
    if bytes_per_second == 0 {
        return "Unknown".to_string();
    }
    format!("{}/s", format_size(bytes_per_second))
}

/// Whole seconds left at the given speed, `None` when it cannot be estimated
pub fn estimate_remaining_secs(total: u64, downloaded: u64, bytes_per_second: f64) -> Option<u64> {
    if total == 0 || !bytes_per_second.is_finite() || bytes_per_second <= 0.0 {
        return None;
    }
    let remaining = total.saturating_sub(downloaded);
    Some((remaining as f64 / bytes_per_second) as u64)
}

/// Size in MiB with one decimal, as used in option labels
pub(crate) fn mib(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / 1_048_576.0)
}
