use std::time::Duration;

use crate::core::status::{ConsumedUnits, JobMetrics};

pub fn format_units(units: ConsumedUnits) -> String {
    match units {
        ConsumedUnits::Known(value) => format!("{value:.2}"),
        ConsumedUnits::Unknown => "-".to_string(),
    }
}

pub fn format_metrics(metrics: &JobMetrics) -> String {
    format!(
        "gpu_mem={:.0}% gpu={:.0}% cpu={:.0}% mem={:.0}% rx={} tx={}",
        metrics.gpu_mem_utilization * 100.0,
        metrics.gpu_utilization * 100.0,
        metrics.cpu_utilization * 100.0,
        metrics.mem_utilization * 100.0,
        format_bytes(metrics.received_bytes),
        format_bytes(metrics.sent_bytes)
    )
}

/// Clock-style `HH:MM:SS`; hours keep growing past 99.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Transfer counters in binary units, one decimal place.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
