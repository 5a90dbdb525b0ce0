use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since epoch
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Alert operations team (critical)
pub fn alert_operations_team_critical(message: String) {
    tracing::error!(target: "alerts", severity = "critical", "CRITICAL ALERT: {}", message);
}

/// Alert operations team (warning)
pub fn alert_operations_team_warning(message: String) {
    tracing::warn!(target: "alerts", severity = "warning", "WARNING ALERT: {}", message);
}

/// Relative change of `current` against `reference`, as a percentage.
pub fn percent_change(reference: f64, current: f64) -> Option<f64> {
    if reference == 0.0 || !reference.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - reference) / reference * 100.0)
}
