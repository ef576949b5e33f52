//! Prometheus metrics for sync passes
//!
//! Counters and histograms are registered in the default registry. The CLI
//! writes the text exposition to a file after a pass (`sync --metrics-file`).

use crate::Result;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};
use std::path::Path;

lazy_static! {
    /// Counter: completed passes by status
    pub static ref SYNC_PASSES: CounterVec = register_counter_vec!(
        "issues_sync_passes_total",
        "Total sync passes by status",
        &["status"]
    )
    .expect("Failed to create sync_passes metric");

    /// Counter: per-issue outcomes
    pub static ref ISSUE_OUTCOMES: CounterVec = register_counter_vec!(
        "issues_sync_issue_outcomes_total",
        "Issues processed by outcome",
        &["outcome"]
    )
    .expect("Failed to create issue_outcomes metric");

    /// Histogram: pass duration (seconds)
    pub static ref PASS_DURATION: Histogram = register_histogram!(
        "issues_sync_pass_duration_seconds",
        "Duration of a sync pass",
        vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0]
    )
    .expect("Failed to create pass_duration metric");

    /// Counter: tracker API errors
    pub static ref API_ERRORS: CounterVec = register_counter_vec!(
        "issues_sync_api_errors_total",
        "Total tracker API errors by type",
        &["error_type", "tracker"]
    )
    .expect("Failed to create api_errors metric");
}

/// Record a finished pass ("success", "partial", "failed")
pub fn record_pass(status: &str, duration_secs: f64) {
    SYNC_PASSES.with_label_values(&[status]).inc();
    PASS_DURATION.observe(duration_secs);
}

/// Record one issue outcome
pub fn record_issue_outcome(outcome: &str) {
    ISSUE_OUTCOMES.with_label_values(&[outcome]).inc();
}

/// Increment API error counter
pub fn record_api_error(error_type: &str, tracker: &str) {
    API_ERRORS.with_label_values(&[error_type, tracker]).inc();
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::SyncError::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::SyncError::Other(format!("Metrics are not UTF-8: {}", e)))
}

/// Write the text exposition to `path`
pub fn write_metrics_file(path: &Path) -> Result<()> {
    let content = encode_metrics()?;
    std::fs::write(path, content)?;
    tracing::debug!(path = %path.display(), "Metrics written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        record_pass("success", 1.5);
        record_issue_outcome("created");
        record_api_error("503", "JIRA");
    }

    #[test]
    fn test_encode_metrics() {
        record_pass("success", 0.1);
        record_issue_outcome("updated");

        let output = encode_metrics().unwrap();
        assert!(output.contains("issues_sync_passes_total"));
        assert!(output.contains("issues_sync_issue_outcomes_total"));
    }

    #[test]
    fn test_write_metrics_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.prom");

        record_pass("partial", 2.0);
        write_metrics_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("issues_sync_pass_duration_seconds"));
    }
}
