//! Metrics module
//!
//! Prometheus counters for uploads and readiness probes, registered in the
//! default registry on first use.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref FILE_UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "sandbox_file_uploads_total",
        "Total number of model file uploads",
        &["mode", "status"]  // mode: "single" or "multipart"
    ).unwrap();

    pub static ref FILES_SKIPPED_TOTAL: Counter = register_counter!(
        "sandbox_files_skipped_total",
        "Files skipped because no upload target was allocated"
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "sandbox_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "sandbox_upload_duration_seconds",
        "Per-file upload duration in seconds",
        &["mode"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    // Multipart metrics
    pub static ref PARTS_UPLOADED_TOTAL: Counter = register_counter!(
        "sandbox_parts_uploaded_total",
        "Multipart parts acknowledged with an ETag"
    ).unwrap();

    // Probe metrics
    pub static ref PROBE_ATTEMPTS_TOTAL: Counter = register_counter!(
        "sandbox_probe_attempts_total",
        "Readiness probe attempts"
    ).unwrap();

    pub static ref PROBE_OUTCOMES_TOTAL: CounterVec = register_counter_vec!(
        "sandbox_probe_outcomes_total",
        "Readiness waits by outcome",
        &["outcome"]  // "ready" or "exhausted"
    ).unwrap();
}

/// Record a finished file upload
pub fn record_file_upload(mode: &str, success: bool, bytes: u64, duration_secs: f64) {
    let status = if success { "success" } else { "failure" };
    FILE_UPLOADS_TOTAL.with_label_values(&[mode, status]).inc();
    UPLOAD_DURATION.with_label_values(&[mode]).observe(duration_secs);
    if success {
        UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
    }
}

/// Record a file skipped for lack of an upload target
pub fn record_file_skipped() {
    FILES_SKIPPED_TOTAL.inc();
}

/// Record an acknowledged multipart part
pub fn record_part_uploaded() {
    PARTS_UPLOADED_TOTAL.inc();
}

/// Record a single readiness probe attempt
pub fn record_probe_attempt() {
    PROBE_ATTEMPTS_TOTAL.inc();
}

/// Record how a readiness wait ended
pub fn record_probe_outcome(ready: bool) {
    let outcome = if ready { "ready" } else { "exhausted" };
    PROBE_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Render the default registry in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
