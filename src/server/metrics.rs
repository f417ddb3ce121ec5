use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all karaoke server metrics
const PREFIX: &str = "karaoke";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 60.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Library Metrics
    pub static ref LIBRARY_FETCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_library_fetches_total"), "Video lookups by outcome"),
        &["outcome"]
    ).expect("Failed to create library_fetches_total metric");

    pub static ref LIBRARY_EVICTIONS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_library_evictions_total"),
        "Temporary videos whose file was evicted"
    ).expect("Failed to create library_evictions_total metric");

    pub static ref LIBRARY_PROMOTIONS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_library_promotions_total"),
        "Videos promoted to the saved store"
    ).expect("Failed to create library_promotions_total metric");

    pub static ref LIBRARY_VIDEOS: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_library_videos"), "Ledger entries by storage tier"),
        &["location"]
    ).expect("Failed to create library_videos metric");

    // Queue / WebSocket Metrics
    pub static ref QUEUE_LENGTH: IntGauge = IntGauge::new(
        format!("{PREFIX}_queue_length"),
        "Songs currently in the queue"
    ).expect("Failed to create queue_length metric");

    pub static ref WS_CONNECTIONS: IntGauge = IntGauge::new(
        format!("{PREFIX}_ws_connections"),
        "Live WebSocket connections"
    ).expect("Failed to create ws_connections metric");

    pub static ref WS_RESYNCS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_ws_resyncs_total"),
        "Snapshot resyncs after the relay fell behind the queue"
    ).expect("Failed to create ws_resyncs_total metric");

    // Process Metrics
    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(LIBRARY_FETCHES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(LIBRARY_EVICTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(LIBRARY_PROMOTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(LIBRARY_VIDEOS.clone()));
    let _ = REGISTRY.register(Box::new(QUEUE_LENGTH.clone()));
    let _ = REGISTRY.register(Box::new(WS_CONNECTIONS.clone()));
    let _ = REGISTRY.register(Box::new(WS_RESYNCS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a video lookup: `hit`, `downloaded` or `failed`
pub fn record_library_fetch(outcome: &str) {
    LIBRARY_FETCHES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_library_evictions(count: usize) {
    LIBRARY_EVICTIONS_TOTAL.inc_by(count as u64);
}

pub fn record_library_promotion() {
    LIBRARY_PROMOTIONS_TOTAL.inc();
}

pub fn set_library_videos(saved: usize, temp: usize) {
    LIBRARY_VIDEOS.with_label_values(&["saved"]).set(saved as f64);
    LIBRARY_VIDEOS.with_label_values(&["temp"]).set(temp as f64);
}

pub fn set_queue_length(length: usize) {
    QUEUE_LENGTH.set(length as i64);
}

pub fn set_ws_connections(count: usize) {
    WS_CONNECTIONS.set(count as i64);
}

pub fn record_ws_resync() {
    WS_RESYNCS_TOTAL.inc();
}

/// Collapse ids in paths so label cardinality stays bounded.
pub fn categorize_endpoint(path: &str) -> String {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["api", "video", _] => "/api/video/{id}".to_string(),
        ["api", "queue", "reorder"] => "/api/queue/reorder".to_string(),
        ["api", "queue", _] => "/api/queue/{id}".to_string(),
        ["api", "library", "videos", _] => "/api/library/videos/{id}".to_string(),
        ["api", "library", "videos", _, "save"] => "/api/library/videos/{id}/save".to_string(),
        ["api", "queue" | "playback"]
        | ["api", "library", "stats" | "videos"]
        | ["ws"]
        | [""] => path.to_string(),
        ["api", ..] => "/api/other".to_string(),
        _ => "/static".to_string(),
    }
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // RSS is reported in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(name: &str) -> bool {
        REGISTRY
            .gather()
            .iter()
            .any(|m| m.get_name() == format!("{PREFIX}_{name}"))
    }

    #[test]
    fn test_metrics_initialization() {
        init_metrics();

        let metric_families = REGISTRY.gather();
        assert!(!metric_families.is_empty(), "Metrics should be registered");
    }

    #[test]
    fn test_record_http_request() {
        init_metrics();

        record_http_request("GET", "/api/queue", 200, Duration::from_millis(50));

        assert!(find("http_requests_total"), "HTTP request metrics should exist");
    }

    #[test]
    fn test_library_metrics() {
        init_metrics();

        record_library_fetch("hit");
        record_library_evictions(2);
        record_library_promotion();
        set_library_videos(1, 3);

        assert!(find("library_fetches_total"));
        assert!(find("library_evictions_total"));
        assert!(find("library_promotions_total"));
        assert!(find("library_videos"));
    }

    #[test]
    fn test_categorize_endpoint() {
        assert_eq!(categorize_endpoint("/api/video/abc123"), "/api/video/{id}");
        assert_eq!(categorize_endpoint("/api/queue/reorder"), "/api/queue/reorder");
        assert_eq!(categorize_endpoint("/api/queue/some-uuid"), "/api/queue/{id}");
        assert_eq!(
            categorize_endpoint("/api/library/videos/abc/save"),
            "/api/library/videos/{id}/save"
        );
        assert_eq!(categorize_endpoint("/api/queue"), "/api/queue");
        assert_eq!(categorize_endpoint("/api/library/stats"), "/api/library/stats");
        assert_eq!(categorize_endpoint("/ws"), "/ws");
        assert_eq!(categorize_endpoint("/api/made-up-1"), "/api/other");
        assert_eq!(categorize_endpoint("/api/library/nope/x/y"), "/api/other");
        assert_eq!(categorize_endpoint("/"), "/");
        assert_eq!(categorize_endpoint("/assets/app.js"), "/static");
    }
}
