//! Prometheus-compatible metrics for the uilens server.
//!
//! Tracks request counts and device activity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Total HTTP requests served.
    http_requests_total: AtomicU64,
    /// Total HTTP errors (4xx + 5xx).
    http_errors_total: AtomicU64,
    /// Total device sessions opened or reused through `/connect`.
    device_connects_total: AtomicU64,
    /// Total device commands dispatched (REST and WebSocket).
    device_commands_total: AtomicU64,
    device_command_errors_total: AtomicU64,
    screenshots_total: AtomicU64,
    hierarchy_dumps_total: AtomicU64,
    ws_connections_total: AtomicU64,
    /// Total screen frames pushed over WebSockets.
    ws_frames_total: AtomicU64,
    widgets_created_total: AtomicU64,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                http_errors_total: AtomicU64::new(0),
                device_connects_total: AtomicU64::new(0),
                device_commands_total: AtomicU64::new(0),
                device_command_errors_total: AtomicU64::new(0),
                screenshots_total: AtomicU64::new(0),
                hierarchy_dumps_total: AtomicU64::new(0),
                ws_connections_total: AtomicU64::new(0),
                ws_frames_total: AtomicU64::new(0),
                widgets_created_total: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn inc_http_requests(&self) {
        self.inner
            .http_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_http_errors(&self) {
        self.inner.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_device_connects(&self) {
        self.inner
            .device_connects_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_device_commands(&self) {
        self.inner
            .device_commands_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_device_command_errors(&self) {
        self.inner
            .device_command_errors_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_screenshots(&self) {
        self.inner.screenshots_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hierarchy_dumps(&self) {
        self.inner
            .hierarchy_dumps_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ws_connections(&self) {
        self.inner
            .ws_connections_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ws_frames(&self) {
        self.inner.ws_frames_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_widgets_created(&self) {
        self.inner
            .widgets_created_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Render metrics in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let m = &self.inner;

        format!(
            r#"# HELP uilens_uptime_seconds Time since the server started.
# TYPE uilens_uptime_seconds gauge
uilens_uptime_seconds {}

# HELP uilens_http_requests_total Total HTTP requests served.
# TYPE uilens_http_requests_total counter
uilens_http_requests_total {}

# HELP uilens_http_errors_total Total HTTP errors (4xx/5xx).
# TYPE uilens_http_errors_total counter
uilens_http_errors_total {}

# HELP uilens_device_connects_total Total device connect requests.
# TYPE uilens_device_connects_total counter
uilens_device_connects_total {}

# HELP uilens_device_commands_total Total device commands dispatched.
# TYPE uilens_device_commands_total counter
uilens_device_commands_total {}

# HELP uilens_device_command_errors_total Total device commands that failed.
# TYPE uilens_device_command_errors_total counter
uilens_device_command_errors_total {}

# HELP uilens_screenshots_total Total screenshots captured.
# TYPE uilens_screenshots_total counter
uilens_screenshots_total {}

# HELP uilens_hierarchy_dumps_total Total view-hierarchy dumps.
# TYPE uilens_hierarchy_dumps_total counter
uilens_hierarchy_dumps_total {}

# HELP uilens_ws_connections_total Total device WebSocket connections.
# TYPE uilens_ws_connections_total counter
uilens_ws_connections_total {}

# HELP uilens_ws_frames_total Total screen frames pushed over WebSockets.
# TYPE uilens_ws_frames_total counter
uilens_ws_frames_total {}

# HELP uilens_widgets_created_total Total widgets saved to the catalog.
# TYPE uilens_widgets_created_total counter
uilens_widgets_created_total {}
"#,
            self.uptime_secs(),
            m.http_requests_total.load(Ordering::Relaxed),
            m.http_errors_total.load(Ordering::Relaxed),
            m.device_connects_total.load(Ordering::Relaxed),
            m.device_commands_total.load(Ordering::Relaxed),
            m.device_command_errors_total.load(Ordering::Relaxed),
            m.screenshots_total.load(Ordering::Relaxed),
            m.hierarchy_dumps_total.load(Ordering::Relaxed),
            m.ws_connections_total.load(Ordering::Relaxed),
            m.ws_frames_total.load(Ordering::Relaxed),
            m.widgets_created_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counter_increments() {
        let m = Metrics::new();
        m.inc_http_requests();
        m.inc_http_requests();
        m.inc_device_commands();
        m.inc_ws_frames();
        let output = m.render_prometheus();
        assert!(output.contains("uilens_http_requests_total 2"));
        assert!(output.contains("uilens_device_commands_total 1"));
        assert!(output.contains("uilens_ws_frames_total 1"));
        assert!(output.contains("uilens_widgets_created_total 0"));
    }

    #[test]
    fn test_metrics_prometheus_format() {
        let m = Metrics::new();
        let output = m.render_prometheus();
        assert!(output.contains("# HELP uilens_uptime_seconds"));
        assert!(output.contains("# TYPE uilens_uptime_seconds gauge"));
        assert!(output.contains("# TYPE uilens_screenshots_total counter"));
    }

    #[test]
    fn test_metrics_clones_share_counters() {
        let m = Metrics::new();
        let clone = m.clone();
        clone.inc_screenshots();
        assert!(m.render_prometheus().contains("uilens_screenshots_total 1"));
    }
}
