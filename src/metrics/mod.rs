//! Metrics for Transcribe API
//!
//! A pluggable metrics layer: the [`MetricsExporter`] trait is implemented by a
//! Prometheus backend and a no-op backend, and the [`Metrics`] facade offers the
//! recorders used by the request handler and the pipeline. Recording never fails a
//! request; exporter errors are logged and dropped.

pub mod error;
pub mod null;
pub mod prometheus;

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;

pub use self::error::MetricsError;
use self::error::validation;
use self::null::NullExporter;
use self::prometheus::PrometheusExporter;

/// Metrics exporter trait for pluggable monitoring systems
#[async_trait]
pub trait MetricsExporter: Send + Sync {
    /// Increment a counter metric by 1
    async fn increment(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError>;

    /// Set a gauge metric to a specific value
    async fn set_gauge(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError>;

    /// Observe a value in a histogram metric
    async fn observe_histogram(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError>;

    /// Export metrics in the format expected by the monitoring system
    async fn export(&self) -> Result<Vec<u8>, MetricsError>;
}

/// Metrics facade for the application
#[derive(Clone)]
pub struct Metrics {
    exporter: Arc<dyn MetricsExporter>,
}

impl Metrics {
    pub fn new(exporter: Arc<dyn MetricsExporter>) -> Self {
        Self { exporter }
    }

    /// Metrics that record nothing
    pub fn disabled() -> Self {
        Self::new(create_null_exporter())
    }

    pub async fn increment(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        self.exporter.increment(name, labels).await
    }

    pub async fn set_gauge(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        self.exporter.set_gauge(name, value, labels).await
    }

    pub async fn observe_histogram(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        self.exporter.observe_histogram(name, value, labels).await
    }

    /// Export metrics in the format expected by the monitoring system
    pub async fn export(&self) -> Result<Vec<u8>, MetricsError> {
        self.exporter.export().await
    }

    // Convenience recorders

    /// Record HTTP request count and duration
    pub async fn record_http_request(&self, endpoint: &str, method: &str, status: &str, duration: f64) {
        let labels = [("endpoint", endpoint), ("method", method), ("status", status)];
        self.observe_or_warn("http_request_duration_seconds", duration, &labels)
            .await;
        self.increment_or_warn("http_requests_total", &labels).await;
    }

    /// Record the size of an accepted upload
    pub async fn record_upload_size(&self, size_bytes: usize) {
        match validation::validate_usize_conversion(size_bytes) {
            Ok(size) => self.observe_or_warn("upload_size_bytes", size, &[]).await,
            Err(e) => warn!("Failed to record upload size {}: {}", size_bytes, e),
        }
    }

    /// Record the duration and outcome of a pipeline stage ("transcode", "transcribe")
    pub async fn record_stage(&self, stage: &str, outcome: &str, duration: f64) {
        let labels = [("stage", stage), ("outcome", outcome)];
        self.observe_or_warn("pipeline_stage_duration_seconds", duration, &labels)
            .await;
        self.increment_or_warn("pipeline_stages_total", &labels).await;
    }

    /// Record scratch files that could not be deleted
    pub async fn record_cleanup_failures(&self, count: usize) {
        for _ in 0..count {
            self.increment_or_warn("scratch_cleanup_failures_total", &[])
                .await;
        }
    }

    async fn increment_or_warn(&self, name: &str, labels: &[(&str, &str)]) {
        if let Err(e) = self.exporter.increment(name, labels).await {
            warn!("Failed to increment counter '{}': {}", name, e);
        }
    }

    async fn observe_or_warn(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        if let Err(e) = self.exporter.observe_histogram(name, value, labels).await {
            warn!("Failed to observe histogram '{}': {}", name, e);
        }
    }
}

/// Factory function to create a metrics exporter based on configuration
pub fn create_metrics_exporter(exporter_type: &str) -> Arc<dyn MetricsExporter> {
    match exporter_type.trim().to_lowercase().as_str() {
        "prometheus" => {
            debug!("Initializing Prometheus metrics exporter");
            Arc::new(PrometheusExporter::new())
        }
        "none" | "null" | "disabled" => {
            debug!("Metrics disabled, using null exporter");
            create_null_exporter()
        }
        other => {
            warn!(
                "Unknown metrics exporter type '{}', using null exporter",
                other
            );
            create_null_exporter()
        }
    }
}

pub fn create_prometheus_exporter() -> Arc<dyn MetricsExporter> {
    Arc::new(PrometheusExporter::new())
}

pub fn create_null_exporter() -> Arc<dyn MetricsExporter> {
    Arc::new(NullExporter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_convenience_recorders_reach_exporter() {
        let metrics = Metrics::new(create_prometheus_exporter());

        metrics
            .record_http_request("/api/transcribe", "POST", "200", 0.5)
            .await;
        metrics.record_upload_size(4096).await;
        metrics.record_stage("transcode", "success", 1.5).await;
        metrics.record_stage("transcribe", "failure", 0.2).await;
        metrics.record_cleanup_failures(2).await;

        let exported = String::from_utf8(metrics.export().await.unwrap()).unwrap();
        assert!(exported.contains("http_requests_total"));
        assert!(exported.contains("upload_size_bytes"));
        assert!(exported.contains("pipeline_stages_total"));
        assert!(exported.contains("outcome=\"failure\""));
        assert!(exported.contains("scratch_cleanup_failures_total 2"));
    }

    #[tokio::test]
    async fn test_null_exporter_never_fails() {
        let metrics = Metrics::disabled();

        metrics.record_stage("transcode", "success", f64::NAN).await;
        assert!(metrics.increment("any_name", &[]).await.is_ok());
        assert_eq!(metrics.export().await.unwrap(), b"");
    }

    #[test]
    fn test_factory_falls_back_to_null() {
        // Neither call may panic; unknown backends degrade to the null exporter
        let _ = create_metrics_exporter("prometheus");
        let _ = create_metrics_exporter("statsd");
        let _ = create_metrics_exporter("NONE");
    }
}
