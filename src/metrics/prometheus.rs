//! Prometheus metrics exporter implementation
//!
//! Metric vectors are created lazily on first use and registered in a private registry,
//! which `export` renders in the Prometheus text exposition format.

use crate::metrics::error::{validation, MetricsError};
use crate::metrics::MetricsExporter;
use async_trait::async_trait;
use log::debug;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use tokio::sync::Mutex;

pub struct PrometheusExporter {
    registry: Registry,
    counters: Mutex<HashMap<String, CounterVec>>,
    gauges: Mutex<HashMap<String, GaugeVec>>,
    histograms: Mutex<HashMap<String, HistogramVec>>,
}

impl Default for PrometheusExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusExporter {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            counters: Mutex::new(HashMap::new()),
            gauges: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
        }
    }

    /// Human-readable help text derived from the metric name
    fn help_text(name: &str, metric_type: &str) -> String {
        format!("{} ({})", name.replace('_', " "), metric_type)
    }

    /// Buckets sized for the kind of value the metric tracks
    fn histogram_buckets(name: &str) -> Vec<f64> {
        if name.contains("bytes") {
            vec![
                16_384.0, 65_536.0, 262_144.0, 1_048_576.0, 4_194_304.0, 16_777_216.0, 67_108_864.0,
            ]
        } else {
            // Seconds: transcoding and remote calls range from sub-second to minutes
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
        }
    }

    fn split_labels<'a>(labels: &'a [(&'a str, &'a str)]) -> (Vec<&'a str>, Vec<&'a str>) {
        labels.iter().map(|(k, v)| (*k, *v)).unzip()
    }

    async fn get_or_create_counter(
        &self,
        name: &str,
        label_names: &[&str],
    ) -> Result<CounterVec, MetricsError> {
        let mut counters = self.counters.lock().await;
        if let Some(counter) = counters.get(name) {
            return Ok(counter.clone());
        }

        let opts = Opts::new(name, Self::help_text(name, "counter"));
        let counter = CounterVec::new(opts, label_names)
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;
        self.registry
            .register(Box::new(counter.clone()))
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;

        counters.insert(name.to_string(), counter.clone());
        Ok(counter)
    }

    async fn get_or_create_gauge(
        &self,
        name: &str,
        label_names: &[&str],
    ) -> Result<GaugeVec, MetricsError> {
        let mut gauges = self.gauges.lock().await;
        if let Some(gauge) = gauges.get(name) {
            return Ok(gauge.clone());
        }

        let opts = Opts::new(name, Self::help_text(name, "gauge"));
        let gauge = GaugeVec::new(opts, label_names)
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;
        self.registry
            .register(Box::new(gauge.clone()))
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;

        gauges.insert(name.to_string(), gauge.clone());
        Ok(gauge)
    }

    async fn get_or_create_histogram(
        &self,
        name: &str,
        label_names: &[&str],
    ) -> Result<HistogramVec, MetricsError> {
        let mut histograms = self.histograms.lock().await;
        if let Some(histogram) = histograms.get(name) {
            return Ok(histogram.clone());
        }

        let opts = HistogramOpts::new(name, Self::help_text(name, "histogram"))
            .buckets(Self::histogram_buckets(name));
        let histogram = HistogramVec::new(opts, label_names)
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;
        self.registry
            .register(Box::new(histogram.clone()))
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;

        histograms.insert(name.to_string(), histogram.clone());
        Ok(histogram)
    }
}

#[async_trait]
impl MetricsExporter for PrometheusExporter {
    async fn increment(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        validation::validate_metric_name(name)?;
        validation::validate_labels(labels)?;
        let (label_names, label_values) = Self::split_labels(labels);

        let counter = self.get_or_create_counter(name, &label_names).await?;
        counter
            .get_metric_with_label_values(&label_values)
            .map_err(|e| MetricsError::invalid_label(name, e.to_string()))?
            .inc();

        debug!("Incremented counter {} with labels {:?}", name, labels);
        Ok(())
    }

    async fn set_gauge(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        validation::validate_metric_name(name)?;
        validation::validate_labels(labels)?;
        validation::validate_numeric_value(value)?;
        let (label_names, label_values) = Self::split_labels(labels);

        let gauge = self.get_or_create_gauge(name, &label_names).await?;
        gauge
            .get_metric_with_label_values(&label_values)
            .map_err(|e| MetricsError::invalid_label(name, e.to_string()))?
            .set(value);

        debug!("Set gauge {} to {} with labels {:?}", name, value, labels);
        Ok(())
    }

    async fn observe_histogram(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        validation::validate_metric_name(name)?;
        validation::validate_labels(labels)?;
        validation::validate_numeric_value(value)?;
        let (label_names, label_values) = Self::split_labels(labels);

        let histogram = self.get_or_create_histogram(name, &label_names).await?;
        histogram
            .get_metric_with_label_values(&label_values)
            .map_err(|e| MetricsError::invalid_label(name, e.to_string()))?
            .observe(value);

        debug!(
            "Observed histogram {} with value {} and labels {:?}",
            name, value, labels
        );
        Ok(())
    }

    async fn export(&self) -> Result<Vec<u8>, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::export_failed(format!("Failed to encode metrics: {}", e)))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prometheus_basic_operations() {
        let exporter = PrometheusExporter::new();

        exporter
            .increment("test_counter", &[("label", "value")])
            .await
            .unwrap();
        exporter.set_gauge("test_gauge", 42.0, &[]).await.unwrap();
        exporter
            .observe_histogram("test_duration_seconds", 1.23, &[("stage", "transcode")])
            .await
            .unwrap();

        let exported = String::from_utf8(exporter.export().await.unwrap()).unwrap();
        assert!(exported.contains("test_counter"));
        assert!(exported.contains("test_gauge 42"));
        assert!(exported.contains("test_duration_seconds_bucket"));
    }

    #[tokio::test]
    async fn test_invalid_inputs_are_rejected() {
        let exporter = PrometheusExporter::new();

        let result = exporter.increment("", &[]).await;
        assert!(matches!(result, Err(MetricsError::InvalidName { .. })));

        let result = exporter.set_gauge("valid_name", f64::INFINITY, &[]).await;
        assert!(matches!(result, Err(MetricsError::InvalidValue { .. })));

        let result = exporter.increment("valid_name", &[("", "value")]).await;
        assert!(matches!(result, Err(MetricsError::InvalidLabel { .. })));
    }

    #[tokio::test]
    async fn test_label_set_mismatch_is_an_error_not_a_panic() {
        let exporter = PrometheusExporter::new();
        exporter
            .increment("mixed_total", &[("stage", "transcode")])
            .await
            .unwrap();

        let result = exporter.increment("mixed_total", &[]).await;
        assert!(result.is_err());
    }
}
