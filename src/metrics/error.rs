//! Error types for the metrics system
//!
//! Metric operations return these errors instead of panicking; the [`Metrics`](super::Metrics)
//! facade logs them and never lets them reach a request.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MetricsError {
    /// Invalid metric name (empty, invalid characters, wrong format)
    #[error("Invalid metric name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Invalid label name or value
    #[error("Invalid label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },

    /// Metric registration failed (duplicate registration, type conflict)
    #[error("Failed to register metric '{name}': {reason}")]
    RegistrationFailed { name: String, reason: String },

    /// Metric export failed
    #[error("Failed to export metrics: {reason}")]
    ExportFailed { reason: String },

    /// Value is not representable (NaN, infinite, precision loss)
    #[error("Invalid value '{value}': {reason}")]
    InvalidValue { value: String, reason: String },
}

impl MetricsError {
    pub fn invalid_name<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_label<L: Into<String>, R: Into<String>>(label: L, reason: R) -> Self {
        Self::InvalidLabel {
            label: label.into(),
            reason: reason.into(),
        }
    }

    pub fn registration_failed<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::RegistrationFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn export_failed<R: Into<String>>(reason: R) -> Self {
        Self::ExportFailed {
            reason: reason.into(),
        }
    }

    pub fn invalid_value<V: fmt::Display, R: Into<String>>(value: V, reason: R) -> Self {
        Self::InvalidValue {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validation functions for metric names, labels and values
pub mod validation {
    use super::MetricsError;
    use std::collections::HashSet;

    /// Label names reserved by Prometheus
    const RESERVED_LABELS: &[&str] = &["__name__", "__value__"];

    const MAX_LABEL_VALUE_LENGTH: usize = 1024;

    /// Metric names must start with a letter or underscore and contain only
    /// letters, digits, underscores and colons
    pub fn validate_metric_name(name: &str) -> Result<(), MetricsError> {
        let mut chars = name.chars();
        match chars.next() {
            None => return Err(MetricsError::invalid_name(name, "Metric name cannot be empty")),
            Some(first) if !first.is_ascii_alphabetic() && first != '_' => {
                return Err(MetricsError::invalid_name(
                    name,
                    "Metric name must start with a letter or underscore",
                ))
            }
            _ => {}
        }

        if let Some(ch) = chars.find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_' && *ch != ':') {
            return Err(MetricsError::invalid_name(
                name,
                format!("Invalid character '{}'", ch),
            ));
        }
        Ok(())
    }

    pub fn validate_label_key(key: &str) -> Result<(), MetricsError> {
        if RESERVED_LABELS.contains(&key) {
            return Err(MetricsError::invalid_label(key, "Label key is reserved"));
        }

        let mut chars = key.chars();
        match chars.next() {
            None => return Err(MetricsError::invalid_label(key, "Label key cannot be empty")),
            Some(first) if !first.is_ascii_alphabetic() && first != '_' => {
                return Err(MetricsError::invalid_label(
                    key,
                    "Label key must start with a letter or underscore",
                ))
            }
            _ => {}
        }

        if chars.any(|ch| !ch.is_ascii_alphanumeric() && ch != '_') {
            return Err(MetricsError::invalid_label(key, "Invalid character in label key"));
        }
        Ok(())
    }

    pub fn validate_labels(labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        let mut seen = HashSet::new();
        for (key, value) in labels {
            validate_label_key(key)?;
            if value.len() > MAX_LABEL_VALUE_LENGTH {
                return Err(MetricsError::invalid_label(*key, "Label value too long"));
            }
            if !seen.insert(key) {
                return Err(MetricsError::invalid_label(*key, "Duplicate label key"));
            }
        }
        Ok(())
    }

    pub fn validate_numeric_value(value: f64) -> Result<(), MetricsError> {
        if !value.is_finite() {
            return Err(MetricsError::invalid_value(
                value,
                "Value must be finite (not NaN or infinite)",
            ));
        }
        Ok(())
    }

    /// usize to f64 without silent precision loss
    pub fn validate_usize_conversion(value: usize) -> Result<f64, MetricsError> {
        if value as u64 > (1u64 << 53) {
            return Err(MetricsError::invalid_value(
                value,
                "Value too large for accurate f64 conversion",
            ));
        }
        Ok(value as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;

    #[test]
    fn test_validate_metric_name() {
        assert!(validate_metric_name("http_requests_total").is_ok());
        assert!(validate_metric_name("_internal").is_ok());
        assert!(validate_metric_name("process:cpu_seconds").is_ok());

        assert!(validate_metric_name("").is_err());
        assert!(validate_metric_name("1st").is_err());
        assert!(validate_metric_name("bad-name").is_err());
    }

    #[test]
    fn test_validate_labels() {
        assert!(validate_labels(&[("stage", "transcode"), ("outcome", "success")]).is_ok());
        assert!(validate_labels(&[("stage", "a"), ("stage", "b")]).is_err());
        assert!(validate_labels(&[("__name__", "x")]).is_err());
        assert!(validate_labels(&[("", "x")]).is_err());
    }

    #[test]
    fn test_validate_numeric_value() {
        assert!(validate_numeric_value(0.25).is_ok());
        assert!(validate_numeric_value(f64::NAN).is_err());
        assert!(validate_numeric_value(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_usize_conversion() {
        assert_eq!(validate_usize_conversion(42).unwrap(), 42.0);
    }
}
