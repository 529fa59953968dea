// Configuration validation module for Transcribe API
//
// This module validates configuration parameters and environment variables before the
// server starts, so that a misconfigured deployment fails fast with clear, actionable
// error messages instead of failing every request.
//
// The validation system is schema-driven: a centralized parameter registry defines the
// type, default value and constraints of every configuration option.

use std::env;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use log::{error, info, warn};

use crate::config::{defaults, parse_flag, vars};
use crate::transcoder::resolve_executable;

/// Configuration parameter types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigType {
    String,
    UnsignedInteger,
    Boolean,
    IpAddress,
    Port,
    Url,
    Enum(&'static [&'static str]),
}

/// Validation severity levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationLevel {
    Critical, // Must be valid for application to start
    Warning,  // Invalid values fall back to defaults with a warning
}

/// Configuration parameter definition
#[derive(Debug, Clone)]
pub struct ConfigParam {
    pub name: &'static str,
    pub description: &'static str,
    pub param_type: ConfigType,
    pub required: bool,
    pub validation_level: ValidationLevel,
    pub max_value: Option<u64>,
}

/// Centralized configuration parameter registry
pub const CONFIG_PARAMS: &[ConfigParam] = &[
    // Server
    ConfigParam {
        name: vars::HOST,
        description: "Host IP address for the API server",
        param_type: ConfigType::IpAddress,
        required: false,
        validation_level: ValidationLevel::Critical,
        max_value: None,
    },
    ConfigParam {
        name: vars::PORT,
        description: "Port for the API server",
        param_type: ConfigType::Port,
        required: false,
        validation_level: ValidationLevel::Critical,
        max_value: None,
    },
    ConfigParam {
        name: vars::KEEPALIVE,
        description: "Keep-alive timeout in seconds",
        param_type: ConfigType::UnsignedInteger,
        required: false,
        validation_level: ValidationLevel::Warning,
        max_value: Some(3600),
    },
    ConfigParam {
        name: vars::HTTP_WORKER_NUMBER,
        description: "Number of HTTP workers (0 = use CPU cores)",
        param_type: ConfigType::UnsignedInteger,
        required: false,
        validation_level: ValidationLevel::Warning,
        max_value: Some(64),
    },
    // Request handling
    ConfigParam {
        name: vars::TMP_DIR,
        description: "Directory for scratch files",
        param_type: ConfigType::String,
        required: false,
        validation_level: ValidationLevel::Warning,
        max_value: None,
    },
    ConfigParam {
        name: vars::MAX_FILE_SIZE,
        description: "Maximum upload size in bytes",
        param_type: ConfigType::UnsignedInteger,
        required: false,
        validation_level: ValidationLevel::Critical,
        max_value: None,
    },
    ConfigParam {
        name: vars::REQUEST_TIMEOUT,
        description: "Bound on one request's pipeline in seconds (0 = unbounded)",
        param_type: ConfigType::UnsignedInteger,
        required: false,
        validation_level: ValidationLevel::Warning,
        max_value: Some(86_400),
    },
    // Transcoder
    ConfigParam {
        name: vars::TRANSCODE_ENABLED,
        description: "Normalize uploads to mono 16 kHz PCM WAV before transcription",
        param_type: ConfigType::Boolean,
        required: false,
        validation_level: ValidationLevel::Critical,
        max_value: None,
    },
    ConfigParam {
        name: vars::FFMPEG_PATH,
        description: "Path or name of the ffmpeg executable",
        param_type: ConfigType::String,
        required: false,
        validation_level: ValidationLevel::Warning,
        max_value: None,
    },
    ConfigParam {
        name: vars::TRANSCODE_TIMEOUT,
        description: "Bound on one transcoding process in seconds (0 = unbounded)",
        param_type: ConfigType::UnsignedInteger,
        required: false,
        validation_level: ValidationLevel::Warning,
        max_value: Some(86_400),
    },
    // Inference service
    ConfigParam {
        name: vars::OPENAI_API_KEY,
        description: "Credential for the speech-to-text service",
        param_type: ConfigType::String,
        required: true,
        validation_level: ValidationLevel::Critical,
        max_value: None,
    },
    ConfigParam {
        name: vars::OPENAI_BASE_URL,
        description: "Base URL of the OpenAI-compatible API",
        param_type: ConfigType::Url,
        required: false,
        validation_level: ValidationLevel::Critical,
        max_value: None,
    },
    ConfigParam {
        name: vars::TRANSCRIPTION_MODEL,
        description: "Speech-to-text model identifier",
        param_type: ConfigType::String,
        required: false,
        validation_level: ValidationLevel::Warning,
        max_value: None,
    },
    ConfigParam {
        name: vars::TRANSCRIPTION_TIMEOUT,
        description: "Bound on one inference call in seconds (0 = unbounded)",
        param_type: ConfigType::UnsignedInteger,
        required: false,
        validation_level: ValidationLevel::Warning,
        max_value: Some(86_400),
    },
    // Metrics
    ConfigParam {
        name: vars::METRICS_BACKEND,
        description: "Metrics backend type",
        param_type: ConfigType::Enum(&["prometheus", "none", "null", "disabled"]),
        required: false,
        validation_level: ValidationLevel::Warning,
        max_value: None,
    },
];

/// Configuration validation errors with detailed context
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub error_type: ConfigErrorType,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigErrorType {
    InvalidValue,
    InvalidFormat,
    InvalidRange,
    FileNotFound,
    Required,
}

impl ConfigValidationError {
    fn new(
        field: &str,
        value: &str,
        error_type: ConfigErrorType,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
            error_type,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The credential value is never echoed
        let value = if self.field == vars::OPENAI_API_KEY && !self.value.is_empty() {
            "<redacted>"
        } else {
            self.value.as_str()
        };
        write!(
            f,
            "Configuration error in '{}' ({:?}): {} (value: '{}')",
            self.field, self.error_type, self.message, value
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " - Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result type for configuration validation
pub type ValidationResult<T> = Result<T, ConfigValidationError>;

/// Configuration validation results
#[derive(Debug, Default)]
pub struct ValidationResults {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ConfigValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ConfigValidationError) {
        self.warnings.push(warning);
    }

    pub fn print_summary(&self) {
        if !self.errors.is_empty() {
            error!(
                "Configuration validation found {} error(s):",
                self.errors.len()
            );
            for (i, err) in self.errors.iter().enumerate() {
                error!("  {}. {}", i + 1, err);
            }
        }

        if !self.warnings.is_empty() {
            warn!(
                "Configuration validation found {} warning(s):",
                self.warnings.len()
            );
            for (i, warning) in self.warnings.iter().enumerate() {
                warn!("  {}. {}", i + 1, warning);
            }
        }

        if self.is_valid() && self.warnings.is_empty() {
            info!("Configuration validation passed successfully");
        } else if self.is_valid() {
            info!(
                "Configuration validation passed with {} warning(s)",
                self.warnings.len()
            );
        }
    }
}

/// Helper functions for common validation patterns
pub mod validators {
    use super::*;

    /// Validate boolean values from string
    pub fn validate_boolean(field: &str, value: &str) -> ValidationResult<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "false" | "0" | "no" | "off" => Ok(parse_flag(value)),
            _ => Err(ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidValue,
                "Invalid boolean value",
                "Use 'true' or 'false'",
            )),
        }
    }

    /// Validate unsigned integer values with an optional upper bound
    pub fn validate_unsigned(field: &str, value: &str, max: Option<u64>) -> ValidationResult<u64> {
        let parsed = value.trim().parse::<u64>().map_err(|_| {
            ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidFormat,
                "Invalid unsigned integer format",
                "Use a non-negative integer",
            )
        })?;

        if let Some(max) = max {
            if parsed > max {
                return Err(ConfigValidationError::new(
                    field,
                    value,
                    ConfigErrorType::InvalidRange,
                    format!("Value {} is above maximum {}", parsed, max),
                    format!("Use a value <= {}", max),
                ));
            }
        }

        Ok(parsed)
    }

    /// Validate enumerated values (case-insensitive)
    pub fn validate_enum(field: &str, value: &str, allowed: &[&str]) -> ValidationResult<String> {
        let lowered = value.trim().to_lowercase();
        if allowed.contains(&lowered.as_str()) {
            Ok(lowered)
        } else {
            Err(ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidValue,
                "Unsupported value",
                format!("Use one of: {}", allowed.join(", ")),
            ))
        }
    }

    /// Validate IP address
    pub fn validate_ip_address(field: &str, value: &str) -> ValidationResult<IpAddr> {
        IpAddr::from_str(value.trim()).map_err(|_| {
            ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidFormat,
                "Invalid IP address format",
                "Use a valid IPv4 or IPv6 address (e.g., 127.0.0.1 or ::1)",
            )
        })
    }

    /// Validate port number
    pub fn validate_port(field: &str, value: &str) -> ValidationResult<u16> {
        let port = value.trim().parse::<u16>().map_err(|_| {
            ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidFormat,
                "Invalid port number format",
                "Use a number between 1 and 65535",
            )
        })?;

        if port == 0 {
            return Err(ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidRange,
                "Port number cannot be 0",
                "Use a port between 1 and 65535",
            ));
        }

        Ok(port)
    }

    /// Validate an http(s) base URL
    pub fn validate_url(field: &str, value: &str) -> ValidationResult<String> {
        let trimmed = value.trim();
        let rest = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(trimmed.to_string()),
            _ => Err(ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidFormat,
                "Invalid URL",
                "Use an absolute http:// or https:// URL (e.g., https://api.openai.com/v1)",
            )),
        }
    }

    /// Validate that an executable can be located
    pub fn validate_executable(field: &str, value: &str) -> ValidationResult<String> {
        match resolve_executable(value.trim()) {
            Some(path) => Ok(path.display().to_string()),
            None => Err(ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::FileNotFound,
                "Executable not found",
                format!(
                    "Install ffmpeg, or set {} to its full path, or disable {}",
                    vars::FFMPEG_PATH,
                    vars::TRANSCODE_ENABLED
                ),
            )),
        }
    }
}

/// Validates configuration read through a lookup function
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the process environment (fail-fast)
    pub fn validate_critical() -> Result<ValidationResults, ValidationResults> {
        info!("Running configuration validation...");
        let results = Self::validate_with(|name| env::var(name).ok());
        results.print_summary();
        if results.is_valid() {
            Ok(results)
        } else {
            Err(results)
        }
    }

    /// Validate every registered parameter plus cross-parameter dependencies
    ///
    /// Invalid values of `Critical` parameters are errors; invalid values of other
    /// parameters are warnings, and the application falls back to their defaults.
    pub fn validate_with<F>(lookup: F) -> ValidationResults
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut results = ValidationResults::new();

        for param in CONFIG_PARAMS {
            let value = lookup(param.name).filter(|v| !v.trim().is_empty());
            let value = match value {
                Some(value) => value,
                None => {
                    if param.required {
                        results.add_error(ConfigValidationError::new(
                            param.name,
                            "",
                            ConfigErrorType::Required,
                            format!("Required parameter is missing ({})", param.description),
                            format!("Set the {} environment variable", param.name),
                        ));
                    }
                    continue;
                }
            };

            if let Err(e) = Self::validate_parameter(param, &value) {
                match param.validation_level {
                    ValidationLevel::Critical => results.add_error(e),
                    ValidationLevel::Warning => results.add_warning(e),
                }
            }
        }

        Self::validate_cross_dependencies(&mut results, &lookup);
        results
    }

    fn validate_parameter(param: &ConfigParam, value: &str) -> ValidationResult<()> {
        match param.param_type {
            ConfigType::String => Ok(()),
            ConfigType::UnsignedInteger => {
                validators::validate_unsigned(param.name, value, param.max_value).map(|_| ())
            }
            ConfigType::Boolean => validators::validate_boolean(param.name, value).map(|_| ()),
            ConfigType::IpAddress => validators::validate_ip_address(param.name, value).map(|_| ()),
            ConfigType::Port => validators::validate_port(param.name, value).map(|_| ()),
            ConfigType::Url => validators::validate_url(param.name, value).map(|_| ()),
            ConfigType::Enum(allowed) => {
                validators::validate_enum(param.name, value, allowed).map(|_| ())
            }
        }
    }

    /// Validate cross-parameter dependencies
    fn validate_cross_dependencies<F>(results: &mut ValidationResults, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // The transcoder executable is only needed when transcoding is on
        let transcode_enabled = lookup(vars::TRANSCODE_ENABLED)
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults::TRANSCODE_ENABLED);
        if transcode_enabled {
            let ffmpeg = lookup(vars::FFMPEG_PATH)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| defaults::FFMPEG_PATH.to_string());
            if let Err(e) = validators::validate_executable(vars::FFMPEG_PATH, &ffmpeg) {
                results.add_error(e);
            }
        }

        if let Some(size) = lookup(vars::MAX_FILE_SIZE) {
            if size.trim() == "0" {
                results.add_error(ConfigValidationError::new(
                    vars::MAX_FILE_SIZE,
                    &size,
                    ConfigErrorType::InvalidRange,
                    "Upload cap of 0 bytes rejects every request",
                    "Use a positive size in bytes",
                ));
            }
        }
    }
}
