// Configuration loader for Transcribe API
//
// This module handles loading configuration from the TOML configuration file
// and environment variables with appropriate precedence.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use toml::Value;

pub const CONFIG_FILE_PATH: &str = "transcribe_api.conf";

/// Loads configuration from the default TOML file and environment variables
///
/// Configuration precedence (highest to lowest):
/// 1. Environment variables
/// 2. Configuration file values
/// 3. Default values (not handled here - application defaults)
///
/// # Returns
///
/// Returns true if the config file was successfully loaded, false otherwise
pub fn load_config() -> bool {
    load_config_from(Path::new(CONFIG_FILE_PATH))
}

/// Same as [`load_config`], reading the given file
pub fn load_config_from(config_path: &Path) -> bool {
    // Check if configuration file exists
    if !config_path.exists() {
        debug!("Configuration file not found at: {}", config_path.display());
        return false;
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read configuration file: {}", e);
            return false;
        }
    };

    let config_map = match parse_flat_toml(&config_content) {
        Ok(map) => map,
        Err(e) => {
            warn!("Failed to parse configuration file: {}", e);
            return false;
        }
    };

    // Set environment variables from config file if they don't already exist
    for (key, value) in config_map {
        if env::var(&key).is_err() {
            // Never echo the credential
            if key == crate::config::vars::OPENAI_API_KEY {
                debug!("Setting env var from config file: {} = <redacted>", key);
            } else {
                debug!("Setting env var from config file: {} = {}", key, value);
            }
            env::set_var(key, value);
        } else {
            debug!("Env var already exists, skipping: {}", key);
        }
    }

    info!("Configuration loaded from {}", config_path.display());
    true
}

/// Convert a flat TOML document into key-value pairs
///
/// Nested tables and arrays are skipped with a warning.
fn parse_flat_toml(content: &str) -> Result<HashMap<String, String>, toml::de::Error> {
    let config_values: Value = content.parse()?;

    let mut config_map = HashMap::new();
    if let Value::Table(table) = config_values {
        for (key, value) in table {
            match value {
                Value::String(s) => {
                    config_map.insert(key, s);
                }
                Value::Integer(i) => {
                    config_map.insert(key, i.to_string());
                }
                Value::Float(f) => {
                    config_map.insert(key, f.to_string());
                }
                Value::Boolean(b) => {
                    config_map.insert(key, b.to_string());
                }
                _ => {
                    warn!("Skipping unsupported TOML value type for key: {}", key);
                }
            }
        }
    }
    Ok(config_map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_toml() {
        let map = parse_flat_toml(
            r#"
            TRANSCODE_ENABLED = true
            MAX_FILE_SIZE = 1048576
            FFMPEG_PATH = "/usr/bin/ffmpeg"
            [nested]
            ignored = 1
            "#,
        )
        .unwrap();

        assert_eq!(map.get("TRANSCODE_ENABLED").map(String::as_str), Some("true"));
        assert_eq!(map.get("MAX_FILE_SIZE").map(String::as_str), Some("1048576"));
        assert_eq!(map.get("FFMPEG_PATH").map(String::as_str), Some("/usr/bin/ffmpeg"));
        assert!(!map.contains_key("nested"));
    }

    #[test]
    fn test_environment_takes_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcribe_api.conf");
        fs::write(
            &path,
            "LOADER_TEST_FROM_FILE = \"file\"\nLOADER_TEST_ALREADY_SET = \"file\"\n",
        )
        .unwrap();
        env::set_var("LOADER_TEST_ALREADY_SET", "env");

        assert!(load_config_from(&path));

        assert_eq!(env::var("LOADER_TEST_FROM_FILE").unwrap(), "file");
        assert_eq!(env::var("LOADER_TEST_ALREADY_SET").unwrap(), "env");
    }

    #[test]
    fn test_missing_or_invalid_file_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!load_config_from(&dir.path().join("absent.conf")));

        let broken = dir.path().join("broken.conf");
        fs::write(&broken, "this is = = not toml").unwrap();
        assert!(!load_config_from(&broken));
    }
}
