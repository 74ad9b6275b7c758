//! Configuration module for Sandbox Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. The resulting [`Config`] is
//! built once and handed to each component's constructor; nothing in the crate
//! reads configuration from global state.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("API_TOKEN", "secret");
/// assert_eq!(expand_env_vars("Bearer ${API_TOKEN}"), "Bearer secret");
/// assert_eq!(expand_env_vars("${MISSING:-anon}"), "anon");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

fn deserialize_with_env<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(expand_env_vars(&s))
}

fn deserialize_optional_with_env<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.map(|s| expand_env_vars(&s)).filter(|s| !s.is_empty()))
}

fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub platform: PlatformConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.platform.base_url) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid platform base_url '{}': must start with http:// or https://",
                self.platform.base_url
            )));
        }

        if let Some(ref build_server) = self.platform.build_server_url {
            if !is_valid_http_url(build_server) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid build_server_url '{}': must start with http:// or https://",
                    build_server
                )));
            }
        }

        if self.upload.part_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.part_size must be greater than zero".into(),
            ));
        }

        if self.upload.part_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "upload.part_concurrency must be at least 1".into(),
            ));
        }

        if self.upload.max_concurrent_files == Some(0) {
            return Err(ConfigError::ValidationError(
                "upload.max_concurrent_files must be at least 1 when set".into(),
            ));
        }

        if !self.upload.finalize_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "upload.finalize_path '{}' must start with '/'",
                self.upload.finalize_path
            )));
        }

        if self.probe.nameservers.is_empty() {
            return Err(ConfigError::ValidationError(
                "probe.nameservers must list at least one authoritative nameserver".into(),
            ));
        }

        if self.probe.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "probe.max_attempts must be at least 1".into(),
            ));
        }

        if !self.probe.path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "probe.path '{}' must start with '/'",
                self.probe.path
            )));
        }

        Ok(())
    }
}

/// Platform API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the platform API. Supports ${VAR} expansion.
    #[serde(deserialize_with = "deserialize_with_env")]
    pub base_url: String,

    /// Session/API token sent as a bearer credential. Supports ${VAR} expansion.
    #[serde(default, deserialize_with = "deserialize_optional_with_env")]
    pub api_token: Option<String>,

    /// GPU build server URL
    #[serde(default, deserialize_with = "deserialize_optional_with_env")]
    pub build_server_url: Option<String>,
}

impl PlatformConfig {
    /// Join a path onto the platform base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Bytes per multipart part. Default: 100MB
    ///
    /// Upload targets carry no part size, so this must equal the size the
    /// platform used when it allocated part URLs. A mismatch fails the file
    /// with a validation error before any part is sent.
    #[serde(default = "default_part_size")]
    pub part_size: usize,

    /// Parts uploaded concurrently within one file. Default: 5
    #[serde(default = "default_part_concurrency")]
    pub part_concurrency: usize,

    /// Ceiling on files uploaded at once. Default: unlimited
    #[serde(default)]
    pub max_concurrent_files: Option<usize>,

    /// Bucket reported to the finalize endpoint
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,

    /// Platform path that assembles multipart uploads
    #[serde(default = "default_finalize_path")]
    pub finalize_path: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            part_size: default_part_size(),
            part_concurrency: default_part_concurrency(),
            max_concurrent_files: None,
            bucket_name: default_bucket_name(),
            finalize_path: default_finalize_path(),
        }
    }
}

fn default_part_size() -> usize {
    104857600 // 100MB
}

fn default_part_concurrency() -> usize {
    5
}

fn default_bucket_name() -> String {
    "models".to_string()
}

fn default_finalize_path() -> String {
    "/api/v1/uploads/complete-multipart".to_string()
}

/// Readiness probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Authoritative nameservers queried directly, bypassing the system resolver
    #[serde(default = "default_nameservers")]
    pub nameservers: Vec<IpAddr>,

    /// Attempts before giving up. Default: 60
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds. Default: 500
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt HTTP timeout in seconds. Default: 10
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Path requested on the endpoint. Default: "/"
    #[serde(default = "default_probe_path")]
    pub path: String,
}

impl ProbeConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            nameservers: default_nameservers(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            path: default_probe_path(),
        }
    }
}

fn default_nameservers() -> Vec<IpAddr> {
    // Cloudflare authoritative anycast
    ["173.245.58.51", "172.64.32.51", "108.162.192.51"]
        .iter()
        .filter_map(|ip| ip.parse().ok())
        .collect()
}

fn default_max_attempts() -> u32 {
    60
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_probe_path() -> String {
    "/".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            platform: PlatformConfig {
                base_url: "https://api.example.com".into(),
                api_token: None,
                build_server_url: None,
            },
            upload: UploadConfig::default(),
            probe: ProbeConfig::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let upload = UploadConfig::default();
        assert_eq!(upload.part_size, 104857600);
        assert_eq!(upload.part_concurrency, 5);
        assert!(upload.max_concurrent_files.is_none());

        let probe = ProbeConfig::default();
        assert_eq!(probe.max_attempts, 60);
        assert_eq!(probe.retry_delay(), Duration::from_millis(500));
        assert_eq!(probe.request_timeout(), Duration::from_secs(10));
        assert_eq!(probe.nameservers.len(), 3);
    }

    #[test]
    fn test_validation_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_base_url() {
        let mut config = base_config();
        config.platform.base_url = "api.example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_nameservers() {
        let mut config = base_config();
        config.probe.nameservers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_file_cap() {
        let mut config = base_config();
        config.upload.max_concurrent_files = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_join() {
        let mut config = base_config();
        config.platform.base_url = "https://api.example.com/".into();
        assert_eq!(
            config.platform.endpoint("/api/v1/uploads/complete-multipart"),
            "https://api.example.com/api/v1/uploads/complete-multipart"
        );
    }
}
