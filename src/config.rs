//! Centralized configuration management for edgarsync

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::transport::{TransportConfig, DEFAULT_USER_AGENT};

pub const DEFAULT_ARCHIVES_URL: &str = "https://www.sec.gov/Archives";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the local filing mirror
    pub data_dir: PathBuf,
    /// Base URL of the EDGAR archive host
    pub archives_url: String,
    /// HTTP client configuration
    pub http: HttpConfig,
    /// Retry schedule for throttled or failing requests
    pub retry: RetryConfig,
    /// Courtesy pause between consecutive requests (milliseconds)
    pub request_delay_ms: u64,
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string; SEC fair-access policy wants a contact in here
    pub user_agent: String,
}

/// Retry schedule configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries per request after the first attempt
    pub max_retries: u32,
    /// Base delay for the exponential back-off (milliseconds)
    pub backoff_base_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            backoff_base_ms: 1_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("EDGARSYNC_DATA_DIR")
            .unwrap_or_else(|_| "./edgar_data".to_string())
            .into();

        let archives_url = std::env::var("EDGARSYNC_ARCHIVES_URL")
            .unwrap_or_else(|_| DEFAULT_ARCHIVES_URL.to_string());

        let http = HttpConfig {
            timeout_seconds: parse_env_var("EDGARSYNC_HTTP_TIMEOUT_SECONDS")?.unwrap_or(30),
            user_agent: std::env::var("EDGARSYNC_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
        };

        let retry = RetryConfig {
            max_retries: parse_env_var("EDGARSYNC_MAX_RETRIES")?.unwrap_or(8),
            backoff_base_ms: parse_env_var("EDGARSYNC_BACKOFF_BASE_MS")?.unwrap_or(1_000),
        };

        let request_delay_ms = parse_env_var("EDGARSYNC_REQUEST_DELAY_MS")?.unwrap_or(100);

        Ok(Config {
            data_dir,
            archives_url,
            http,
            retry,
            request_delay_ms,
        })
    }

    /// Get HTTP timeout as Duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    /// Get back-off base as Duration
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry.backoff_base_ms)
    }

    /// Get inter-request courtesy delay as Duration
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Transport settings derived from this configuration
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            user_agent: self.http.user_agent.clone(),
            max_retries: self.retry.max_retries,
            backoff_base: self.backoff_base(),
            timeout: self.http_timeout(),
            ..TransportConfig::default()
        }
    }
}

/// Helper function to parse environment variable as a specific type
fn parse_env_var<T>(var_name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display + Send + Sync + std::error::Error + 'static,
{
    match std::env::var(var_name) {
        Ok(val) => val.parse().map(Some).with_context(|| {
            format!("Failed to parse environment variable {} = '{}'", var_name, val)
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.archives_url, DEFAULT_ARCHIVES_URL);
        assert_eq!(config.retry.max_retries, 8);
        assert_eq!(config.retry.backoff_base_ms, 1_000);
        assert_eq!(config.request_delay_ms, 100);
        assert_eq!(config.http.timeout_seconds, 30);
    }

    #[test]
    fn test_transport_config_carries_overrides() {
        let mut config = Config::from_env().unwrap();
        config.http.user_agent = "example-corp admin@example.com".to_string();
        config.retry.max_retries = 3;
        let transport = config.transport_config();
        assert_eq!(transport.user_agent, "example-corp admin@example.com");
        assert_eq!(transport.max_retries, 3);
        assert_eq!(transport.timeout, Duration::from_secs(30));
    }
}
