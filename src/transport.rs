//! HTTP transport with exponential back-off against EDGAR's rate limiting.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{FetchError, SyncError};

pub const DEFAULT_USER_AGENT: &str = "edgarsync/0.1.0 (sample-company sample.contact@example.com)";

/// Delays stop doubling past this exponent so misconfigured retry counts
/// cannot schedule hour-long sleeps.
const MAX_BACKOFF_EXPONENT: u32 = 10;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub user_agent: String,
    /// Extra headers sent on every request, on top of the User-Agent.
    pub headers: Vec<(String, String)>,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> TransportConfig {
        TransportConfig {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: vec![
                (
                    "Accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                ),
                ("Accept-Language".to_string(), "en-us".to_string()),
            ],
            max_retries: 8,
            backoff_base: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// A retrying HTTP client. One instance is shared across a whole run so
/// connection pooling works in our favor.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    config: TransportConfig,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Result<Transport, SyncError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SyncError::Config(format!("invalid header name {name:?}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| SyncError::Config(format!("invalid value for header {name}: {e}")))?;
            headers.insert(header_name, header_value);
        }
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        Ok(Transport { client, config })
    }

    /// GET a URL and return the full body, retrying transient failures with
    /// exponentially growing delays. Permanent failures (e.g. 404) return
    /// immediately.
    pub async fn get(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>, FetchError> {
        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.client.get(url);
            if let Some(referer) = referer {
                request = request.header(REFERER, referer);
            }
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.bytes().await {
                            Ok(body) => return Ok(body.to_vec()),
                            Err(source) => {
                                debug!("body read failed for {} (attempt {}): {}", url, attempt, source);
                                if attempt >= max_attempts {
                                    return Err(FetchError::Transport {
                                        url: url.to_string(),
                                        attempts: attempt,
                                        source,
                                    });
                                }
                            }
                        }
                    } else if is_retryable_status(status) {
                        debug!("HTTP {} for {} (attempt {})", status, url, attempt);
                        if attempt >= max_attempts {
                            warn!("giving up on {} after {} attempts (HTTP {})", url, attempt, status);
                            return Err(FetchError::RetriesExhausted {
                                url: url.to_string(),
                                status,
                                attempts: attempt,
                            });
                        }
                    } else {
                        return Err(FetchError::Permanent {
                            url: url.to_string(),
                            status,
                        });
                    }
                }
                Err(source) if source.is_builder() => {
                    return Err(FetchError::Invalid {
                        url: url.to_string(),
                        source,
                    });
                }
                Err(source) => {
                    debug!("request error for {} (attempt {}): {}", url, attempt, source);
                    if attempt >= max_attempts {
                        return Err(FetchError::Transport {
                            url: url.to_string(),
                            attempts: attempt,
                            source,
                        });
                    }
                }
            }
            tokio::time::sleep(backoff_delay(self.config.backoff_base, attempt)).await;
        }
    }
}

/// Delay before the next try, after `completed_attempts` have failed:
/// base, 2x base, 4x base, and so on.
fn backoff_delay(base: Duration, completed_attempts: u32) -> Duration {
    base * 2u32.pow(completed_attempts.saturating_sub(1).min(MAX_BACKOFF_EXPONENT))
}

/// EDGAR answers bursts with 403 as often as 429, so both count as
/// throttling along with the usual transient 5xx family.
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 403 | 429 | 500 | 502 | 503 | 504)
}
