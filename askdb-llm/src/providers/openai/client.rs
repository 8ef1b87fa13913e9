//! HTTP client for OpenAI-compatible servers, with request pacing

use super::types::ApiError;
use crate::providers::{invalid_response, rate_limited, request_failed, transport_error};
use askdb_core::AskResult;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

const PROVIDER: &str = "openai";

/// Bounded concurrency plus a minimum spacing between requests.
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    in_flight: Arc<Semaphore>,
    last_request_ms: Arc<AtomicU64>,
    min_interval_ms: u64,
    epoch: Instant,
}

impl OpenAIClient {
    /// Create a client for `base_url` (e.g. "https://api.openai.com/v1").
    ///
    /// `requests_per_minute` sets both the concurrency bound and the
    /// minimum interval between request starts.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        requests_per_minute: u32,
        timeout: Duration,
    ) -> AskResult<Self> {
        let rpm = requests_per_minute.max(1);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| request_failed(PROVIDER, 0, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            in_flight: Arc::new(Semaphore::new(rpm as usize)),
            last_request_ms: Arc::new(AtomicU64::new(0)),
            min_interval_ms: (60_000 / rpm as u64).max(10),
            epoch: Instant::now(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base_url}/{endpoint}` and decode the JSON reply.
    pub async fn post<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> AskResult<Res> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("Rate limiter closed: {}", e)))?;

        self.pace().await;

        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout, e))?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)));
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ApiError>(&error_text)
            .map(|e| e.error.message)
            .unwrap_or(error_text);

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => rate_limited(PROVIDER, retry_after_ms),
            _ => request_failed(PROVIDER, status.as_u16() as i32, message),
        })
    }

    async fn pace(&self) {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        let last_ms = self.last_request_ms.load(Ordering::Relaxed);
        let since_last = now_ms.saturating_sub(last_ms);

        if last_ms != 0 && since_last < self.min_interval_ms {
            tokio::time::sleep(Duration::from_millis(self.min_interval_ms - since_last)).await;
        }

        self.last_request_ms
            .store(self.epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as i64)
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("min_interval_ms", &self.min_interval_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after_ms(&headers), Some(1500));
    }

    #[test]
    fn test_parse_retry_after_missing_or_date() {
        assert_eq!(parse_retry_after_ms(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after_ms(&headers), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let client =
            OpenAIClient::new("https://api.openai.com/v1/", "sk-secret", 60, Duration::from_secs(5))
                .unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
        assert_eq!(client.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_zero_rpm_is_clamped() {
        let client =
            OpenAIClient::new("http://localhost:8000/v1", "k", 0, Duration::from_secs(5)).unwrap();
        assert_eq!(client.min_interval_ms, 60_000);
    }

    #[tokio::test]
    async fn test_first_request_is_not_delayed() {
        let client =
            OpenAIClient::new("http://localhost:8000/v1", "k", 1, Duration::from_secs(5)).unwrap();
        let started = Instant::now();
        client.pace().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
