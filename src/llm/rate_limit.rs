//! Retry handling for rate-limited provider APIs.
//!
//! Hosted providers answer 429 when the free-tier quota is exceeded. Requests
//! are retried with exponential backoff, honoring `Retry-After` when present.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::backend::LlmError;

/// Base delay for exponential backoff.
const BACKOFF_BASE_MS: u64 = 1000;

/// Parse Retry-After header value (seconds).
/// Returns duration to wait, or None if header is missing/invalid.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(60)))
}

/// Calculate exponential backoff delay for a given attempt.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(60_000))
}

/// Send a request, retrying on 429 up to `max_retries` times.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed on
/// send. Any other non-success status is returned as [`LlmError::Api`].
/// Transport errors drop the request URL from their message.
pub async fn send_with_retry<F>(
    backend: &str,
    max_retries: u32,
    build: F,
) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let response = build()
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.without_url().to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            if attempt >= max_retries {
                return Err(LlmError::RateLimited {
                    backend: backend.to_string(),
                    attempts: attempt + 1,
                });
            }

            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok());
            let wait = parse_retry_after(retry_after)
                .unwrap_or_else(|| backoff_delay(attempt, BACKOFF_BASE_MS));

            warn!(
                "{} rate limited (attempt {}), waiting {:?}",
                backend,
                attempt + 1,
                wait
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body.trim())));
        }

        debug!("{} responded with {}", backend, status);
        return Ok(response);
    }
}
