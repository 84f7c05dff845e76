//! Blocking HTTP transport shared by the service clients
//!
//! Clients talk to the network through `HttpTransport` so tests can script
//! responses without a server. Non-2xx statuses are returned as ordinary
//! responses; only connection-level problems become errors.

use crate::sleep::{Sleeper, ThreadSleeper};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use turntable_core::{Result, TurntableError};

const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_GET_RETRIES: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// A fully-read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Minimal HTTP surface needed by the service clients
pub trait HttpTransport: Send + Sync {
    /// POST a JSON body. Never retried.
    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        payload: &serde_json::Value,
    ) -> Result<HttpResponse>;

    /// GET a resource
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse>;
}

/// `ureq`-backed transport.
///
/// Failed GETs back off 0.5 s then 1 s before giving up, so a poll can
/// spend up to 1.5 s here on top of the poll interval.
pub struct UreqTransport {
    agent: ureq::Agent,
    sleeper: Arc<dyn Sleeper>,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Use a different sleeper for retry backoff
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        payload: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let mut request = self.agent.post(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request
            .send_json(payload)
            .map_err(|e| TurntableError::TransportError(format!("POST {} failed: {}", url, e)))?;
        read_response(response)
    }

    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        for attempt in 0..MAX_GET_RETRIES {
            let mut request = self.agent.get(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            match request.call() {
                Ok(response) => return read_response(response),
                Err(e) => {
                    if attempt + 1 < MAX_GET_RETRIES && is_retryable_error(&e) {
                        self.sleeper.sleep(backoff_delay(attempt));
                        continue;
                    }
                    return Err(TurntableError::TransportError(format!(
                        "GET {} failed: {}",
                        url, e
                    )));
                }
            }
        }

        Err(TurntableError::TransportError(format!(
            "GET {} failed after retries",
            url
        )))
    }
}

fn read_response(mut response: ureq::http::Response<ureq::Body>) -> Result<HttpResponse> {
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()
        .map_err(|e| TurntableError::TransportError(format!("Failed to read body: {}", e)))?;
    Ok(HttpResponse { status, body })
}

fn is_retryable_error(e: &ureq::Error) -> bool {
    matches!(
        e,
        ureq::Error::Timeout(_)
            | ureq::Error::Io(_)
            | ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
    )
}

fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt))
}
