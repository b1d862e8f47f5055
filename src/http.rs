use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Proxy, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::FetchError;

const BACKOFF_BASE: f64 = 1.8;
const MAX_BACKOFF_SECS: f64 = 10.0;

/// Outcome of a single failed request, tagged by whether repeating it can help.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FetchFailure {
    Retryable { reason: String },
    Permanent { reason: String },
}

impl FetchFailure {
    pub fn retryable(reason: impl Into<String>) -> Self {
        FetchFailure::Retryable {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        FetchFailure::Permanent {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            FetchFailure::Retryable { reason } | FetchFailure::Permanent { reason } => reason,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchFailure::Retryable { .. })
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason())
    }
}

pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchFailure>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a blocking client. The proxy is applied to this client only;
    /// environment proxy variables are not consulted here.
    pub fn new(user_agent: &str, proxy: Option<&str>) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| FetchError::HttpClient(err.to_string()))?,
        );

        let mut builder = Client::builder().default_headers(headers).no_proxy();
        if let Some(proxy) = proxy {
            let proxy =
                Proxy::all(proxy).map_err(|err| FetchError::InvalidProxy(err.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|err| FetchError::HttpClient(err.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchFailure> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP Error {status} for {url}");
            return Err(if is_retryable_status(status) {
                FetchFailure::retryable(reason)
            } else {
                FetchFailure::permanent(reason)
            });
        }

        let body = response
            .bytes()
            .map_err(|err| FetchFailure::retryable(err.to_string()))?;
        if body.is_empty() {
            return Err(FetchFailure::retryable(format!(
                "empty response body from {url}"
            )));
        }
        Ok(body.to_vec())
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

fn classify_error(err: reqwest::Error) -> FetchFailure {
    if err.is_builder() {
        return FetchFailure::permanent(err.to_string());
    }
    if let Some(status) = err.status() {
        if !is_retryable_status(status) {
            return FetchFailure::permanent(err.to_string());
        }
    }
    FetchFailure::retryable(err.to_string())
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, timeout: Duration) -> Self {
        Self { retries, timeout }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Wait after failed attempt `attempt` (1-based): `min(10, 1.8^attempt)` seconds.
    pub fn backoff(attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        Duration::from_secs_f64(BACKOFF_BASE.powi(exponent).min(MAX_BACKOFF_SECS))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub success: bool,
    pub byte_count: u64,
    pub attempts: u32,
    pub error: Option<FetchFailure>,
}

impl FetchOutcome {
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|failure| failure.reason())
    }
}

pub struct Fetcher<T: HttpTransport> {
    transport: T,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl<T: HttpTransport> Fetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// GETs `url` and stores the body at `destination`. Only a successful
    /// attempt touches the destination, and it is replaced in one rename.
    pub fn fetch_url(&self, url: &str, destination: &Path) -> FetchOutcome {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .transport
                .get(url, self.policy.timeout)
                .and_then(|body| write_body(destination, &body));

            let failure = match result {
                Ok(byte_count) => {
                    debug!(url, bytes = byte_count, path = %destination.display(), "fetched");
                    return FetchOutcome {
                        success: true,
                        byte_count,
                        attempts: attempt,
                        error: None,
                    };
                }
                Err(failure) => failure,
            };

            if !failure.is_retryable() || attempt >= max_attempts {
                warn!(url, attempt, max_attempts, "giving up: {failure}");
                return FetchOutcome {
                    success: false,
                    byte_count: 0,
                    attempts: attempt,
                    error: Some(failure),
                };
            }

            let wait = RetryPolicy::backoff(attempt);
            warn!(
                url,
                "attempt {attempt}/{max_attempts} failed: {failure}; retrying in {:.1}s",
                wait.as_secs_f64()
            );
            self.sleeper.sleep(wait);
        }
    }
}

fn write_body(destination: &Path, body: &[u8]) -> Result<u64, FetchFailure> {
    let io_failure = |err: std::io::Error| {
        FetchFailure::permanent(format!("write {}: {err}", destination.display()))
    };
    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(io_failure)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".structural-fetch")
        .tempfile_in(parent)
        .map_err(io_failure)?;
    temp.write_all(body).map_err(io_failure)?;
    temp.persist(destination)
        .map_err(|err| io_failure(err.error))?;
    Ok(body.len() as u64)
}
