//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and TLS mode
//! - One bounded GET per call (retries belong to the coordinator)
//! - Redirect limits
//! - Error classification into transient and permanent kinds

use crate::config::{FetcherConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

/// Why a fetch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FetchErrorKind {
    /// No complete response within the timeout bound
    Timeout,

    /// The connection could not be established
    ConnectionRefused,

    /// Certificate or handshake failure
    TlsError,

    /// Non-success HTTP status
    HttpError(u16),

    /// The response body could not be read or decoded
    DecodeError,

    /// Redirect limit exceeded or another protocol-level failure
    Protocol,
}

impl FetchErrorKind {
    /// Returns true if another attempt may succeed
    ///
    /// | Kind | Transient |
    /// |------|-----------|
    /// | Timeout, ConnectionRefused | yes |
    /// | HTTP 429, HTTP 5xx | yes |
    /// | HTTP 4xx, TLS, decode, protocol | no |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionRefused => true,
            Self::HttpError(status) => *status == 429 || (500..600).contains(status),
            Self::TlsError | Self::DecodeError | Self::Protocol => false,
        }
    }

    /// Returns true for HTTP 429
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::HttpError(429))
    }

    /// Stable label used as the errors-by-kind key
    pub fn label(&self) -> String {
        match self {
            Self::Timeout => "timeout".to_string(),
            Self::ConnectionRefused => "connection_refused".to_string(),
            Self::TlsError => "tls_error".to_string(),
            Self::HttpError(status) => format!("http_{}", status),
            Self::DecodeError => "decode_error".to_string(),
            Self::Protocol => "protocol_error".to_string(),
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A typed fetch failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// A successfully retrieved response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Response headers, names lowercased
    pub headers: BTreeMap<String, String>,

    /// Decoded body
    pub body: String,
}

impl FetchedPage {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// True when the body should be treated as markup
    ///
    /// A missing Content-Type is given the benefit of the doubt.
    pub fn is_html(&self) -> bool {
        match self.content_type() {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("html") || ct.contains("xml")
            }
            None => true,
        }
    }
}

/// Outcome of exactly one network attempt
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The URL that was requested
    pub url: Url,

    pub outcome: Result<FetchedPage, FetchError>,

    /// Wall time of the attempt
    pub latency: Duration,
}

/// HTTP capability used by the crawler
///
/// Implementations make exactly one attempt per call, return within their
/// timeout bound, and report every failure through `FetchResult::outcome`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> FetchResult;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Builds a fetcher from the transport and identity configuration
    ///
    /// # Arguments
    ///
    /// * `config` - TLS mode, timeouts and redirect limit
    /// * `user_agent` - Identity sent with every request
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Successfully built HTTP client
    /// * `Err(reqwest::Error)` - The TLS backend could not be initialised
    pub fn new(config: &FetcherConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent.header_value())
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .redirect(Policy::limited(config.max_redirects as usize))
            .danger_accept_invalid_certs(!config.verify_tls)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    async fn get(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::HttpError(status.as_u16()),
                format!("{} returned {}", final_url, status),
            ));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::new(FetchErrorKind::Timeout, e.to_string())
            } else {
                FetchError::new(FetchErrorKind::DecodeError, e.to_string())
            }
        })?;

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult {
        let started = Instant::now();

        // The client timeout covers the request; this bound also covers
        // body streaming on slow-drip responses.
        let outcome = match tokio::time::timeout(self.timeout, self.get(url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::new(
                FetchErrorKind::Timeout,
                format!("no response within {:?}", self.timeout),
            )),
        };

        FetchResult {
            url: url.clone(),
            outcome,
            latency: started.elapsed(),
        }
    }
}

/// Maps a reqwest error onto a fetch error kind
fn classify_error(error: reqwest::Error) -> FetchError {
    let detail = error_chain(&error);

    let kind = if error.is_timeout() {
        FetchErrorKind::Timeout
    } else if error.is_redirect() {
        FetchErrorKind::Protocol
    } else if is_tls_failure(&detail) {
        FetchErrorKind::TlsError
    } else if error.is_connect() {
        FetchErrorKind::ConnectionRefused
    } else if error.is_decode() || error.is_body() {
        FetchErrorKind::DecodeError
    } else {
        FetchErrorKind::Protocol
    };

    FetchError::new(kind, detail)
}

/// Flattens an error and its sources into one line
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

fn is_tls_failure(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    ["certificate", "tls", "handshake", "ssl"]
        .iter()
        .any(|needle| detail.contains(needle))
}
