//! HTTP client for reaching the backend API.
//!
//! A reqwest client whose certificate validation follows a
//! [`TransportSecurityPolicy`], with the usual hardening:
//!
//! - `max_response_bytes` limit (10MB default), checked while streaming
//! - connect timeout (10s) and overall timeout (30s default)
//! - no automatic redirects
//! - no automatic decompression

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use url::Url;

use super::layer::{LayerKind, TransportLayer};
use super::policy::{TransportSecurityPolicy, ensure_crypto_provider, process_policy};
use crate::error::{Error, Result};
use crate::logging::LogConfig;

#[cfg(feature = "failpoints")]
use fail::fail_point;

/// Default maximum response body size (10 MB)
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Default request timeout (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum allowed timeout (10 minutes)
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// Minimum allowed timeout (1 second)
pub const MIN_TIMEOUT_SECS: u64 = 1;

const USER_AGENT: &str = concat!("vcbridge/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to a transport security policy.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    policy: TransportSecurityPolicy,
    /// Maximum response body size in bytes
    max_response_bytes: usize,
}

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// HTTP response
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Body as a UTF-8 string (lossy)
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

static SHARED_CLIENT: OnceLock<HttpClient> = OnceLock::new();

fn clamp_timeout(secs: u64) -> u64 {
    secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
}

fn base_builder(
    policy: TransportSecurityPolicy,
    timeout: Duration,
    connect_timeout: Duration,
) -> ClientBuilder {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(policy.accepts_invalid_certs())
        .redirect(reqwest::redirect::Policy::none())
        .no_gzip()
        .no_brotli()
        .no_deflate()
}

impl HttpClient {
    /// Client with default timeout and response limit.
    pub fn new(policy: TransportSecurityPolicy) -> Result<Self> {
        Self::with_config(
            policy,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            DEFAULT_MAX_RESPONSE_BYTES,
        )
    }

    /// Client with full configuration.
    ///
    /// `timeout` is clamped to `MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS`.
    pub fn with_config(
        policy: TransportSecurityPolicy,
        timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<Self> {
        ensure_crypto_provider();
        let timeout = Duration::from_secs(clamp_timeout(timeout.as_secs()));
        let connect_timeout =
            std::cmp::min(timeout, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));

        let client = base_builder(policy, timeout, connect_timeout)
            .build()
            .map_err(|e| Error::Network(format!("failed to create client: {}", e)))?;

        Ok(Self {
            client,
            policy,
            max_response_bytes,
        })
    }

    /// The client installed by the bootstrapper, or a new one following the
    /// process policy if none was installed.
    pub fn shared() -> Result<HttpClient> {
        match SHARED_CLIENT.get() {
            Some(client) => Ok(client.clone()),
            None => HttpClient::new(process_policy()),
        }
    }

    pub fn policy(&self) -> TransportSecurityPolicy {
        self.policy
    }

    pub fn max_response_bytes(&self) -> usize {
        self.max_response_bytes
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request_with_timeouts(Method::Get, url, None, &[], None, None)
            .await
    }

    /// Make a request with per-request timeouts.
    ///
    /// When either timeout is given a temporary client with the same policy
    /// is built for this request only. Values are clamped to
    /// `MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS`.
    pub async fn request_with_timeouts(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
        headers: &[(String, String)],
        timeout_secs: Option<u64>,
        connect_timeout_secs: Option<u64>,
    ) -> Result<Response> {
        validate_url(url)?;

        let client = if timeout_secs.is_some() || connect_timeout_secs.is_some() {
            let timeout = timeout_secs.map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), |s| {
                Duration::from_secs(clamp_timeout(s))
            });
            let connect_timeout = connect_timeout_secs.map_or_else(
                || std::cmp::min(timeout, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)),
                |s| Duration::from_secs(clamp_timeout(s)),
            );
            base_builder(self.policy, timeout, connect_timeout)
                .build()
                .map_err(|e| Error::Network(format!("failed to create client: {}", e)))?
        } else {
            self.client.clone()
        };

        tracing::debug!(
            method = ?method,
            url = %LogConfig::default().redact_url(url),
            policy = self.policy.as_str(),
            "sending request"
        );

        let mut request = client.request(method.as_reqwest(), url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body_data) = body {
            request = request.body(body_data.to_vec());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network("operation timed out".to_string())
            } else {
                Error::Network(format!("request failed: {}", e))
            }
        })?;

        let status = response.status().as_u16();
        let resp_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        // Fail fast on a declared oversized body
        if let Some(content_length) = response.content_length() {
            if content_length as usize > self.max_response_bytes {
                return Err(Error::Network(format!(
                    "response too large: {} bytes (max: {} bytes)",
                    content_length, self.max_response_bytes
                )));
            }
        }

        let body = self.read_body_with_limit(response).await?;

        Ok(Response {
            status,
            headers: resp_headers,
            body,
        })
    }

    /// Stream the body, failing once it exceeds `max_response_bytes`.
    async fn read_body_with_limit(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        use futures_util::StreamExt;

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result
                .map_err(|e| Error::Network(format!("failed to read response chunk: {}", e)))?;

            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(Error::Network(format!(
                    "response too large: exceeded {} bytes limit",
                    self.max_response_bytes
                )));
            }

            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| Error::Network(format!("invalid URL: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Network(format!(
            "invalid URL: unsupported scheme '{}'",
            other
        ))),
    }
}

/// Generic HTTP client layer: installs the shared [`HttpClient`].
#[derive(Debug, Default)]
pub struct GenericHttpLayer;

impl TransportLayer for GenericHttpLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::GenericHttpClient
    }

    fn apply(&self, policy: TransportSecurityPolicy) -> Result<()> {
        #[cfg(feature = "failpoints")]
        fail_point!("transport::generic_http", |_| Err(Error::Transport(
            "http client library unavailable".to_string()
        )));

        let installed = match SHARED_CLIENT.get() {
            Some(client) => client,
            None => {
                let client = HttpClient::new(policy)?;
                SHARED_CLIENT.get_or_init(|| client)
            }
        };
        if installed.policy != policy {
            return Err(Error::Transport(format!(
                "shared client already initialized with {} policy",
                installed.policy.as_str()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn client_records_policy() {
        let client = HttpClient::new(TransportSecurityPolicy::Insecure).unwrap();
        assert_eq!(client.policy(), TransportSecurityPolicy::Insecure);
        assert_eq!(client.max_response_bytes(), DEFAULT_MAX_RESPONSE_BYTES);
    }

    #[test]
    fn timeouts_are_clamped() {
        assert_eq!(clamp_timeout(0), MIN_TIMEOUT_SECS);
        assert_eq!(clamp_timeout(30), 30);
        assert_eq!(clamp_timeout(100_000), MAX_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn invalid_url_rejected_before_sending() {
        let client = HttpClient::new(TransportSecurityPolicy::Verify).unwrap();
        let err = client.get("not-a-url").await.unwrap_err();
        assert!(err.to_string().contains("invalid URL"));
    }

    #[tokio::test]
    async fn non_http_scheme_rejected() {
        let client = HttpClient::new(TransportSecurityPolicy::Verify).unwrap();
        let err = client
            .request_with_timeouts(Method::Get, "ftp://vc/file", None, &[], Some(5), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let response = Response {
            status: 204,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Vec::new(),
        };
        assert!(response.is_success());
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }
}
