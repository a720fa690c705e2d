//! F5 Distributed Cloud API client
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{F5xcError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_WAIT_MIN: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRY_WAIT_MAX: Duration = Duration::from_secs(30);
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(60);

/// How requests are authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// `Authorization: APIToken <token>` header
    Token,
    /// TLS client certificate, no authorization header
    Certificate,
}

/// Tunables for the HTTP client and its retry loop
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_wait_min: Duration,
    pub retry_wait_max: Duration,
    /// Wait applied after a 429 instead of the exponential backoff
    pub rate_limit_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_wait_min: DEFAULT_RETRY_WAIT_MIN,
            retry_wait_max: DEFAULT_RETRY_WAIT_MAX,
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
        }
    }
}

impl ClientOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_wait(mut self, min: Duration, max: Duration) -> Self {
        self.retry_wait_min = min;
        self.retry_wait_max = max;
        self
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }
}

/// PEM files used for certificate authentication
#[derive(Debug, Clone)]
pub struct CertificateFiles<'a> {
    pub cert: &'a Path,
    pub key: &'a Path,
    pub ca: Option<&'a Path>,
}

/// Main F5XC API client
#[derive(Clone)]
pub struct F5xcClient {
    client: Client,
    base_url: String,
    auth_type: AuthType,
    api_token: Option<String>,
    options: ClientOptions,
}

impl std::fmt::Debug for F5xcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("F5xcClient")
            .field("base_url", &self.base_url)
            .field("auth_type", &self.auth_type)
            .field("options", &self.options)
            .finish()
    }
}

impl F5xcClient {
    /// Create a client authenticating with an API token
    pub fn new(base_url: &str, api_token: &str, options: ClientOptions) -> Result<Self> {
        let client = Self::http_builder(&options)
            .build()
            .map_err(|e| F5xcError::wrap(e, "client", "build"))?;

        Ok(Self {
            client,
            base_url: normalize_api_url(base_url).0,
            auth_type: AuthType::Token,
            api_token: Some(api_token.to_string()).filter(|t| !t.is_empty()),
            options,
        })
    }

    /// Create a client authenticating with a PEM certificate and key
    pub fn with_certificate(
        base_url: &str,
        files: CertificateFiles<'_>,
        options: ClientOptions,
    ) -> Result<Self> {
        let mut pem = std::fs::read(files.cert).map_err(|e| {
            F5xcError::configuration(format!(
                "failed to read certificate {}: {}",
                files.cert.display(),
                e
            ))
        })?;
        let key = std::fs::read(files.key).map_err(|e| {
            F5xcError::configuration(format!(
                "failed to read private key {}: {}",
                files.key.display(),
                e
            ))
        })?;
        pem.push(b'\n');
        pem.extend_from_slice(&key);

        let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
            F5xcError::configuration("failed to load certificate/key pair").with_source(e)
        })?;

        let mut builder = Self::http_builder(&options)
            .identity(identity)
            .min_tls_version(reqwest::tls::Version::TLS_1_2);

        if let Some(ca) = files.ca {
            let ca_pem = std::fs::read(ca).map_err(|e| {
                F5xcError::configuration(format!(
                    "failed to read CA certificate {}: {}",
                    ca.display(),
                    e
                ))
            })?;
            let ca_cert = reqwest::Certificate::from_pem(&ca_pem).map_err(|e| {
                F5xcError::configuration("failed to parse CA certificate").with_source(e)
            })?;
            builder = builder.add_root_certificate(ca_cert);
        }

        let client = builder
            .build()
            .map_err(|e| F5xcError::wrap(e, "client", "build"))?;

        Ok(Self {
            client,
            base_url: normalize_api_url(base_url).0,
            auth_type: AuthType::Certificate,
            api_token: None,
            options,
        })
    }

    fn http_builder(options: &ClientOptions) -> reqwest::ClientBuilder {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Backoff before retry number `attempt + 1`: `min * 2^attempt`, capped at max
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.options
            .retry_wait_min
            .saturating_mul(factor)
            .min(self.options.retry_wait_max)
    }

    /// Perform a request with retries and return the raw response body
    async fn request(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            debug!("{} {} (attempt {})", method, url, attempt + 1);

            let mut request = self.client.request(method.clone(), &url);
            if self.auth_type == AuthType::Token {
                if let Some(token) = &self.api_token {
                    request = request.header(header::AUTHORIZATION, format!("APIToken {}", token));
                }
            }
            if let Some(body) = &body {
                request = request.body(body.clone());
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let err = F5xcError::network(e);
                    if attempt < self.options.max_retries {
                        let wait = self.backoff(attempt);
                        warn!("{} {} failed: {}; retrying in {:?}", method, path, err, wait);
                        tokio::time::sleep(wait).await;
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| F5xcError::wrap(e, "response", "read"))?;

            if status.is_success() {
                return Ok(bytes.to_vec());
            }

            let err = F5xcError::from_response(status.as_u16(), &bytes, path, method.as_str());
            if !is_retryable_status(status) || attempt >= self.options.max_retries {
                return Err(err);
            }

            let wait = if status == StatusCode::TOO_MANY_REQUESTS {
                self.options.rate_limit_delay
            } else {
                self.backoff(attempt)
            };
            warn!(
                "{} {} returned {}; retrying in {:?}",
                method, path, status, wait
            );
            tokio::time::sleep(wait).await;
            last_err = Some(err);
        }

        Err(last_err
            .unwrap_or_else(|| F5xcError::network(format!("{} {}: no attempt made", method, path))))
    }

    async fn request_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| F5xcError::wrap(e, "request", "marshal"))?;

        let bytes = self.request(method, path, payload).await?;
        decode(&bytes)
    }

    /// Perform a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request_json::<(), T>(Method::GET, path, None).await
    }

    /// Perform a POST request
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.request_json(Method::POST, path, Some(body)).await
    }

    /// Perform a PUT request
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.request_json(Method::PUT, path, Some(body)).await
    }

    /// Perform a DELETE request, discarding the response body
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, path, None).await.map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let trimmed = bytes.iter().all(|b| b.is_ascii_whitespace());
    let input: &[u8] = if trimmed { b"null" } else { bytes };
    serde_json::from_slice(input).map_err(|e| F5xcError::wrap(e, "response", "decode"))
}

/// Whether a response status should be retried
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    ) || status.is_server_error()
}

/// Strip trailing slashes and a trailing `/api` from a base URL.
///
/// Returns the cleaned URL and whether anything changed.
pub fn normalize_api_url(url: &str) -> (String, bool) {
    let mut cleaned = url.trim_end_matches('/');
    if cleaned.to_lowercase().ends_with("/api") {
        cleaned = &cleaned[..cleaned.len() - 4];
    }
    let cleaned = cleaned.trim_end_matches('/').to_string();
    let changed = cleaned != url;
    (cleaned, changed)
}

/// Run `fut` under a deadline, mapping expiry to a `TIMEOUT` error
pub async fn with_deadline<T, F>(
    deadline: Duration,
    resource: &str,
    operation: &str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(elapsed) => Err(F5xcError::timeout(resource, operation, Some(elapsed.into()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(options: ClientOptions) -> F5xcClient {
        F5xcClient::new("https://tenant.console.ves.volterra.io", "token", options).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client_with(ClientOptions::default());
        assert_eq!(client.auth_type(), AuthType::Token);
        assert_eq!(client.options().max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(client.options().timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_client_options_builder() {
        let options = ClientOptions::default()
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(7)
            .with_retry_wait(Duration::from_millis(10), Duration::from_millis(80))
            .with_rate_limit_delay(Duration::from_millis(20));
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.max_retries, 7);
        assert_eq!(options.retry_wait_min, Duration::from_millis(10));
        assert_eq!(options.retry_wait_max, Duration::from_millis(80));
        assert_eq!(options.rate_limit_delay, Duration::from_millis(20));
    }

    #[test]
    fn test_retryable_status() {
        for code in [429u16, 500, 502, 503, 504, 507] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(is_retryable_status(status), "{}", code);
        }
        for code in [200u16, 400, 401, 403, 404, 409] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(!is_retryable_status(status), "{}", code);
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let client = client_with(ClientOptions::default());
        assert_eq!(client.backoff(0), Duration::from_secs(1));
        assert_eq!(client.backoff(1), Duration::from_secs(2));
        assert_eq!(client.backoff(2), Duration::from_secs(4));
        assert_eq!(client.backoff(4), Duration::from_secs(16));
        assert_eq!(client.backoff(5), Duration::from_secs(30));
        assert_eq!(client.backoff(40), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_custom_waits() {
        let client = client_with(
            ClientOptions::default()
                .with_retry_wait(Duration::from_millis(100), Duration::from_millis(500)),
        );
        assert_eq!(client.backoff(0), Duration::from_millis(100));
        assert_eq!(client.backoff(2), Duration::from_millis(400));
        assert_eq!(client.backoff(3), Duration::from_millis(500));
    }

    #[test]
    fn test_normalize_api_url() {
        assert_eq!(
            normalize_api_url("https://t.console.ves.volterra.io/api"),
            ("https://t.console.ves.volterra.io".to_string(), true)
        );
        assert_eq!(
            normalize_api_url("https://t.console.ves.volterra.io/API/"),
            ("https://t.console.ves.volterra.io".to_string(), true)
        );
        assert_eq!(
            normalize_api_url("https://t.console.ves.volterra.io"),
            ("https://t.console.ves.volterra.io".to_string(), false)
        );
        assert_eq!(
            normalize_api_url("http://127.0.0.1:8080//"),
            ("http://127.0.0.1:8080".to_string(), true)
        );
    }

    #[test]
    fn test_client_normalizes_base_url() {
        let client = F5xcClient::new("https://x.example.com/api/", "t", ClientOptions::default())
            .unwrap();
        assert_eq!(client.base_url(), "https://x.example.com");
    }

    #[test]
    fn test_certificate_client_missing_files() {
        let err = F5xcClient::with_certificate(
            "https://x.example.com",
            CertificateFiles {
                cert: Path::new("/nonexistent/cert.pem"),
                key: Path::new("/nonexistent/key.pem"),
                ca: None,
            },
            ClientOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Configuration);
        assert!(err.message.contains("failed to read certificate"));
    }

    #[test]
    fn test_decode_empty_body() {
        let value: serde_json::Value = decode(b"").unwrap();
        assert!(value.is_null());
        decode::<()>(b"  ").unwrap();
        let opt: Option<u32> = decode(b"").unwrap();
        assert!(opt.is_none());
    }

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let result: Result<()> = with_deadline(
            Duration::from_millis(10),
            "namespace",
            "delete",
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Timeout);
        assert_eq!(err.resource.as_deref(), Some("namespace"));
    }
}
