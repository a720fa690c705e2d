//! Structured error types for the F5 Distributed Cloud API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Boxed cause carried by [`F5xcError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for F5XC operations
pub type Result<T> = std::result::Result<T, F5xcError>;

/// Error classification used for retry decisions and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // API errors
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    RateLimit,
    ServerError,
    BadRequest,
    Timeout,
    NetworkError,

    // Resource errors
    Validation,
    StateRead,
    StateWrite,
    Configuration,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::StateRead => "STATE_READ",
            ErrorCode::StateWrite => "STATE_WRITE",
            ErrorCode::Configuration => "CONFIGURATION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every fallible operation in this crate
#[derive(Debug, Error)]
#[error(
    "[{}] {}{}",
    .code,
    .message,
    context_suffix(.resource, .operation, .status, .source)
)]
pub struct F5xcError {
    pub code: ErrorCode,
    pub message: String,
    pub resource: Option<String>,
    pub operation: Option<String>,
    pub status: Option<u16>,
    pub details: Map<String, Value>,
    #[source]
    pub source: Option<BoxError>,
}

fn context_suffix(
    resource: &Option<String>,
    operation: &Option<String>,
    status: &Option<u16>,
    source: &Option<BoxError>,
) -> String {
    let mut out = String::new();
    if let Some(resource) = resource.as_deref().filter(|r| !r.is_empty()) {
        out.push_str(&format!(" (resource: {})", resource));
    }
    if let Some(operation) = operation.as_deref().filter(|o| !o.is_empty()) {
        out.push_str(&format!(" (operation: {})", operation));
    }
    if let Some(status) = status {
        out.push_str(&format!(" (status: {})", status));
    }
    if let Some(source) = source {
        out.push_str(&format!(": {}", source));
    }
    out
}

/// Error body returned by the F5XC API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<ApiErrorDetail>,
}

/// Single entry of [`ApiErrorResponse::details`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "@type", default)]
    pub detail_type: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub domain: String,
}

impl F5xcError {
    /// Create a bare error with a code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
            operation: None,
            status: None,
            details: Map::new(),
            source: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Whether the failure is potentially transient
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::RateLimit
                | ErrorCode::Timeout
                | ErrorCode::NetworkError
                | ErrorCode::ServerError
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }

    /// Build an error from a non-success API response
    pub fn from_response(status: u16, body: &[u8], resource: &str, operation: &str) -> Self {
        let (code, message) = match status {
            404 => (ErrorCode::NotFound, format!("{} not found", resource)),
            401 => (
                ErrorCode::Unauthorized,
                "API authentication failed - check your API token".to_string(),
            ),
            403 => (
                ErrorCode::Forbidden,
                "Access denied - insufficient permissions".to_string(),
            ),
            409 => (
                ErrorCode::Conflict,
                format!("{} already exists or has a conflicting state", resource),
            ),
            429 => (
                ErrorCode::RateLimit,
                "API rate limit exceeded - retry after a delay".to_string(),
            ),
            400 => (
                ErrorCode::BadRequest,
                "Invalid request parameters".to_string(),
            ),
            s if s >= 500 => (ErrorCode::ServerError, "F5 XC API server error".to_string()),
            s => (
                ErrorCode::BadRequest,
                format!("API request failed with status {}", s),
            ),
        };

        let mut err = F5xcError::new(code, message)
            .with_resource(resource)
            .with_operation(operation);
        err.status = Some(status);

        if !body.is_empty() {
            match serde_json::from_slice::<ApiErrorResponse>(body) {
                Ok(api_err) => {
                    if !api_err.message.is_empty() {
                        err.message = api_err.message;
                    }
                    if !api_err.code.is_empty() {
                        err.details
                            .insert("api_code".to_string(), Value::String(api_err.code));
                    }
                    if !api_err.details.is_empty() {
                        if let Ok(details) = serde_json::to_value(&api_err.details) {
                            err.details.insert("api_details".to_string(), details);
                        }
                    }
                }
                Err(_) => {
                    err.details.insert(
                        "raw_response".to_string(),
                        Value::String(String::from_utf8_lossy(body).into_owned()),
                    );
                }
            }
        }

        err
    }

    pub fn not_found(resource: &str, name: &str, namespace: &str) -> Self {
        F5xcError::new(
            ErrorCode::NotFound,
            format!(
                "{} '{}' not found in namespace '{}'",
                resource, name, namespace
            ),
        )
        .with_resource(resource)
        .with_detail("name", name)
        .with_detail("namespace", namespace)
    }

    pub fn validation(resource: &str, field: &str, message: &str) -> Self {
        F5xcError::new(
            ErrorCode::Validation,
            format!("validation failed for {}.{}: {}", resource, field, message),
        )
        .with_resource(resource)
        .with_detail("field", field)
    }

    pub fn timeout(resource: &str, operation: &str, source: Option<BoxError>) -> Self {
        let mut err = F5xcError::new(
            ErrorCode::Timeout,
            format!("operation timed out: {} {}", operation, resource),
        )
        .with_resource(resource)
        .with_operation(operation);
        err.source = source;
        err
    }

    pub fn network(source: impl Into<BoxError>) -> Self {
        F5xcError::new(
            ErrorCode::NetworkError,
            "network error communicating with F5 XC API",
        )
        .with_source(source)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        F5xcError::new(ErrorCode::Configuration, message)
    }

    /// Attach resource/operation context to an arbitrary error.
    ///
    /// Existing `F5xcError`s keep their code and are relabelled; anything else
    /// becomes a `SERVER_ERROR` wrapping the cause.
    pub fn wrap(err: impl Into<BoxError>, resource: &str, operation: &str) -> Self {
        let boxed: BoxError = err.into();
        match boxed.downcast::<F5xcError>() {
            Ok(existing) => {
                let mut existing = *existing;
                existing.resource = Some(resource.to_string());
                existing.operation = Some(operation.to_string());
                existing
            }
            Err(other) => F5xcError::new(ErrorCode::ServerError, other.to_string())
                .with_resource(resource)
                .with_operation(operation)
                .with_source(other),
        }
    }

    /// Headline such as "Not Found Error", used when reporting to users
    pub fn summary(&self) -> String {
        let words: Vec<String> = self
            .code
            .as_str()
            .split('_')
            .map(|word| {
                let lower = word.to_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect();
        format!("{} Error", words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_includes_context() {
        let mut err = F5xcError::new(ErrorCode::NotFound, "missing")
            .with_resource("http_loadbalancer")
            .with_operation("GET");
        err.status = Some(404);

        assert_eq!(
            err.to_string(),
            "[NOT_FOUND] missing (resource: http_loadbalancer) (operation: GET) (status: 404)"
        );
    }

    #[test]
    fn test_display_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = F5xcError::network(io);
        assert!(err.to_string().starts_with("[NETWORK_ERROR]"));
        assert!(err.to_string().ends_with(": connection reset"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_retryable_codes() {
        for code in [
            ErrorCode::RateLimit,
            ErrorCode::Timeout,
            ErrorCode::NetworkError,
            ErrorCode::ServerError,
        ] {
            assert!(F5xcError::new(code, "x").is_retryable(), "{}", code);
        }
        for code in [
            ErrorCode::NotFound,
            ErrorCode::Conflict,
            ErrorCode::BadRequest,
            ErrorCode::Validation,
        ] {
            assert!(!F5xcError::new(code, "x").is_retryable(), "{}", code);
        }
    }

    #[test]
    fn test_from_response_status_mapping() {
        let cases = [
            (404, ErrorCode::NotFound),
            (401, ErrorCode::Unauthorized),
            (403, ErrorCode::Forbidden),
            (409, ErrorCode::Conflict),
            (429, ErrorCode::RateLimit),
            (400, ErrorCode::BadRequest),
            (500, ErrorCode::ServerError),
            (503, ErrorCode::ServerError),
            (418, ErrorCode::BadRequest),
        ];
        for (status, code) in cases {
            let err = F5xcError::from_response(status, b"", "/api/x", "GET");
            assert_eq!(err.code, code, "status {}", status);
            assert_eq!(err.status, Some(status));
        }

        let err = F5xcError::from_response(418, b"", "/api/x", "GET");
        assert_eq!(err.message, "API request failed with status 418");
    }

    #[test]
    fn test_from_response_parses_api_body() {
        let body = br#"{"code":"NOT_FOUND","message":"object does not exist","details":[{"@type":"t","reason":"r","domain":"d"}]}"#;
        let err = F5xcError::from_response(404, body, "/api/x", "GET");
        assert_eq!(err.message, "object does not exist");
        assert_eq!(err.details["api_code"], "NOT_FOUND");
        assert_eq!(err.details["api_details"][0]["reason"], "r");
    }

    #[test]
    fn test_from_response_keeps_raw_body() {
        let err = F5xcError::from_response(502, b"<html>bad gateway</html>", "/api/x", "PUT");
        assert_eq!(err.message, "F5 XC API server error");
        assert_eq!(err.details["raw_response"], "<html>bad gateway</html>");
    }

    #[test]
    fn test_constructors() {
        let err = F5xcError::not_found("origin_pool", "pool-a", "shared");
        assert!(err.is_not_found());
        assert_eq!(
            err.message,
            "origin_pool 'pool-a' not found in namespace 'shared'"
        );
        assert_eq!(err.details["namespace"], "shared");

        let err = F5xcError::validation("namespace", "name", "must not be empty");
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.details["field"], "name");

        let err = F5xcError::timeout("/api/x", "GET", None);
        assert_eq!(err.message, "operation timed out: GET /api/x");

        let err = F5xcError::configuration("F5XC_API_URL must be set");
        assert_eq!(err.code, ErrorCode::Configuration);
    }

    #[test]
    fn test_wrap_relabels_existing_error() {
        let inner = F5xcError::new(ErrorCode::Conflict, "exists");
        let wrapped = F5xcError::wrap(inner, "healthcheck", "create");
        assert_eq!(wrapped.code, ErrorCode::Conflict);
        assert_eq!(wrapped.resource.as_deref(), Some("healthcheck"));
        assert_eq!(wrapped.operation.as_deref(), Some("create"));
    }

    #[test]
    fn test_wrap_foreign_error() {
        let parse = serde_json::from_str::<Value>("{").unwrap_err();
        let wrapped = F5xcError::wrap(parse, "response", "decode");
        assert_eq!(wrapped.code, ErrorCode::ServerError);
        assert!(wrapped.source().is_some());
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            F5xcError::new(ErrorCode::NotFound, "x").summary(),
            "Not Found Error"
        );
        assert_eq!(
            F5xcError::new(ErrorCode::RateLimit, "x").summary(),
            "Rate Limit Error"
        );
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::NetworkError).unwrap();
        assert_eq!(json, "\"NETWORK_ERROR\"");
    }
}
