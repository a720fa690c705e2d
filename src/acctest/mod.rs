//! Support for acceptance tests against a live tenant or the mock server.
//!
//! Test objects are named with [`TEST_RESOURCE_PREFIX`] so sweepers can tell
//! them apart from real configuration.
pub mod destroy;
pub mod quota;
pub mod rate_limit;
pub mod sweep;
pub mod tracker;

use anyhow::Context;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use crate::api::client::{ClientOptions, F5xcClient};
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::mock::{fixtures, MockResponse, MockServer};
use crate::resources::registry::{ResourceType, NAMESPACE};
use rate_limit::RateLimiter;
use tracker::ResourceTracker;

pub use destroy::{verify_destroyed, verify_tracked_destroyed, wait_for_destroyed};
pub use quota::{quota_skip_reason, QuotaRequirement};
pub use sweep::{SweepReport, Sweeper, SweeperRegistry};
pub use tracker::{CleanupReport, TrackedResource};

pub const TEST_RESOURCE_PREFIX: &str = "tf-acc-test-";
pub const LEGACY_TEST_PREFIX: &str = "tf-test-";

/// Deadline for a whole sweeper run
pub const SWEEPER_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const ENV_TEST_NAMESPACE: &str = "F5XC_TEST_NAMESPACE";
pub const ENV_TF_ACC: &str = "TF_ACC";
pub const ENV_MOCK_MODE: &str = "F5XC_MOCK_MODE";

const DEFAULT_TEST_NAMESPACE: &str = "system";

/// Whether `name` was created by a test run
pub fn is_test_resource(name: &str) -> bool {
    name.starts_with(TEST_RESOURCE_PREFIX) || name.starts_with(LEGACY_TEST_PREFIX)
}

fn random_lowercase(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

/// `{prefix}-{8 random lowercase alphanumerics}`
pub fn random_name(prefix: &str) -> String {
    format!("{}-{}", prefix.trim_end_matches('-'), random_lowercase(8))
}

/// `{prefix}-{6 random lowercase alphanumerics}-{suffix}`
pub fn random_name_with_suffix(prefix: &str, suffix: &str) -> String {
    format!(
        "{}-{}-{}",
        prefix.trim_end_matches('-'),
        random_lowercase(6),
        suffix
    )
}

pub fn test_namespace() -> String {
    test_namespace_from(|key| std::env::var(key).ok())
}

fn test_namespace_from<F: Fn(&str) -> Option<String>>(lookup: F) -> String {
    lookup(ENV_TEST_NAMESPACE)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_NAMESPACE.to_string())
}

pub fn is_mock_mode() -> bool {
    flag_set(|key| std::env::var(key).ok(), ENV_MOCK_MODE)
}

/// Acceptance tests only run when `TF_ACC` is set
pub fn acceptance_enabled() -> bool {
    flag_set(|key| std::env::var(key).ok(), ENV_TF_ACC)
}

fn flag_set<F: Fn(&str) -> Option<String>>(lookup: F, key: &str) -> bool {
    matches!(
        lookup(key).as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes")
    )
}

/// Fail fast when a live run lacks credentials.
///
/// Mock mode needs nothing from the environment.
pub fn pre_check() -> anyhow::Result<()> {
    if is_mock_mode() {
        return Ok(());
    }
    ProviderConfig::from_env().context("acceptance test environment is incomplete")?;
    Ok(())
}

/// Mock server plus a client tuned for fast tests
pub struct MockHarness {
    pub server: MockServer,
    pub client: F5xcClient,
    pub tracker: ResourceTracker,
    pub limiter: RateLimiter,
}

impl MockHarness {
    pub async fn start() -> Result<Self> {
        let server = MockServer::start().await?;
        let options = ClientOptions::default()
            .with_timeout(Duration::from_secs(5))
            .with_retry_wait(Duration::from_millis(10), Duration::from_millis(50))
            .with_rate_limit_delay(Duration::from_millis(20));
        let client = F5xcClient::new(&server.url(), "mock-token", options)?;
        info!("Mock harness ready at {}", server.url());

        Ok(Self {
            server,
            client,
            tracker: ResourceTracker::new(),
            limiter: RateLimiter::disabled(),
        })
    }

    /// Store a namespace object and return its path
    pub fn setup_namespace(&self, name: &str) -> String {
        let path = NAMESPACE.item_path("", name);
        self.server.set_resource(
            &path,
            fixtures::namespace_response(name, &HashMap::new(), &HashMap::new(), ""),
        );
        path
    }

    /// Store an object of `kind` and return its path
    pub fn setup_resource(
        &self,
        kind: ResourceType,
        namespace: &str,
        name: &str,
        spec: Map<String, Value>,
    ) -> String {
        let path = kind.item_path(namespace, name);
        self.server.set_resource(
            &path,
            fixtures::generic_resource_response(namespace, name, kind.api_path, spec),
        );
        path
    }

    /// Answer every request for `kind` in `namespace` with an API error
    pub fn simulate_api_error(
        &self,
        kind: ResourceType,
        namespace: &str,
        status: u16,
        code: &str,
        message: &str,
    ) -> Result<()> {
        let pattern = format!("^{}(/.*)?$", regex::escape(&kind.collection_path(namespace)));
        let (code, message) = (code.to_string(), message.to_string());
        self.server
            .set_handler(&pattern, move |_| MockResponse::error(status, &code, message.clone()))
    }

    pub fn simulate_not_implemented(&self, kind: ResourceType, namespace: &str) -> Result<()> {
        self.simulate_api_error(
            kind,
            namespace,
            501,
            "NOT_IMPLEMENTED",
            "This feature is not implemented for this tenant",
        )
    }

    pub fn simulate_forbidden(&self, kind: ResourceType, namespace: &str) -> Result<()> {
        self.simulate_api_error(
            kind,
            namespace,
            403,
            "FORBIDDEN",
            "Access denied: insufficient permissions",
        )
    }

    /// Serve a fixed quota usage document for `namespace`
    pub fn setup_quota(&self, namespace: &str, quotas: &[(&str, i64, i64)]) {
        let body = fixtures::quota_usage_response(quotas);
        let path = crate::api::quota::quota_usage_path(namespace);
        let pattern = format!("^{}$", regex::escape(&path));
        // the pattern is escaped, so registration cannot fail
        let _ = self
            .server
            .set_handler(&pattern, move |_| MockResponse::ok(body.clone()));
    }
}

/// Spec map from a JSON object literal; anything else yields an empty map
pub fn spec_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Minimal origin pool spec pointing at a public IP
pub fn origin_pool_spec(port: u16) -> Map<String, Value> {
    spec_map(json!({
        "origin_servers": [{"public_ip": {"ip": "93.184.216.34"}}],
        "port": port,
        "no_tls": true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_test_resource() {
        assert!(is_test_resource("tf-acc-test-pool-abc"));
        assert!(is_test_resource("tf-test-legacy"));
        assert!(!is_test_resource("production-lb"));
        assert!(!is_test_resource("my-tf-acc-test-x"));
    }

    #[test]
    fn test_random_name() {
        let name = random_name("tf-acc-test-pool");
        let suffix = name.strip_prefix("tf-acc-test-pool-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(random_name("x"), random_name("x"));
    }

    #[test]
    fn test_random_name_with_suffix() {
        let name = random_name_with_suffix("tf-acc-test-lb", "origin");
        let middle = name
            .strip_prefix("tf-acc-test-lb-")
            .and_then(|rest| rest.strip_suffix("-origin"))
            .unwrap();
        assert_eq!(middle.len(), 6);
        assert!(middle
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(is_test_resource(&name));
    }

    #[test]
    fn test_namespace_default() {
        assert_eq!(test_namespace_from(|_| None), "system");
        assert_eq!(test_namespace_from(|_| Some(String::new())), "system");
        assert_eq!(test_namespace_from(|_| Some("acc".to_string())), "acc");
    }

    #[test]
    fn test_flag_set() {
        assert!(flag_set(|_| Some("1".to_string()), ENV_TF_ACC));
        assert!(flag_set(|_| Some("TRUE".to_string()), ENV_TF_ACC));
        assert!(!flag_set(|_| Some("0".to_string()), ENV_TF_ACC));
        assert!(!flag_set(|_| None, ENV_TF_ACC));
    }

    #[test]
    fn test_spec_map() {
        assert_eq!(spec_map(json!({"a": 1}))["a"], 1);
        assert!(spec_map(json!([1, 2])).is_empty());
    }
}
