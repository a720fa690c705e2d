//! Request dispatch for the mock API
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{read, write, MockRequest, MockResponse, RequestRecord, SharedState};

const MOCK_TENANT: &str = "mock-tenant";
const DEFAULT_NAMESPACE: &str = "system";

pub(crate) fn router(state: SharedState) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

async fn dispatch(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = MockRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    debug!("mock: {} {}", request.method, request.path);

    let delay = record(&state, &request);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    handle(&state, &request).into_response()
}

fn record(state: &SharedState, request: &MockRequest) -> std::time::Duration {
    let mut guard = write(state);
    guard.request_log.push(RequestRecord {
        method: request.method.clone(),
        path: request.path.clone(),
        headers: request.headers.clone(),
        body: request.body.clone(),
        timestamp: Utc::now(),
    });
    guard.delay
}

pub(crate) fn handle(state: &SharedState, request: &MockRequest) -> MockResponse {
    let handler = {
        let guard = read(state);
        if let Some(injected) = guard.errors.get(&request.path) {
            debug!("mock: injected {} for {}", injected.status, request.path);
            return injected.clone();
        }
        guard
            .handlers
            .iter()
            .find(|(pattern, _)| pattern.is_match(&request.path))
            .map(|(_, handler)| Arc::clone(handler))
    };
    if let Some(handler) = handler {
        return handler(request);
    }

    if let Some(response) = special_endpoint(state, request) {
        return response;
    }

    match request.method.as_str() {
        "GET" => handle_get(state, &request.path),
        "POST" => handle_post(state, &request.path, &request.body),
        "PUT" => handle_put(state, &request.path, &request.body),
        "DELETE" => handle_delete(state, &request.path),
        _ => MockResponse::error(405, "METHOD_NOT_ALLOWED", "Method not allowed"),
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.trim_start_matches('/').split('/').collect()
}

/// `/api/{group}/namespaces` or `/api/{group}/namespaces/{ns}/{type}`
fn is_collection(path: &str) -> bool {
    if path.ends_with('/') {
        return false;
    }
    let parts = segments(path);
    matches!(parts.len(), 3 | 5) && parts[0] == "api" && parts[2] == "namespaces"
}

/// Namespace an object under `path` belongs to
fn namespace_of(path: &str) -> Option<&str> {
    let parts = segments(path);
    if parts.len() >= 5 && parts[0] == "api" && parts[2] == "namespaces" {
        Some(parts[3])
    } else {
        None
    }
}

/// Namespace named by a `/api/{group}/namespaces/{ns}` path
fn namespace_target(path: &str) -> Option<&str> {
    let parts = segments(path);
    if parts.len() == 4 && parts[0] == "api" && parts[2] == "namespaces" {
        Some(parts[3])
    } else {
        None
    }
}

fn special_endpoint(state: &SharedState, request: &MockRequest) -> Option<MockResponse> {
    if request.method == "POST" {
        let target = request.path.strip_suffix("/cascade_delete")?;
        return Some(cascade_delete(state, target));
    }

    if request.method == "GET" && is_collection(&request.path) {
        let prefix = format!("{}/", request.path);
        let guard = read(state);
        let mut children: Vec<(&String, &Value)> = guard
            .resources
            .iter()
            .filter(|(key, _)| {
                key.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .collect();
        children.sort_by(|a, b| a.0.cmp(b.0));
        let items: Vec<Value> = children.into_iter().map(|(_, v)| v.clone()).collect();
        return Some(MockResponse::ok(json!({ "items": items })));
    }

    None
}

fn cascade_delete(state: &SharedState, target: &str) -> MockResponse {
    debug!("mock: cascade_delete {}", target);
    let child_prefix = format!("{}/", target);
    let namespace = namespace_target(target);

    let mut guard = write(state);
    guard.resources.retain(|key, _| {
        let doomed = key == target
            || key.starts_with(&child_prefix)
            || (namespace.is_some() && namespace_of(key) == namespace);
        if doomed {
            debug!("mock: cascade_delete removing {}", key);
        }
        !doomed
    });

    MockResponse::ok(json!({"status": "deleted"}))
}

fn handle_get(state: &SharedState, path: &str) -> MockResponse {
    match read(state).resources.get(path) {
        Some(resource) => MockResponse::ok(resource.clone()),
        None => not_found(path),
    }
}

fn handle_post(state: &SharedState, path: &str, body: &str) -> MockResponse {
    let request: Map<String, Value> = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(_) => return MockResponse::error(400, "BAD_REQUEST", "Invalid JSON body"),
    };

    let Some(metadata) = request.get("metadata").and_then(Value::as_object) else {
        return MockResponse::error(400, "BAD_REQUEST", "Missing metadata");
    };
    let name = match metadata.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return MockResponse::error(
                400,
                "BAD_REQUEST",
                "Missing or invalid name in metadata",
            )
        }
    };

    let resource_type = segments(path).last().copied().unwrap_or_default();
    if resource_type == "dns_domains" && !is_valid_domain_name(&name) {
        return MockResponse::error(
            400,
            "BAD_REQUEST",
            format!(
                "Invalid domain name: {} - must be a valid DNS domain",
                name
            ),
        );
    }

    let resource_path = format!("{}/{}", path, name);
    let namespace = namespace_of(&resource_path).unwrap_or(DEFAULT_NAMESPACE);

    let mut guard = write(state);
    if guard.resources.contains_key(&resource_path) {
        return MockResponse::error(
            409,
            "ALREADY_EXISTS",
            format!("Resource already exists: {}", name),
        );
    }

    let response = build_response(&request, namespace, resource_type);
    guard.resources.insert(resource_path, response.clone());
    MockResponse::ok(response)
}

fn handle_put(state: &SharedState, path: &str, body: &str) -> MockResponse {
    let request: Map<String, Value> = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(_) => return MockResponse::error(400, "BAD_REQUEST", "Invalid JSON body"),
    };

    let parts = segments(path);
    let resource_type = parts
        .len()
        .checked_sub(2)
        .and_then(|i| parts.get(i))
        .copied()
        .unwrap_or_default();
    let namespace = namespace_of(path).unwrap_or(DEFAULT_NAMESPACE);

    let mut guard = write(state);
    if !guard.resources.contains_key(path) {
        return not_found(path);
    }

    let response = build_response(&request, namespace, resource_type);
    guard.resources.insert(path.to_string(), response.clone());
    MockResponse::ok(response)
}

fn handle_delete(state: &SharedState, path: &str) -> MockResponse {
    match write(state).resources.remove(path) {
        Some(_) => MockResponse::ok(json!({"status": "deleted"})),
        None => not_found(path),
    }
}

fn not_found(path: &str) -> MockResponse {
    MockResponse::error(404, "NOT_FOUND", format!("Resource not found: {}", path))
}

pub(crate) fn generate_uid() -> String {
    format!("mock-uid-{}", Uuid::new_v4())
}

pub(crate) fn system_metadata() -> Value {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    json!({
        "uid": generate_uid(),
        "creation_timestamp": now,
        "modification_timestamp": now,
        "creator_class": "API",
        "creator_id": "mock-server",
        "tenant": MOCK_TENANT,
    })
}

/// Stored form of a create or replace request
fn build_response(request: &Map<String, Value>, namespace: &str, resource_type: &str) -> Value {
    let mut response = Map::new();

    if let Some(metadata) = request.get("metadata").and_then(Value::as_object) {
        let mut metadata = metadata.clone();
        metadata
            .entry("uid")
            .or_insert_with(|| Value::String(generate_uid()));
        metadata.insert("namespace".to_string(), Value::String(namespace.to_string()));
        response.insert("metadata".to_string(), Value::Object(metadata));
    }

    let mut spec = match request.get("spec") {
        Some(Value::Object(spec)) => spec.clone(),
        _ => Map::new(),
    };
    for value in spec.values_mut() {
        add_tenant(value, MOCK_TENANT);
    }
    apply_defaults(&mut spec, resource_type);
    if !spec.is_empty() || request.contains_key("spec") {
        response.insert("spec".to_string(), Value::Object(spec));
    }

    response.insert("system_metadata".to_string(), system_metadata());
    Value::Object(response)
}

/// Server-side defaults the real API fills in
fn apply_defaults(spec: &mut Map<String, Value>, resource_type: &str) {
    match resource_type {
        "secret_policy_rules" | "service_policy_rules" | "rate_limiter_policys" => {
            spec.entry("action")
                .or_insert_with(|| Value::String("DENY".to_string()));
        }
        _ => {}
    }
}

/// The API adds `tenant` to every nested object that carries a `name`
fn add_tenant(value: &mut Value, tenant: &str) {
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                add_tenant(child, tenant);
            }
            if map.contains_key("name") && !map.contains_key("tenant") {
                map.insert("tenant".to_string(), Value::String(tenant.to_string()));
            }
        }
        Value::Array(items) => {
            for item in items {
                add_tenant(item, tenant);
            }
        }
        _ => {}
    }
}

/// Lowercase DNS name with at least one dot
fn is_valid_domain_name(name: &str) -> bool {
    name.contains('.')
        && name.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        })
}

/// Config object path `/api/config/namespaces/{ns}/{type}/{name}`
pub fn resource_path(namespace: &str, resource_type: &str, name: &str) -> String {
    format!(
        "/api/config/namespaces/{}/{}/{}",
        namespace, resource_type, name
    )
}

/// Config collection path `/api/config/namespaces/{ns}/{type}`
pub fn list_path(namespace: &str, resource_type: &str) -> String {
    format!("/api/config/namespaces/{}/{}", namespace, resource_type)
}

/// Components of an object path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub namespace: String,
    pub resource_type: String,
    pub name: String,
}

/// Split `/api/{group}/namespaces/{ns}/{type}/{name}` into its parts
pub fn extract_resource_info(path: &str) -> Option<ResourceInfo> {
    let parts = segments(path);
    if parts.len() < 6 || parts[2] != "namespaces" {
        return None;
    }
    Some(ResourceInfo {
        namespace: parts[3].to_string(),
        resource_type: parts[4].to_string(),
        name: parts[parts.len() - 1].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CustomHandler, MockState};
    use std::sync::RwLock;

    fn state() -> SharedState {
        Arc::new(RwLock::new(MockState::default()))
    }

    fn request(method: &str, path: &str, body: Value) -> MockRequest {
        MockRequest {
            method: method.to_string(),
            path: path.to_string(),
            headers: Default::default(),
            body: if body.is_null() {
                String::new()
            } else {
                body.to_string()
            },
        }
    }

    fn post(state: &SharedState, path: &str, body: Value) -> MockResponse {
        handle(state, &request("POST", path, body))
    }

    #[test]
    fn test_create_read_delete() {
        let state = state();
        let collection = list_path("shared", "origin_pools");

        let created = post(
            &state,
            &collection,
            json!({"metadata": {"name": "pool-a"}, "spec": {"port": 443}}),
        );
        assert_eq!(created.status, 200);
        assert_eq!(created.body["metadata"]["namespace"], "shared");
        assert!(created.body["metadata"]["uid"]
            .as_str()
            .unwrap()
            .starts_with("mock-uid-"));
        assert_eq!(created.body["system_metadata"]["tenant"], "mock-tenant");
        assert_eq!(created.body["system_metadata"]["creator_id"], "mock-server");

        let path = resource_path("shared", "origin_pools", "pool-a");
        let read = handle(&state, &request("GET", &path, Value::Null));
        assert_eq!(read.status, 200);
        assert_eq!(read.body["spec"]["port"], 443);

        let deleted = handle(&state, &request("DELETE", &path, Value::Null));
        assert_eq!(deleted.body, json!({"status": "deleted"}));

        let gone = handle(&state, &request("GET", &path, Value::Null));
        assert_eq!(gone.status, 404);
        assert_eq!(gone.body["code"], "NOT_FOUND");
    }

    #[test]
    fn test_create_conflict() {
        let state = state();
        let body = json!({"metadata": {"name": "hc"}});
        let path = list_path("shared", "healthchecks");
        assert_eq!(post(&state, &path, body.clone()).status, 200);
        let second = post(&state, &path, body);
        assert_eq!(second.status, 409);
        assert_eq!(second.body["code"], "ALREADY_EXISTS");
    }

    #[test]
    fn test_create_rejects_bad_bodies() {
        let state = state();
        let path = list_path("shared", "healthchecks");
        let bad_json = handle(
            &state,
            &MockRequest {
                method: "POST".to_string(),
                path: path.clone(),
                headers: Default::default(),
                body: "{".to_string(),
            },
        );
        assert_eq!(bad_json.status, 400);
        assert_eq!(bad_json.body["message"], "Invalid JSON body");

        let no_meta = post(&state, &path, json!({"spec": {}}));
        assert_eq!(no_meta.body["message"], "Missing metadata");

        let no_name = post(&state, &path, json!({"metadata": {"name": ""}}));
        assert_eq!(no_name.body["message"], "Missing or invalid name in metadata");
    }

    #[test]
    fn test_dns_domain_validation() {
        let state = state();
        let path = list_path("system", "dns_domains");
        assert_eq!(post(&state, &path, json!({"metadata": {"name": "Example.com"}})).status, 400);
        assert_eq!(post(&state, &path, json!({"metadata": {"name": "nodot"}})).status, 400);
        assert_eq!(post(&state, &path, json!({"metadata": {"name": "a.example.com"}})).status, 200);
    }

    #[test]
    fn test_tenant_and_defaults() {
        let state = state();
        let created = post(
            &state,
            &list_path("shared", "service_policy_rules"),
            json!({
                "metadata": {"name": "rule"},
                "spec": {"refs": [{"name": "pool", "namespace": "shared"}], "nested": {"name": "x", "tenant": "keep"}}
            }),
        );
        assert_eq!(created.body["spec"]["action"], "DENY");
        assert_eq!(created.body["spec"]["refs"][0]["tenant"], "mock-tenant");
        assert_eq!(created.body["spec"]["nested"]["tenant"], "keep");

        let limiter = post(
            &state,
            &list_path("shared", "rate_limiter_policys"),
            json!({"metadata": {"name": "rl"}, "spec": {"action": "ALLOW"}}),
        );
        assert_eq!(limiter.body["spec"]["action"], "ALLOW");
    }

    #[test]
    fn test_put_requires_existing_object() {
        let state = state();
        let path = resource_path("shared", "service_policy_rules", "rule");
        let missing = handle(&state, &request("PUT", &path, json!({"metadata": {"name": "rule"}})));
        assert_eq!(missing.status, 404);

        post(
            &state,
            &list_path("shared", "service_policy_rules"),
            json!({"metadata": {"name": "rule"}}),
        );
        let updated = handle(
            &state,
            &request("PUT", &path, json!({"metadata": {"name": "rule"}, "spec": {"x": 1}})),
        );
        assert_eq!(updated.status, 200);
        assert_eq!(updated.body["spec"]["x"], 1);
        assert_eq!(updated.body["spec"]["action"], "DENY");
    }

    #[test]
    fn test_list_returns_direct_children_only() {
        let state = state();
        let collection = list_path("shared", "origin_pools");
        post(&state, &collection, json!({"metadata": {"name": "b"}}));
        post(&state, &collection, json!({"metadata": {"name": "a"}}));
        write(&state).resources.insert(
            format!("{}/a/child", collection),
            json!({"metadata": {"name": "child"}}),
        );

        let list = handle(&state, &request("GET", &collection, Value::Null));
        let items = list.body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["metadata"]["name"], "a");

        let empty = handle(&state, &request("GET", &list_path("other", "origin_pools"), Value::Null));
        assert_eq!(empty.body, json!({"items": []}));
    }

    #[test]
    fn test_namespace_cascade_delete() {
        let state = state();
        let created = post(&state, "/api/web/namespaces", json!({"metadata": {"name": "ns-a"}}));
        assert_eq!(created.body["metadata"]["namespace"], "system");
        post(&state, &list_path("ns-a", "origin_pools"), json!({"metadata": {"name": "p"}}));
        post(&state, &list_path("ns-b", "origin_pools"), json!({"metadata": {"name": "p"}}));

        let namespaces = handle(&state, &request("GET", "/api/web/namespaces", Value::Null));
        assert_eq!(namespaces.body["items"].as_array().unwrap().len(), 1);

        let response = post(&state, "/api/web/namespaces/ns-a/cascade_delete", json!({}));
        assert_eq!(response.body, json!({"status": "deleted"}));

        let keys: Vec<String> = read(&state).resources.keys().cloned().collect();
        assert_eq!(keys, vec![resource_path("ns-b", "origin_pools", "p")]);
    }

    #[test]
    fn test_injected_errors_and_handlers() {
        let state = state();
        let path = resource_path("shared", "origin_pools", "p");
        write(&state)
            .errors
            .insert(path.clone(), MockResponse::error(503, "UNAVAILABLE", "down"));
        let first: CustomHandler = Arc::new(|_: &MockRequest| MockResponse::ok(json!({"first": true})));
        let second: CustomHandler = Arc::new(|_: &MockRequest| MockResponse::ok(json!({"first": false})));
        write(&state)
            .handlers
            .push((regex::Regex::new("origin_pools").unwrap(), first));
        write(&state)
            .handlers
            .push((regex::Regex::new("origin").unwrap(), second));

        assert_eq!(handle(&state, &request("GET", &path, Value::Null)).status, 503);
        let other = resource_path("shared", "origin_pools", "q");
        assert_eq!(
            handle(&state, &request("GET", &other, Value::Null)).body,
            json!({"first": true})
        );
    }

    #[test]
    fn test_unsupported_method() {
        let state = state();
        let response = handle(&state, &request("PATCH", "/api/config/namespaces/a/b/c", Value::Null));
        assert_eq!(response.status, 405);
        assert_eq!(response.body["code"], "METHOD_NOT_ALLOWED");
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(
            extract_resource_info("/api/config/namespaces/shared/origin_pools/p"),
            Some(ResourceInfo {
                namespace: "shared".to_string(),
                resource_type: "origin_pools".to_string(),
                name: "p".to_string(),
            })
        );
        assert_eq!(extract_resource_info("/api/web/namespaces"), None);
        assert!(is_collection("/api/web/namespaces"));
        assert!(!is_collection("/api/web/namespaces/ns-a"));
        assert!(!is_collection("/api/config/namespaces/a/b/"));
    }

    #[test]
    fn test_domain_names() {
        assert!(is_valid_domain_name("example.com"));
        assert!(is_valid_domain_name("a-b.c1.io"));
        assert!(!is_valid_domain_name("-a.com"));
        assert!(!is_valid_domain_name("a..com"));
        assert!(!is_valid_domain_name("EXAMPLE.com"));
    }
}
