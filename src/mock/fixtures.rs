//! Canned API objects for pre-populating the mock
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::server::{generate_uid, system_metadata};

fn object(namespace: &str, name: &str, description: &str, spec: Value) -> Value {
    json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": generate_uid(),
            "description": description,
        },
        "spec": spec,
        "system_metadata": system_metadata(),
    })
}

/// Namespace object as returned by `/api/web/namespaces/{name}`
pub fn namespace_response(
    name: &str,
    labels: &HashMap<String, String>,
    annotations: &HashMap<String, String>,
    description: &str,
) -> Value {
    json!({
        "metadata": {
            "name": name,
            "namespace": "system",
            "uid": generate_uid(),
            "labels": labels,
            "annotations": annotations,
            "description": description,
        },
        "spec": {},
        "system_metadata": system_metadata(),
    })
}

/// Any object type with a caller-supplied spec
pub fn generic_resource_response(
    namespace: &str,
    name: &str,
    resource_type: &str,
    spec: Map<String, Value>,
) -> Value {
    object(
        namespace,
        name,
        &format!("Mock {} resource", resource_type),
        Value::Object(spec),
    )
}

pub fn origin_pool_response(namespace: &str, name: &str, port: u16) -> Value {
    object(
        namespace,
        name,
        "Mock origin pool",
        json!({
            "origin_servers": [{"public_ip": {"ip": "93.184.216.34"}}],
            "port": port,
            "no_tls": true,
            "endpoint_selection": "LOCAL_PREFERRED",
            "loadbalancer_algorithm": "LB_OVERRIDE",
        }),
    )
}

pub fn http_loadbalancer_response(namespace: &str, name: &str, domains: &[&str]) -> Value {
    object(
        namespace,
        name,
        "Mock HTTP load balancer",
        json!({
            "domains": domains,
            "http": {"port": 80},
            "advertise_on_public_default_vip": {},
            "default_route_pools": [],
        }),
    )
}

pub fn app_firewall_response(namespace: &str, name: &str) -> Value {
    object(
        namespace,
        name,
        "Mock app firewall",
        json!({
            "blocking": {},
            "default_detection_settings": {},
            "default_bot_setting": {},
            "allow_all_response_codes": {},
        }),
    )
}

/// `check` is "http", "tcp" or anything else for no probe block
pub fn healthcheck_response(namespace: &str, name: &str, check: &str) -> Value {
    let mut spec = json!({"timeout": 3, "interval": 15});
    match check {
        "http" => spec["http_health_check"] = json!({"path": "/health"}),
        "tcp" => spec["tcp_health_check"] = json!({}),
        _ => {}
    }
    object(namespace, name, "Mock healthcheck", spec)
}

/// Quota usage body from `(type, limit, used)` triples
pub fn quota_usage_response(entries: &[(&str, i64, i64)]) -> Value {
    let objects: Map<String, Value> = entries
        .iter()
        .map(|(resource_type, limit, used)| {
            (
                resource_type.to_string(),
                json!({"limit": {"maximum": limit}, "usage": {"current": used}}),
            )
        })
        .collect();
    json!({ "objects": objects })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Resource;
    use crate::api::quota::QuotaUsageResponse;

    #[test]
    fn test_fixtures_decode_as_models() {
        let pool: Resource = serde_json::from_value(origin_pool_response("shared", "p", 8443)).unwrap();
        assert_eq!(pool.namespace(), "shared");
        assert_eq!(pool.spec.field("port"), Some(&json!(8443)));
        assert_eq!(
            pool.system_metadata.unwrap().tenant.as_deref(),
            Some("mock-tenant")
        );

        let ns: Resource =
            serde_json::from_value(namespace_response("ns-a", &HashMap::new(), &HashMap::new(), "d"))
                .unwrap();
        assert_eq!(ns.name(), "ns-a");
    }

    #[test]
    fn test_healthcheck_variants() {
        let http = healthcheck_response("shared", "hc", "http");
        assert_eq!(http["spec"]["http_health_check"]["path"], "/health");
        let tcp = healthcheck_response("shared", "hc", "tcp");
        assert!(tcp["spec"].get("tcp_health_check").is_some());
    }

    #[test]
    fn test_quota_fixture() {
        let body = quota_usage_response(&[("origin_pool", 10, 3)]);
        let usage: QuotaUsageResponse = serde_json::from_value(body).unwrap();
        assert_eq!(usage.objects["origin_pool"].limit.maximum, 10);
        assert_eq!(usage.objects["origin_pool"].usage.current, 3);
    }
}
