//! Sweepers remove leftover test objects from earlier, interrupted runs.
//!
//! Each sweeper owns one resource type and may depend on other sweepers;
//! dependencies always run first.
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::rate_limit::RateLimiter;
use super::tracker::DELETE_TIMEOUT;
use super::{is_test_resource, SWEEPER_TIMEOUT};
use crate::api::client::{with_deadline, F5xcClient};
use crate::error::{F5xcError, Result};
use crate::resources::registry::{
    ResourceType, APP_FIREWALL, HEALTHCHECK, HTTP_LOADBALANCER, IP_PREFIX_SET,
    MALICIOUS_USER_MITIGATION, NAMESPACE, ORIGIN_POOL, RATE_LIMITER, SERVICE_POLICY,
    USER_IDENTIFICATION,
};

/// Namespace always scanned in addition to test namespaces
const SYSTEM_NAMESPACE: &str = "system";

#[derive(Debug, Clone)]
pub struct Sweeper {
    /// Terraform type name, e.g. `f5xc_origin_pool`
    pub name: String,
    pub kind: ResourceType,
    /// Sweepers that must run before this one
    pub dependencies: Vec<String>,
}

impl Sweeper {
    pub fn new(kind: ResourceType) -> Self {
        Self {
            name: kind.terraform_type(),
            kind,
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on(mut self, kinds: &[ResourceType]) -> Self {
        self.dependencies
            .extend(kinds.iter().map(ResourceType::terraform_type));
        self
    }
}

/// Result of running one sweeper
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub sweeper: String,
    pub swept: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SweeperRegistry {
    sweepers: Vec<Sweeper>,
    /// Deadline for one whole sweeper
    timeout: Duration,
    /// Deadline for each delete
    delete_timeout: Duration,
}

impl Default for SweeperRegistry {
    fn default() -> Self {
        Self {
            sweepers: Vec::new(),
            timeout: SWEEPER_TIMEOUT,
            delete_timeout: DELETE_TIMEOUT,
        }
    }
}

impl SweeperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeouts(mut self, sweeper: Duration, delete: Duration) -> Self {
        self.timeout = sweeper;
        self.delete_timeout = delete;
        self
    }

    /// Sweepers for every type the acceptance tests create
    pub fn with_defaults() -> Self {
        let leaves = [
            HTTP_LOADBALANCER,
            HEALTHCHECK,
            APP_FIREWALL,
            SERVICE_POLICY,
            IP_PREFIX_SET,
            RATE_LIMITER,
            USER_IDENTIFICATION,
            MALICIOUS_USER_MITIGATION,
        ];

        let mut registry = Self::new();
        for kind in leaves {
            registry.register(Sweeper::new(kind));
        }
        registry.register(Sweeper::new(ORIGIN_POOL).depends_on(&[HTTP_LOADBALANCER]));

        let mut everything = leaves.to_vec();
        everything.push(ORIGIN_POOL);
        registry.register(Sweeper::new(NAMESPACE).depends_on(&everything));
        registry
    }

    /// Add a sweeper, replacing any existing one with the same name
    pub fn register(&mut self, sweeper: Sweeper) {
        self.sweepers.retain(|s| s.name != sweeper.name);
        self.sweepers.push(sweeper);
    }

    pub fn get(&self, name: &str) -> Option<&Sweeper> {
        self.sweepers.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sweepers.iter().map(|s| s.name.as_str()).collect()
    }

    /// Sweepers to run, dependencies first.
    ///
    /// With `only`, returns that sweeper and everything it depends on.
    pub fn execution_order(&self, only: Option<&str>) -> Result<Vec<&Sweeper>> {
        let roots: Vec<&str> = match only {
            Some(name) => {
                if self.get(name).is_none() {
                    return Err(F5xcError::configuration(format!(
                        "unknown sweeper: {}",
                        name
                    )));
                }
                vec![name]
            }
            None => self.names(),
        };

        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut visiting = Vec::new();
        for root in roots {
            self.visit(root, &mut visiting, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        visiting: &mut Vec<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<&'a Sweeper>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if visiting.iter().any(|v| v == name) {
            visiting.push(name.to_string());
            return Err(F5xcError::configuration(format!(
                "sweeper dependency cycle: {}",
                visiting.join(" -> ")
            )));
        }
        let sweeper = self.get(name).ok_or_else(|| {
            F5xcError::configuration(format!("unknown sweeper dependency: {}", name))
        })?;

        visiting.push(name.to_string());
        for dep in &sweeper.dependencies {
            self.visit(dep, visiting, done, order)?;
        }
        visiting.pop();

        done.insert(name.to_string());
        order.push(sweeper);
        Ok(())
    }

    /// Run sweepers in dependency order, returning one report per sweeper.
    ///
    /// A sweeper that hits its deadline keeps the deletions it already made
    /// and gets the timeout appended to its errors.
    pub async fn run(
        &self,
        client: &F5xcClient,
        limiter: &RateLimiter,
        only: Option<&str>,
    ) -> Result<Vec<SweepReport>> {
        let order = self.execution_order(only)?;
        let mut reports = Vec::with_capacity(order.len());

        for sweeper in order {
            info!("Running sweeper {}", sweeper.name);
            let mut report = SweepReport {
                sweeper: sweeper.name.clone(),
                ..Default::default()
            };
            let outcome = with_deadline(
                self.timeout,
                sweeper.kind.name,
                "sweep",
                sweep(client, limiter, sweeper, self.delete_timeout, &mut report),
            )
            .await;
            if let Err(e) = outcome {
                report.errors.push(e.to_string());
            }

            if report.errors.is_empty() {
                info!("Sweeper {} removed {} objects", report.sweeper, report.swept);
            } else {
                warn!(
                    "Sweeper {} removed {} objects with {} errors",
                    report.sweeper,
                    report.swept,
                    report.errors.len()
                );
            }
            reports.push(report);
        }
        Ok(reports)
    }
}

async fn sweep(
    client: &F5xcClient,
    limiter: &RateLimiter,
    sweeper: &Sweeper,
    delete_timeout: Duration,
    report: &mut SweepReport,
) -> Result<()> {
    if sweeper.kind.is_namespace() {
        sweep_namespaces(client, limiter, delete_timeout, report).await
    } else {
        sweep_resources(client, limiter, sweeper, delete_timeout, report).await
    }
}

async fn sweep_namespaces(
    client: &F5xcClient,
    limiter: &RateLimiter,
    delete_timeout: Duration,
    report: &mut SweepReport,
) -> Result<()> {
    for name in client.namespace_names().await? {
        if !is_test_resource(&name) {
            continue;
        }
        limiter.wait_for_cleanup().await;
        info!("Sweeping namespace {}", name);
        let deleted = with_deadline(
            delete_timeout,
            "namespace",
            "cascade_delete",
            client.cascade_delete_namespace(&name),
        )
        .await;
        match deleted {
            Ok(()) => report.swept += 1,
            Err(e) if e.is_not_found() => {}
            Err(e) => report.errors.push(format!("namespace {}: {}", name, e)),
        }
    }
    Ok(())
}

async fn sweep_resources(
    client: &F5xcClient,
    limiter: &RateLimiter,
    sweeper: &Sweeper,
    delete_timeout: Duration,
    report: &mut SweepReport,
) -> Result<()> {
    let mut namespaces: Vec<String> = client
        .namespace_names()
        .await?
        .into_iter()
        .filter(|ns| is_test_resource(ns))
        .collect();
    namespaces.push(SYSTEM_NAMESPACE.to_string());

    let api = client.resource(sweeper.kind);
    let listings = join_all(namespaces.iter().map(|ns| api.list(ns))).await;

    for (namespace, listing) in namespaces.iter().zip(listings) {
        let items = match listing {
            Ok(items) => items,
            Err(e) => {
                debug!("Skipping {} in {}: {}", sweeper.kind, namespace, e);
                continue;
            }
        };

        for item in items.iter().filter(|i| is_test_resource(i.name())) {
            limiter.wait_for_cleanup().await;
            info!("Sweeping {} {}/{}", sweeper.kind, namespace, item.name());
            let deleted = with_deadline(
                delete_timeout,
                sweeper.kind.name,
                "delete",
                api.delete(namespace, item.name()),
            )
            .await;
            match deleted {
                Ok(()) => report.swept += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => report.errors.push(format!(
                    "{} {}/{}: {}",
                    sweeper.kind,
                    namespace,
                    item.name(),
                    e
                )),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn position(order: &[&Sweeper], name: &str) -> usize {
        order.iter().position(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_default_order_runs_dependencies_first() {
        let registry = SweeperRegistry::with_defaults();
        let order = registry.execution_order(None).unwrap();

        assert_eq!(order.len(), 10);
        assert!(position(&order, "f5xc_http_loadbalancer") < position(&order, "f5xc_origin_pool"));
        assert_eq!(order.last().unwrap().name, "f5xc_namespace");
    }

    #[test]
    fn test_single_sweeper_includes_dependencies() {
        let registry = SweeperRegistry::with_defaults();
        let order = registry.execution_order(Some("f5xc_origin_pool")).unwrap();
        let names: Vec<&str> = order.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["f5xc_http_loadbalancer", "f5xc_origin_pool"]);
    }

    #[test]
    fn test_unknown_sweeper() {
        let registry = SweeperRegistry::with_defaults();
        let err = registry.execution_order(Some("f5xc_nope")).unwrap_err();
        assert_eq!(err.code, ErrorCode::Configuration);
    }

    #[test]
    fn test_cycle_detected() {
        let mut registry = SweeperRegistry::new();
        registry.register(Sweeper::new(ORIGIN_POOL).depends_on(&[HEALTHCHECK]));
        registry.register(Sweeper::new(HEALTHCHECK).depends_on(&[ORIGIN_POOL]));

        let err = registry.execution_order(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::Configuration);
        assert!(err.message.contains("cycle"));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = SweeperRegistry::with_defaults();
        registry.register(Sweeper::new(ORIGIN_POOL));
        assert_eq!(registry.names().len(), 10);
        assert!(registry.get("f5xc_origin_pool").unwrap().dependencies.is_empty());
    }
}
