//! Registry of F5XC resource types and their API paths

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Prefix of Terraform type names for this provider
pub const TERRAFORM_PREFIX: &str = "f5xc_";

/// Which API tree a resource type lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiGroup {
    /// Namespaced objects under `/api/config/namespaces/{ns}/{api_path}`
    Config,
    /// Namespaces themselves under `/api/web/namespaces`
    Web,
}

impl ApiGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiGroup::Config => "config",
            ApiGroup::Web => "web",
        }
    }
}

/// Static description of one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceType {
    pub name: &'static str,
    pub api_path: &'static str,
    pub group: ApiGroup,
}

impl ResourceType {
    const fn config(name: &'static str, api_path: &'static str) -> Self {
        Self {
            name,
            api_path,
            group: ApiGroup::Config,
        }
    }

    pub fn is_namespace(&self) -> bool {
        self.group == ApiGroup::Web
    }

    /// Terraform type name, e.g. `f5xc_http_loadbalancer`
    pub fn terraform_type(&self) -> String {
        format!("{}{}", TERRAFORM_PREFIX, self.name)
    }

    /// Collection path; `namespace` is ignored for the namespace type
    pub fn collection_path(&self, namespace: &str) -> String {
        match self.group {
            ApiGroup::Web => "/api/web/namespaces".to_string(),
            ApiGroup::Config => format!(
                "/api/config/namespaces/{}/{}",
                namespace, self.api_path
            ),
        }
    }

    pub fn item_path(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}", self.collection_path(namespace), name)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub const NAMESPACE: ResourceType = ResourceType {
    name: "namespace",
    api_path: "namespaces",
    group: ApiGroup::Web,
};

// API paths are the type name plus "s", including "policys".
macro_rules! config_types {
    ($($konst:ident => $name:literal),* $(,)?) => {
        $(
            pub const $konst: ResourceType = ResourceType::config($name, concat!($name, "s"));
        )*

        /// Every known resource type, namespace first
        pub static ALL: &[ResourceType] = &[NAMESPACE, $($konst),*];
    };
}

config_types! {
    ADDON_SUBSCRIPTION => "addon_subscription",
    ADDRESS_ALLOCATOR => "address_allocator",
    ADVERTISE_POLICY => "advertise_policy",
    ALERT_POLICY => "alert_policy",
    ALERT_RECEIVER => "alert_receiver",
    API_CRAWLER => "api_crawler",
    API_CREDENTIAL => "api_credential",
    API_DEFINITION => "api_definition",
    API_DISCOVERY => "api_discovery",
    APM => "apm",
    APP_API_GROUP => "app_api_group",
    APP_FIREWALL => "app_firewall",
    APP_SETTING => "app_setting",
    APP_TYPE => "app_type",
    AUTHENTICATION => "authentication",
    AWS_TGW_SITE => "aws_tgw_site",
    AWS_VPC_SITE => "aws_vpc_site",
    AZURE_VNET_SITE => "azure_vnet_site",
    BGP => "bgp",
    BGP_ASN_SET => "bgp_asn_set",
    BGP_ROUTING_POLICY => "bgp_routing_policy",
    BOT_DEFENSE_APP_INFRASTRUCTURE => "bot_defense_app_infrastructure",
    CDN_LOADBALANCER => "cdn_loadbalancer",
    CERTIFICATE => "certificate",
    CERTIFICATE_CHAIN => "certificate_chain",
    CHILD_TENANT_MANAGER => "child_tenant_manager",
    CLOUD_CREDENTIALS => "cloud_credentials",
    CLOUD_LINK => "cloud_link",
    CLUSTER => "cluster",
    CODE_BASE_INTEGRATION => "code_base_integration",
    CONTACT => "contact",
    CRL => "crl",
    DATA_GROUP => "data_group",
    DATA_TYPE => "data_type",
    DC_CLUSTER_GROUP => "dc_cluster_group",
    DISCOVERY => "discovery",
    DNS_DOMAIN => "dns_domain",
    DNS_LB_HEALTH_CHECK => "dns_lb_health_check",
    DNS_LB_POOL => "dns_lb_pool",
    DNS_LOAD_BALANCER => "dns_load_balancer",
    DNS_ZONE => "dns_zone",
    ENHANCED_FIREWALL_POLICY => "enhanced_firewall_policy",
    EXTERNAL_CONNECTOR => "external_connector",
    FAST_ACL => "fast_acl",
    FAST_ACL_RULE => "fast_acl_rule",
    FILTER_SET => "filter_set",
    FLEET => "fleet",
    FLOW => "flow",
    FLOW_ANOMALY => "flow_anomaly",
    FORWARD_PROXY_POLICY => "forward_proxy_policy",
    FORWARDING_CLASS => "forwarding_class",
    GCP_VPC_SITE => "gcp_vpc_site",
    GEO_LOCATION_SET => "geo_location_set",
    GLOBAL_LOG_RECEIVER => "global_log_receiver",
    HEALTHCHECK => "healthcheck",
    HTTP_LOADBALANCER => "http_loadbalancer",
    IKE1 => "ike1",
    IKE2 => "ike2",
    IKE_PHASE1_PROFILE => "ike_phase1_profile",
    IKE_PHASE2_PROFILE => "ike_phase2_profile",
    INFRAPROTECT_ASN => "infraprotect_asn",
    INFRAPROTECT_ASN_PREFIX => "infraprotect_asn_prefix",
    INFRAPROTECT_DENY_LIST_RULE => "infraprotect_deny_list_rule",
    INFRAPROTECT_FIREWALL_RULE => "infraprotect_firewall_rule",
    INFRAPROTECT_TUNNEL => "infraprotect_tunnel",
    IP_PREFIX_SET => "ip_prefix_set",
    K8S_CLUSTER => "k8s_cluster",
    K8S_CLUSTER_ROLE => "k8s_cluster_role",
    K8S_CLUSTER_ROLE_BINDING => "k8s_cluster_role_binding",
    K8S_POD_SECURITY_ADMISSION => "k8s_pod_security_admission",
    K8S_POD_SECURITY_POLICY => "k8s_pod_security_policy",
    KNOWN_LABEL => "known_label",
    KNOWN_LABEL_KEY => "known_label_key",
    LOG_RECEIVER => "log_receiver",
    MALICIOUS_USER_MITIGATION => "malicious_user_mitigation",
    MODULE_MANAGEMENT => "module_management",
    NETWORK_CONNECTOR => "network_connector",
    NETWORK_FIREWALL => "network_firewall",
    NETWORK_INTERFACE => "network_interface",
    NETWORK_POLICY => "network_policy",
    NETWORK_POLICY_RULE => "network_policy_rule",
    NETWORK_POLICY_VIEW => "network_policy_view",
    NFV_SERVICE => "nfv_service",
    ORIGIN_POOL => "origin_pool",
    POLICER => "policer",
    POLICY_BASED_ROUTING => "policy_based_routing",
    PROTOCOL_INSPECTION => "protocol_inspection",
    PROTOCOL_POLICER => "protocol_policer",
    RATE_LIMITER => "rate_limiter",
    RATE_LIMITER_POLICY => "rate_limiter_policy",
    ROUTE => "route",
    RULE_SUGGESTION => "rule_suggestion",
    SECRET_MANAGEMENT_ACCESS => "secret_management_access",
    SECRET_POLICY => "secret_policy",
    SECRET_POLICY_RULE => "secret_policy_rule",
    SECUREMESH_SITE => "securemesh_site",
    SECUREMESH_SITE_V2 => "securemesh_site_v2",
    SEGMENT => "segment",
    SENSITIVE_DATA_POLICY => "sensitive_data_policy",
    SERVICE_POLICY => "service_policy",
    SERVICE_POLICY_RULE => "service_policy_rule",
    SITE_MESH_GROUP => "site_mesh_group",
    SRV6_NETWORK_SLICE => "srv6_network_slice",
    SUBNET => "subnet",
    TCP_LOADBALANCER => "tcp_loadbalancer",
    TENANT_CONFIGURATION => "tenant_configuration",
    TENANT_PROFILE => "tenant_profile",
    THIRD_PARTY_APPLICATION => "third_party_application",
    TICKET_TRACKING_SYSTEM => "ticket_tracking_system",
    TOKEN => "token",
    TPM_API_KEY => "tpm_api_key",
    TPM_CATEGORY => "tpm_category",
    TPM_MANAGER => "tpm_manager",
    TRUSTED_CA_LIST => "trusted_ca_list",
    TUNNEL => "tunnel",
    UDP_LOADBALANCER => "udp_loadbalancer",
    USB_POLICY => "usb_policy",
    USER_IDENTIFICATION => "user_identification",
    VIRTUAL_HOST => "virtual_host",
    VIRTUAL_K8S => "virtual_k8s",
    VIRTUAL_NETWORK => "virtual_network",
    VIRTUAL_SITE => "virtual_site",
    VOLTSHARE_ADMIN_POLICY => "voltshare_admin_policy",
    VOLTSTACK_SITE => "voltstack_site",
    WAF_EXCLUSION_POLICY => "waf_exclusion_policy",
    WORKLOAD => "workload",
    WORKLOAD_FLAVOR => "workload_flavor",
}

static BY_KEY: LazyLock<HashMap<&'static str, ResourceType>> = LazyLock::new(|| {
    let mut map = HashMap::with_capacity(ALL.len() * 2);
    for kind in ALL {
        map.insert(kind.name, *kind);
        map.insert(kind.api_path, *kind);
    }
    map
});

/// Find a resource type by name, Terraform type name or API path
pub fn lookup(name: &str) -> Option<ResourceType> {
    let key = name.strip_prefix(TERRAFORM_PREFIX).unwrap_or(name);
    BY_KEY.get(key).copied()
}

/// Every known resource type
pub fn all() -> impl Iterator<Item = ResourceType> {
    ALL.iter().copied()
}
