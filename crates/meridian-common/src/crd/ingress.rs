//! Networking Ingress CRD
//!
//! The load-balancer-agnostic ingress description: per visibility class, which
//! hosts route to which backend services, with optional path and header
//! matching, header rewriting, weighted splits and TLS termination.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// CRD
// =============================================================================

/// Spec for an Ingress: routing intent independent of the proxy implementation
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.internal.knative.dev",
    version = "v1alpha1",
    kind = "Ingress",
    plural = "ingresses",
    shortname = "kingress",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    /// TLS bindings: which hosts terminate with which certificate secret
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTls>,

    /// Routing rules, one per visibility/host group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IngressRule>,

    /// Whether plaintext HTTP is served or redirected (absent = not permitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_option: Option<HttpOption>,
}

/// Handling of insecure (plaintext) traffic
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum HttpOption {
    /// Plaintext requests are served
    Enabled,
    /// Plaintext requests are redirected to HTTPS
    Redirected,
}

/// Certificate binding for a set of hosts
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressTls {
    /// Hosts served with this certificate
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Name of the secret holding the certificate
    pub secret_name: String,

    /// Namespace of the secret holding the certificate
    pub secret_namespace: String,
}

/// A group of hosts sharing visibility and HTTP routes
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    /// Hostnames this rule answers for
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Who can reach these hosts
    #[serde(default)]
    pub visibility: Visibility,

    /// HTTP routes (absent only in malformed input)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpIngressRuleValue>,
}

impl IngressRule {
    /// Paths of this rule, empty when the HTTP block is missing
    pub fn paths(&self) -> &[HttpIngressPath] {
        self.http.as_ref().map(|h| h.paths.as_slice()).unwrap_or(&[])
    }
}

/// Traffic-visibility class of a rule
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    JsonSchema,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub enum Visibility {
    /// Reachable from outside the cluster
    #[default]
    #[serde(rename = "ExternalIP")]
    ExternalIp,
    /// Reachable only from inside the cluster
    ClusterLocal,
}

impl Visibility {
    /// Wire name of the visibility
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::ExternalIp => "ExternalIP",
            Visibility::ClusterLocal => "ClusterLocal",
        }
    }

    /// Parse a wire name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ExternalIP" => Some(Visibility::ExternalIp),
            "ClusterLocal" => Some(Visibility::ClusterLocal),
            _ => None,
        }
    }

    /// Whether routes of this visibility always accept plaintext traffic.
    ///
    /// Cluster-local traffic is not subject to the HTTPS redirect policy.
    pub fn always_permits_insecure(&self) -> bool {
        matches!(self, Visibility::ClusterLocal)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP routes of a rule
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressRuleValue {
    /// Ordered path routes
    #[serde(default)]
    pub paths: Vec<HttpIngressPath>,
}

/// A single routed path
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
    /// Path prefix to match (empty matches everything)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Additional exact header matches
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, HeaderMatch>,

    /// Host header value sent upstream instead of the requested host
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rewrite_host: String,

    /// Weighted backends
    #[serde(default)]
    pub splits: Vec<IngressBackendSplit>,

    /// Headers added to every request on this path before splitting
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub append_headers: BTreeMap<String, String>,
}

/// Exact-match requirement on a header value
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct HeaderMatch {
    /// Required header value
    pub exact: String,
}

/// A weighted backend of a path
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackendSplit {
    /// Backend service
    #[serde(flatten)]
    pub backend: IngressBackend,

    /// Share of traffic in percent (0-100)
    #[serde(default)]
    pub percent: i32,

    /// Headers added only to requests sent to this backend
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub append_headers: BTreeMap<String, String>,
}

/// Reference to a backend service port
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackend {
    /// Namespace of the service
    #[serde(default)]
    pub service_namespace: String,

    /// Name of the service
    #[serde(default)]
    pub service_name: String,

    /// Port of the service, by number or name
    pub service_port: IntOrString,
}

impl Default for IngressBackend {
    fn default() -> Self {
        Self {
            service_namespace: String::new(),
            service_name: String::new(),
            service_port: IntOrString::Int(0),
        }
    }
}

impl IngressBackend {
    /// Integer value of the port.
    ///
    /// Named ports that are not numeric resolve to 0.
    pub fn port_number(&self) -> i32 {
        match &self.service_port {
            IntOrString::Int(port) => *port,
            IntOrString::String(port) => port.parse().unwrap_or(0),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
