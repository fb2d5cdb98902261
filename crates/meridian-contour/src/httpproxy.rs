//! Contour HTTPProxy serialization types
//!
//! Typed representation of `projectcontour.io/v1` HTTPProxy resources,
//! limited to the fields the compiler sets. Field names follow Contour's
//! schema so the output can be applied with server-side apply as-is.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Spec for an HTTPProxy: one virtual host and its routes
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "projectcontour.io",
    version = "v1",
    kind = "HTTPProxy",
    root = "HttpProxy",
    plural = "httpproxies",
    shortname = "proxy",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxySpec {
    /// Virtual host binding (set per expanded host)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtualhost: Option<VirtualHost>,

    /// Ordered routes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

/// Binding of a fully-qualified domain name to the proxy
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    /// Fully-qualified domain name
    pub fqdn: String,

    /// TLS termination; absent means plaintext only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    /// External authorization server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationServer>,
}

/// TLS termination settings of a virtual host
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Certificate secret as `namespace/name`
    pub secret_name: String,
}

/// External authorization configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationServer {
    /// Extension service performing the authorization
    pub extension_ref: ExtensionServiceReference,
}

/// Reference to a Contour ExtensionService
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionServiceReference {
    /// Namespace of the extension service (defaults to the proxy's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name of the extension service
    pub name: String,
}

/// A route: match conditions plus weighted upstream services
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<MatchCondition>,

    #[serde(default)]
    pub services: Vec<Service>,

    #[serde(default)]
    pub enable_websockets: bool,

    #[serde(default)]
    pub permit_insecure: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_policy: Option<TimeoutPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,

    /// Headers set before the request is split across services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers_policy: Option<HeadersPolicy>,
}

/// A single match predicate; exactly one of the fields is set
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderMatchCondition>,
}

impl MatchCondition {
    /// Path prefix condition
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            header: None,
        }
    }

    /// Exact header value condition
    pub fn header(name: impl Into<String>, exact: impl Into<String>) -> Self {
        Self {
            prefix: None,
            header: Some(HeaderMatchCondition {
                name: name.into(),
                exact: exact.into(),
            }),
        }
    }

    /// Whether this is a non-empty prefix condition
    pub fn has_prefix(&self) -> bool {
        self.prefix.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Header name, if this is a header condition
    pub fn header_name(&self) -> Option<&str> {
        self.header.as_ref().map(|h| h.name.as_str())
    }
}

/// Exact match on a request header
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeaderMatchCondition {
    pub name: String,
    pub exact: String,
}

/// Upstream service of a route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,

    pub port: i32,

    /// Wire protocol towards the backend; absent means HTTP/1.1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<BackendProtocol>,

    pub weight: i64,

    /// Certificate validation of an encrypted upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<UpstreamValidation>,

    /// Headers set only on requests sent to this service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers_policy: Option<HeadersPolicy>,
}

/// Backend wire protocol override
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProtocol {
    /// HTTP/2 over TLS
    H2,
    /// Cleartext HTTP/2
    H2c,
    /// HTTP/1.1 over TLS
    Tls,
}

/// Expected identity of an encrypted upstream
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamValidation {
    /// CA bundle secret as `namespace/name`
    pub ca_secret: String,
    /// Subject name the upstream certificate must carry
    pub subject_name: String,
}

/// Response and idle timeouts, as Contour duration strings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutPolicy {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub idle: String,
}

/// Retry behaviour of a route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of retries
    pub count: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retry_on: Vec<RetryOn>,
}

/// Condition that triggers a retry
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RetryOn {
    Cancelled,
    ConnectFailure,
    RefusedStream,
    ResourceExhausted,
    RetriableStatusCodes,
    Reset,
}

/// Header mutations
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeadersPolicy {
    /// Headers to set, sorted by name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set: Vec<HeaderValue>,
}

/// A header name/value pair
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct HeaderValue {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_contour_field_names() {
        let route = Route {
            conditions: vec![MatchCondition::prefix("/api")],
            services: vec![Service {
                name: "hello".to_string(),
                port: 80,
                protocol: Some(BackendProtocol::H2c),
                weight: 100,
                validation: Some(UpstreamValidation {
                    ca_secret: "knative-serving/routing-serving-certs".to_string(),
                    subject_name: "data-plane.knative.dev".to_string(),
                }),
                request_headers_policy: None,
            }],
            enable_websockets: true,
            permit_insecure: false,
            timeout_policy: None,
            retry_policy: Some(RetryPolicy {
                count: 2,
                retry_on: vec![RetryOn::ConnectFailure, RetryOn::RetriableStatusCodes],
            }),
            request_headers_policy: None,
        };

        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["conditions"][0]["prefix"], "/api");
        assert_eq!(json["enableWebsockets"], true);
        assert_eq!(json["permitInsecure"], false);
        assert_eq!(json["retryPolicy"]["count"], 2);
        assert_eq!(json["retryPolicy"]["retryOn"][0], "connect-failure");
        assert_eq!(json["retryPolicy"]["retryOn"][1], "retriable-status-codes");
        assert_eq!(json["services"][0]["protocol"], "h2c");
        assert_eq!(json["services"][0]["validation"]["caSecret"], "knative-serving/routing-serving-certs");
        assert!(json["services"][0].get("requestHeadersPolicy").is_none());
        assert!(json.get("timeoutPolicy").is_none());
    }

    #[test]
    fn http_proxy_carries_api_version_and_kind() {
        let proxy = HttpProxy::new(
            "hello",
            HttpProxySpec {
                virtualhost: Some(VirtualHost {
                    fqdn: "hello.example.com".to_string(),
                    ..Default::default()
                }),
                routes: vec![],
            },
        );
        let json = serde_json::to_value(&proxy).unwrap();
        assert_eq!(json["apiVersion"], "projectcontour.io/v1");
        assert_eq!(json["kind"], "HTTPProxy");
        assert_eq!(json["spec"]["virtualhost"]["fqdn"], "hello.example.com");
    }

    #[test]
    fn match_condition_helpers() {
        assert!(MatchCondition::prefix("/a").has_prefix());
        assert!(!MatchCondition::prefix("").has_prefix());
        let header = MatchCondition::header("x-user", "alice");
        assert!(!header.has_prefix());
        assert_eq!(header.header_name(), Some("x-user"));
    }
}
