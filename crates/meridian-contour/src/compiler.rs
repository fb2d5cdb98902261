//! HTTPProxy compilation from Ingress specs
//!
//! Maps each rule of an Ingress to one HTTPProxy per expanded host. Routes are
//! built once per rule and shared by all of its hosts; only the virtual host,
//! name, class and TLS binding differ between the copies.
//!
//! The compiler is a pure function of the Ingress, the backend protocol map
//! and the [`Settings`]. Probe routes are expected to be inserted beforehand
//! (see [`crate::probe::prepare`]); [`make_http_proxies`] runs both steps.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use tracing::{debug, trace, warn};

use meridian_common::crd::{HttpIngressPath, HttpOption, Ingress, IngressTls, Visibility};
use meridian_common::kube_utils::{child_name, domain_hash};
use meridian_common::network::{expanded_hosts, in_cluster_domain};
use meridian_common::{Result, ORIGINAL_HOST_HEADER};

use crate::config::Settings;
use crate::httpproxy::{
    AuthorizationServer, BackendProtocol, ExtensionServiceReference, HeaderValue, HeadersPolicy,
    HttpProxy, HttpProxySpec, MatchCondition, RetryOn, RetryPolicy, Route, Service, TimeoutPolicy,
    TlsConfig, UpstreamValidation, VirtualHost,
};
use crate::{
    CLASS_KEY, DOMAIN_HASH_KEY, EXTENSION_SERVICE_KEY, EXTENSION_SERVICE_NAMESPACE_KEY,
    GENERATION_KEY, HTTP_CHALLENGE_PATH, PARENT_KEY, SERVING_INTERNAL_CERT_NAME,
    UPSTREAM_SUBJECT_NAME,
};

/// Number of retries on connection-level failures
const DEFAULT_RETRY_COUNT: i64 = 2;

/// Insert probe routes into a copy of the Ingress, then compile it.
pub fn make_http_proxies(
    ing: &Ingress,
    service_protocols: &BTreeMap<String, BackendProtocol>,
    settings: &Settings,
) -> Result<Vec<HttpProxy>> {
    let (probed, _hash) = crate::probe::prepare(ing)?;
    Ok(HttpProxyCompiler::new(settings, service_protocols).compile(&probed))
}

/// Compiler for HTTPProxy resources
pub struct HttpProxyCompiler<'a> {
    settings: &'a Settings,
    service_protocols: &'a BTreeMap<String, BackendProtocol>,
}

impl<'a> HttpProxyCompiler<'a> {
    /// Create a compiler.
    ///
    /// `service_protocols` maps backend service names to the wire protocol
    /// their port speaks; services missing from the map get no override.
    pub fn new(
        settings: &'a Settings,
        service_protocols: &'a BTreeMap<String, BackendProtocol>,
    ) -> Self {
        Self {
            settings,
            service_protocols,
        }
    }

    /// Compile an Ingress into HTTPProxies, in rule, host, expanded-host order.
    pub fn compile(&self, ing: &Ingress) -> Vec<HttpProxy> {
        let name = ing.name_any();
        let namespace = ing.namespace().unwrap_or_default();

        let host_to_tls: BTreeMap<&str, &IngressTls> = ing
            .spec
            .tls
            .iter()
            .flat_map(|tls| tls.hosts.iter().map(move |host| (host.as_str(), tls)))
            .collect();

        let allow_insecure = matches!(ing.spec.http_option, Some(HttpOption::Enabled));

        let mut proxies = Vec::new();
        for rule in &ing.spec.rules {
            let Some(http) = rule.http.as_ref() else {
                warn!(
                    ingress = %name,
                    namespace = %namespace,
                    visibility = %rule.visibility,
                    "rule has no HTTP block, skipping"
                );
                continue;
            };

            let class = self.class_for(rule.visibility);
            let permit_insecure = allow_insecure || rule.visibility.always_permits_insecure();
            let routes = http
                .paths
                .iter()
                .map(|path| self.compile_route(path, permit_insecure))
                .collect();

            let base = HttpProxy {
                metadata: ObjectMeta {
                    namespace: Some(namespace.clone()),
                    labels: Some(BTreeMap::from([
                        (
                            GENERATION_KEY.to_string(),
                            ing.metadata.generation.unwrap_or_default().to_string(),
                        ),
                        (PARENT_KEY.to_string(), name.clone()),
                        (CLASS_KEY.to_string(), class.to_string()),
                    ])),
                    annotations: Some(BTreeMap::from([(
                        CLASS_KEY.to_string(),
                        class.to_string(),
                    )])),
                    owner_references: owner_reference(ing).map(|r| vec![r]),
                    ..Default::default()
                },
                spec: HttpProxySpec {
                    virtualhost: None,
                    routes,
                },
            };

            for original_host in &rule.hosts {
                for host in expanded_hosts(original_host, &self.settings.cluster_domain) {
                    let mut proxy = base.clone();

                    let class = if in_cluster_domain(original_host, &self.settings.cluster_domain)
                    {
                        let local = self.class_for(Visibility::ClusterLocal);
                        proxy.labels_mut().insert(CLASS_KEY.to_string(), local.to_string());
                        proxy
                            .annotations_mut()
                            .insert(CLASS_KEY.to_string(), local.to_string());
                        local
                    } else {
                        class
                    };

                    proxy.metadata.name =
                        Some(child_name(&format!("{}-{}-", name, class), &host));
                    proxy
                        .labels_mut()
                        .insert(DOMAIN_HASH_KEY.to_string(), domain_hash(&host));

                    proxy.spec.virtualhost = Some(VirtualHost {
                        tls: self.tls_for(&host, &host_to_tls),
                        authorization: authorization(ing),
                        fqdn: host,
                    });

                    trace!(
                        proxy = proxy.metadata.name.as_deref().unwrap_or_default(),
                        class = class,
                        "compiled HTTPProxy"
                    );
                    proxies.push(proxy);
                }
            }
        }

        debug!(
            ingress = %name,
            namespace = %namespace,
            proxies = proxies.len(),
            "compiled HTTPProxies"
        );
        proxies
    }

    fn class_for(&self, visibility: Visibility) -> &'a str {
        let class = self.settings.contour.class_for(visibility);
        if class.is_empty() {
            warn!(visibility = %visibility, "no ingress class configured for visibility");
        }
        class
    }

    fn compile_route(&self, path: &HttpIngressPath, permit_insecure: bool) -> Route {
        let challenge = path.path.contains(HTTP_CHALLENGE_PATH);

        let services = path
            .splits
            .iter()
            .map(|split| {
                let mut service = Service {
                    name: split.backend.service_name.clone(),
                    port: split.backend.port_number(),
                    protocol: None,
                    weight: i64::from(split.percent),
                    validation: None,
                    request_headers_policy: headers_policy(&split.append_headers),
                };

                if let Some(protocol) = self.service_protocols.get(&split.backend.service_name) {
                    // Domain mappings rewrite the host and re-enter the proxy,
                    // so that hop must stay cleartext.
                    let domain_mapping = !path.rewrite_host.is_empty()
                        && split.append_headers.contains_key(ORIGINAL_HOST_HEADER);
                    service.protocol = Some(if domain_mapping {
                        BackendProtocol::H2c
                    } else {
                        *protocol
                    });
                }

                if self.settings.network.internal_encryption {
                    service.validation = Some(UpstreamValidation {
                        ca_secret: format!(
                            "{}/{}",
                            self.settings.system_namespace, SERVING_INTERNAL_CERT_NAME
                        ),
                        subject_name: UPSTREAM_SUBJECT_NAME.to_string(),
                    });
                }

                if challenge {
                    service.protocol = None;
                    service.validation = None;
                }

                service
            })
            .collect();

        let mut set: Vec<HeaderValue> = path
            .append_headers
            .iter()
            .map(|(name, value)| HeaderValue {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        if !path.rewrite_host.is_empty() {
            set.push(HeaderValue {
                name: "Host".to_string(),
                value: path.rewrite_host.clone(),
            });
        }
        set.sort_by(|a, b| a.name.cmp(&b.name));

        Route {
            conditions: match_conditions(path),
            services,
            enable_websockets: true,
            permit_insecure,
            timeout_policy: Some(TimeoutPolicy {
                response: self.settings.contour.timeout_policy_response.clone(),
                idle: self.settings.contour.timeout_policy_idle.clone(),
            }),
            retry_policy: Some(default_retry_policy()),
            request_headers_policy: Some(HeadersPolicy { set }),
        }
    }

    fn tls_for(&self, host: &str, host_to_tls: &BTreeMap<&str, &IngressTls>) -> Option<TlsConfig> {
        if let Some(tls) = host_to_tls.get(host) {
            return Some(TlsConfig {
                secret_name: format!("{}/{}", tls.secret_namespace, tls.secret_name),
            });
        }
        self.settings
            .contour
            .default_tls_secret
            .as_ref()
            .map(|secret| TlsConfig {
                secret_name: secret.to_string(),
            })
    }
}

/// Retry twice on connection-level failures and resets.
pub fn default_retry_policy() -> RetryPolicy {
    RetryPolicy {
        count: DEFAULT_RETRY_COUNT,
        retry_on: vec![
            RetryOn::Cancelled,
            RetryOn::ConnectFailure,
            RetryOn::RefusedStream,
            RetryOn::ResourceExhausted,
            RetryOn::RetriableStatusCodes,
            RetryOn::Reset,
        ],
    }
}

/// Prefix condition first, then header conditions by descending name.
fn match_conditions(path: &HttpIngressPath) -> Vec<MatchCondition> {
    let mut conditions = Vec::with_capacity(path.headers.len() + 1);
    if !path.path.is_empty() {
        conditions.push(MatchCondition::prefix(path.path.clone()));
    }
    conditions.extend(
        path.headers
            .iter()
            .rev()
            .map(|(name, matcher)| MatchCondition::header(name.clone(), matcher.exact.clone())),
    );
    conditions
}

/// Sorted header policy, or `None` when there is nothing to set
fn headers_policy(headers: &BTreeMap<String, String>) -> Option<HeadersPolicy> {
    if headers.is_empty() {
        return None;
    }
    Some(HeadersPolicy {
        set: headers
            .iter()
            .map(|(name, value)| HeaderValue {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
    })
}

fn authorization(ing: &Ingress) -> Option<AuthorizationServer> {
    let annotations = ing.annotations();
    let name = annotations.get(EXTENSION_SERVICE_KEY)?;
    Some(AuthorizationServer {
        extension_ref: ExtensionServiceReference {
            namespace: annotations.get(EXTENSION_SERVICE_NAMESPACE_KEY).cloned(),
            name: name.clone(),
        },
    })
}

fn owner_reference(ing: &Ingress) -> Option<OwnerReference> {
    let mut owner = ing.controller_owner_ref(&())?;
    owner.block_owner_deletion = Some(true);
    Some(owner)
}
