//! Backend service inventory
//!
//! Summarises which backend services an Ingress references and how: the
//! visibilities that reach each one, its port, and whether the Host header
//! sent to it is rewritten. Callers use this to find the endpoints to probe
//! and the services whose protocol has to be inspected.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use meridian_common::crd::{Ingress, Visibility};

/// How an Ingress references one backend service
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceInfo {
    /// Port of the first split seen for this service
    pub port: IntOrString,
    /// Every visibility whose rules route to this service
    pub visibilities: BTreeSet<Visibility>,
    /// Whether any path routing to this service has a non-empty prefix
    pub has_path: bool,
    /// Host header value sent to this service; the last path processed wins
    pub rewrite_host: String,
}

impl ServiceInfo {
    /// Visibilities in sorted order
    pub fn visibilities(&self) -> Vec<Visibility> {
        self.visibilities.iter().copied().collect()
    }
}

/// Collect the backend services referenced by an Ingress, keyed by name.
pub fn service_names(ing: &Ingress) -> BTreeMap<String, ServiceInfo> {
    let mut services: BTreeMap<String, ServiceInfo> = BTreeMap::new();

    for rule in &ing.spec.rules {
        for path in rule.paths() {
            for split in &path.splits {
                let info = services
                    .entry(split.backend.service_name.clone())
                    .or_insert_with(|| ServiceInfo {
                        port: split.backend.service_port.clone(),
                        visibilities: BTreeSet::new(),
                        has_path: false,
                        rewrite_host: String::new(),
                    });
                info.visibilities.insert(rule.visibility);
                info.has_path |= !path.path.is_empty();
                info.rewrite_host = path.rewrite_host.clone();
            }
        }
    }

    services
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::crd::{
        HttpIngressPath, HttpIngressRuleValue, IngressBackend, IngressBackendSplit, IngressRule,
        IngressSpec,
    };

    fn split(service: &str, port: i32) -> IngressBackendSplit {
        IngressBackendSplit {
            backend: IngressBackend {
                service_namespace: "default".to_string(),
                service_name: service.to_string(),
                service_port: IntOrString::Int(port),
            },
            percent: 100,
            ..Default::default()
        }
    }

    fn path(prefix: &str, rewrite_host: &str, splits: Vec<IngressBackendSplit>) -> HttpIngressPath {
        HttpIngressPath {
            path: prefix.to_string(),
            rewrite_host: rewrite_host.to_string(),
            splits,
            ..Default::default()
        }
    }

    fn rule(visibility: Visibility, paths: Vec<HttpIngressPath>) -> IngressRule {
        IngressRule {
            hosts: vec!["hello.example.com".to_string()],
            visibility,
            http: Some(HttpIngressRuleValue { paths }),
        }
    }

    fn ingress(rules: Vec<IngressRule>) -> Ingress {
        Ingress::new(
            "hello",
            IngressSpec {
                rules,
                ..Default::default()
            },
        )
    }

    #[test]
    fn empty_ingress_has_no_services() {
        assert!(service_names(&ingress(vec![])).is_empty());
    }

    #[test]
    fn rule_without_http_block_is_skipped() {
        let ing = ingress(vec![IngressRule {
            hosts: vec!["a.b".to_string()],
            visibility: Visibility::ExternalIp,
            http: None,
        }]);
        assert!(service_names(&ing).is_empty());
    }

    #[test]
    fn visibilities_are_unioned_across_rules() {
        let ing = ingress(vec![
            rule(
                Visibility::ExternalIp,
                vec![path("", "", vec![split("hello", 80)])],
            ),
            rule(
                Visibility::ClusterLocal,
                vec![path("", "", vec![split("hello", 80), split("other", 8080)])],
            ),
        ]);

        let services = service_names(&ing);
        assert_eq!(services.len(), 2);
        assert_eq!(
            services["hello"].visibilities(),
            vec![Visibility::ExternalIp, Visibility::ClusterLocal]
        );
        assert_eq!(services["other"].visibilities(), vec![Visibility::ClusterLocal]);
        assert_eq!(services["other"].port, IntOrString::Int(8080));
    }

    #[test]
    fn has_path_is_sticky() {
        let ing = ingress(vec![rule(
            Visibility::ExternalIp,
            vec![
                path("/api", "", vec![split("hello", 80)]),
                path("", "", vec![split("hello", 80)]),
            ],
        )]);
        assert!(service_names(&ing)["hello"].has_path);

        let ing = ingress(vec![rule(
            Visibility::ExternalIp,
            vec![path("", "", vec![split("hello", 80)])],
        )]);
        assert!(!service_names(&ing)["hello"].has_path);
    }

    #[test]
    fn rewrite_host_last_write_wins() {
        let ing = ingress(vec![rule(
            Visibility::ExternalIp,
            vec![
                path("/a", "first.example.com", vec![split("hello", 80)]),
                path("/b", "second.example.com", vec![split("hello", 80)]),
            ],
        )]);
        assert_eq!(service_names(&ing)["hello"].rewrite_host, "second.example.com");
    }

    #[test]
    fn port_comes_from_first_split() {
        let ing = ingress(vec![rule(
            Visibility::ExternalIp,
            vec![
                path("", "", vec![split("hello", 80)]),
                path("/x", "", vec![split("hello", 81)]),
            ],
        )]);
        assert_eq!(service_names(&ing)["hello"].port, IntOrString::Int(80));
    }
}
