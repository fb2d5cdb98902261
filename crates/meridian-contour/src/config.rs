//! Compiler settings
//!
//! Everything the compiler needs to know about the installation, passed in
//! explicitly as a [`Settings`] value. The two halves are read from the
//! `config-contour` and `config-network` ConfigMaps by the caller's watch
//! machinery; this module only parses their data.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use serde::Deserialize;

use meridian_common::crd::Visibility;
use meridian_common::kube_utils::NamespacedName;
use meridian_common::network::DEFAULT_CLUSTER_DOMAIN;
use meridian_common::{Error, Result, DEFAULT_SYSTEM_NAMESPACE};

/// Name of the ConfigMap holding Contour settings
pub const CONTOUR_CONFIG_NAME: &str = "config-contour";

/// Name of the ConfigMap holding network-wide settings
pub const NETWORK_CONFIG_NAME: &str = "config-network";

const VISIBILITY_KEY: &str = "visibility";
const DEFAULT_TLS_SECRET_KEY: &str = "default-tls-secret";
const TIMEOUT_POLICY_RESPONSE_KEY: &str = "timeout-policy-response";
const TIMEOUT_POLICY_IDLE_KEY: &str = "timeout-policy-idle";
const SYSTEM_INTERNAL_TLS_KEY: &str = "system-internal-tls";
const INTERNAL_ENCRYPTION_KEY: &str = "internal-encryption";

/// Timeout used when none is configured
pub const DEFAULT_TIMEOUT: &str = "infinity";

// =============================================================================
// Settings
// =============================================================================

/// Complete compiler settings
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Contour-specific settings
    pub contour: ContourConfig,
    /// Network-wide settings
    pub network: NetworkConfig,
    /// Cluster DNS domain (e.g., "cluster.local")
    pub cluster_domain: String,
    /// Namespace the networking control plane runs in
    pub system_namespace: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            contour: ContourConfig::default(),
            network: NetworkConfig::default(),
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            system_namespace: DEFAULT_SYSTEM_NAMESPACE.to_string(),
        }
    }
}

impl Settings {
    /// Build settings from the two ConfigMaps, keeping default domain and namespace
    pub fn from_config_maps(contour: &ConfigMap, network: &ConfigMap) -> Result<Self> {
        Ok(Self {
            contour: ContourConfig::from_config_map(contour)?,
            network: NetworkConfig::from_config_map(network)?,
            ..Self::default()
        })
    }

    /// Override the cluster domain
    pub fn with_cluster_domain(mut self, domain: impl Into<String>) -> Self {
        self.cluster_domain = domain.into();
        self
    }

    /// Override the system namespace
    pub fn with_system_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.system_namespace = namespace.into();
        self
    }
}

// =============================================================================
// ContourConfig
// =============================================================================

/// Settings read from `config-contour`
#[derive(Clone, Debug, PartialEq)]
pub struct ContourConfig {
    /// Ingress class per visibility
    pub visibility_classes: BTreeMap<Visibility, String>,
    /// Envoy service fronting each visibility's proxies
    pub visibility_services: BTreeMap<Visibility, NamespacedName>,
    /// Certificate used for hosts without an explicit TLS binding
    pub default_tls_secret: Option<NamespacedName>,
    /// Route response timeout
    pub timeout_policy_response: String,
    /// Route idle timeout
    pub timeout_policy_idle: String,
}

/// One entry of the `visibility` block
#[derive(Deserialize)]
struct VisibilityEntry {
    #[serde(default)]
    class: String,
    #[serde(default)]
    service: String,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            visibility_classes: BTreeMap::from([
                (Visibility::ExternalIp, "contour-external".to_string()),
                (Visibility::ClusterLocal, "contour-internal".to_string()),
            ]),
            visibility_services: BTreeMap::from([
                (
                    Visibility::ExternalIp,
                    NamespacedName::new("contour-external", "envoy"),
                ),
                (
                    Visibility::ClusterLocal,
                    NamespacedName::new("contour-internal", "envoy"),
                ),
            ]),
            default_tls_secret: None,
            timeout_policy_response: DEFAULT_TIMEOUT.to_string(),
            timeout_policy_idle: DEFAULT_TIMEOUT.to_string(),
        }
    }
}

impl ContourConfig {
    /// Parse from a ConfigMap; missing data means defaults
    pub fn from_config_map(cm: &ConfigMap) -> Result<Self> {
        Self::from_data(cm.data.as_ref().unwrap_or(&BTreeMap::new()))
    }

    /// Parse from raw ConfigMap data
    ///
    /// The `visibility` block replaces the default classes entirely:
    ///
    /// ```yaml
    /// visibility: |
    ///   ExternalIP:
    ///     class: contour-external
    ///     service: contour-external/envoy
    ///   ClusterLocal:
    ///     class: contour-internal
    ///     service: contour-internal/envoy
    /// ```
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(block) = data.get(VISIBILITY_KEY) {
            let entries: BTreeMap<String, VisibilityEntry> =
                meridian_common::yaml::from_yaml(block).map_err(|e| {
                    Error::validation_for_field(CONTOUR_CONFIG_NAME, VISIBILITY_KEY, e.to_string())
                })?;

            config.visibility_classes.clear();
            config.visibility_services.clear();
            for (key, entry) in entries {
                let visibility = Visibility::parse(&key).ok_or_else(|| {
                    Error::validation_for_field(
                        CONTOUR_CONFIG_NAME,
                        format!("{}.{}", VISIBILITY_KEY, key),
                        "unknown visibility",
                    )
                })?;
                if entry.class.is_empty() {
                    return Err(Error::validation_for_field(
                        CONTOUR_CONFIG_NAME,
                        format!("{}.{}.class", VISIBILITY_KEY, key),
                        "class must not be empty",
                    ));
                }
                let service = NamespacedName::parse(&entry.service).ok_or_else(|| {
                    Error::validation_for_field(
                        CONTOUR_CONFIG_NAME,
                        format!("{}.{}.service", VISIBILITY_KEY, key),
                        format!("expected namespace/name, got {:?}", entry.service),
                    )
                })?;
                config.visibility_classes.insert(visibility, entry.class);
                config.visibility_services.insert(visibility, service);
            }
        }

        if let Some(secret) = data.get(DEFAULT_TLS_SECRET_KEY) {
            let secret = secret.trim();
            if !secret.is_empty() {
                let parsed = NamespacedName::parse(secret).ok_or_else(|| {
                    Error::validation_for_field(
                        CONTOUR_CONFIG_NAME,
                        DEFAULT_TLS_SECRET_KEY,
                        format!("expected namespace/name, got {:?}", secret),
                    )
                })?;
                config.default_tls_secret = Some(parsed);
            }
        }

        if let Some(timeout) = data.get(TIMEOUT_POLICY_RESPONSE_KEY) {
            config.timeout_policy_response = timeout.trim().to_string();
        }
        if let Some(timeout) = data.get(TIMEOUT_POLICY_IDLE_KEY) {
            config.timeout_policy_idle = timeout.trim().to_string();
        }

        Ok(config)
    }

    /// Ingress class for a visibility; empty when the visibility is not configured
    pub fn class_for(&self, visibility: Visibility) -> &str {
        self.visibility_classes
            .get(&visibility)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

// =============================================================================
// NetworkConfig
// =============================================================================

/// Settings read from `config-network`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkConfig {
    /// Whether east-west traffic to backends is encrypted
    pub internal_encryption: bool,
}

impl NetworkConfig {
    /// Parse from a ConfigMap; missing data means defaults
    pub fn from_config_map(cm: &ConfigMap) -> Result<Self> {
        Self::from_data(cm.data.as_ref().unwrap_or(&BTreeMap::new()))
    }

    /// Parse from raw ConfigMap data
    ///
    /// `system-internal-tls` (`Enabled` / `Disabled`) wins over the legacy
    /// `internal-encryption` (`true` / `false`) key.
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self> {
        if let Some(value) = data.get(SYSTEM_INTERNAL_TLS_KEY) {
            let internal_encryption = match value.trim().to_ascii_lowercase().as_str() {
                "enabled" => true,
                "disabled" | "" => false,
                other => {
                    return Err(Error::validation_for_field(
                        NETWORK_CONFIG_NAME,
                        SYSTEM_INTERNAL_TLS_KEY,
                        format!("expected Enabled or Disabled, got {:?}", other),
                    ))
                }
            };
            return Ok(Self {
                internal_encryption,
            });
        }

        if let Some(value) = data.get(INTERNAL_ENCRYPTION_KEY) {
            let internal_encryption = match value.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" | "" => false,
                other => {
                    return Err(Error::validation_for_field(
                        NETWORK_CONFIG_NAME,
                        INTERNAL_ENCRYPTION_KEY,
                        format!("expected true or false, got {:?}", other),
                    ))
                }
            };
            return Ok(Self {
                internal_encryption,
            });
        }

        Ok(Self::default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn data(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_config_map_yields_defaults() {
        let config = ContourConfig::from_config_map(&ConfigMap::default()).unwrap();
        assert_eq!(config, ContourConfig::default());
        assert_eq!(config.class_for(Visibility::ExternalIp), "contour-external");
        assert_eq!(config.class_for(Visibility::ClusterLocal), "contour-internal");
        assert_eq!(config.timeout_policy_response, "infinity");
        assert_eq!(config.timeout_policy_idle, "infinity");
        assert!(config.default_tls_secret.is_none());
    }

    #[test]
    fn parses_visibility_block() {
        let config = ContourConfig::from_data(&data(&[(
            "visibility",
            "ExternalIP:\n  class: public\n  service: edge/envoy\nClusterLocal:\n  class: private\n  service: mesh/envoy\n",
        )]))
        .unwrap();
        assert_eq!(config.class_for(Visibility::ExternalIp), "public");
        assert_eq!(config.class_for(Visibility::ClusterLocal), "private");
        assert_eq!(
            config.visibility_services[&Visibility::ClusterLocal],
            NamespacedName::new("mesh", "envoy")
        );
    }

    #[test]
    fn partial_visibility_block_leaves_other_class_unset() {
        let config = ContourConfig::from_data(&data(&[(
            "visibility",
            "ExternalIP:\n  class: public\n  service: edge/envoy\n",
        )]))
        .unwrap();
        assert_eq!(config.class_for(Visibility::ExternalIp), "public");
        assert_eq!(config.class_for(Visibility::ClusterLocal), "");
    }

    #[test]
    fn rejects_unknown_visibility() {
        let err = ContourConfig::from_data(&data(&[(
            "visibility",
            "Public:\n  class: x\n  service: a/b\n",
        )]))
        .unwrap_err();
        assert_eq!(err.field(), Some("visibility.Public"));
    }

    #[test]
    fn rejects_missing_class_and_bad_service() {
        let err = ContourConfig::from_data(&data(&[(
            "visibility",
            "ExternalIP:\n  service: a/b\n",
        )]))
        .unwrap_err();
        assert_eq!(err.field(), Some("visibility.ExternalIP.class"));

        let err = ContourConfig::from_data(&data(&[(
            "visibility",
            "ExternalIP:\n  class: x\n  service: envoy\n",
        )]))
        .unwrap_err();
        assert_eq!(err.field(), Some("visibility.ExternalIP.service"));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = ContourConfig::from_data(&data(&[("visibility", "ExternalIP: [")])).unwrap_err();
        assert_eq!(err.resource(), Some(CONTOUR_CONFIG_NAME));
    }

    #[test]
    fn parses_default_tls_secret_and_timeouts() {
        let config = ContourConfig::from_data(&data(&[
            ("default-tls-secret", "knative-serving/wildcard-cert"),
            ("timeout-policy-response", "60s"),
            ("timeout-policy-idle", " 5m "),
        ]))
        .unwrap();
        assert_eq!(
            config.default_tls_secret,
            Some(NamespacedName::new("knative-serving", "wildcard-cert"))
        );
        assert_eq!(config.timeout_policy_response, "60s");
        assert_eq!(config.timeout_policy_idle, "5m");
    }

    #[test]
    fn rejects_default_tls_secret_without_namespace() {
        let err =
            ContourConfig::from_data(&data(&[("default-tls-secret", "wildcard-cert")])).unwrap_err();
        assert_eq!(err.field(), Some("default-tls-secret"));
    }

    #[test]
    fn blank_default_tls_secret_is_ignored() {
        let config = ContourConfig::from_data(&data(&[("default-tls-secret", "  ")])).unwrap();
        assert!(config.default_tls_secret.is_none());
    }

    #[test]
    fn network_config_reads_system_internal_tls() {
        let config = NetworkConfig::from_data(&data(&[("system-internal-tls", "Enabled")])).unwrap();
        assert!(config.internal_encryption);

        let config = NetworkConfig::from_data(&data(&[
            ("system-internal-tls", "Disabled"),
            ("internal-encryption", "true"),
        ]))
        .unwrap();
        assert!(!config.internal_encryption);
    }

    #[test]
    fn network_config_reads_legacy_key() {
        let config = NetworkConfig::from_data(&data(&[("internal-encryption", "true")])).unwrap();
        assert!(config.internal_encryption);
        assert!(!NetworkConfig::from_data(&data(&[])).unwrap().internal_encryption);
    }

    #[test]
    fn network_config_rejects_garbage() {
        assert!(NetworkConfig::from_data(&data(&[("internal-encryption", "yes")])).is_err());
        assert!(NetworkConfig::from_data(&data(&[("system-internal-tls", "on")])).is_err());
    }

    #[test]
    fn settings_from_config_maps() {
        let contour = ConfigMap {
            data: Some(data(&[("timeout-policy-idle", "30s")])),
            ..Default::default()
        };
        let network = ConfigMap {
            data: Some(data(&[("internal-encryption", "true")])),
            ..Default::default()
        };
        let settings = Settings::from_config_maps(&contour, &network)
            .unwrap()
            .with_cluster_domain("corp.internal")
            .with_system_namespace("networking");
        assert_eq!(settings.contour.timeout_policy_idle, "30s");
        assert!(settings.network.internal_encryption);
        assert_eq!(settings.cluster_domain, "corp.internal");
        assert_eq!(settings.system_namespace, "networking");
    }
}
