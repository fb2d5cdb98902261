//! Contour HTTPProxy compiler for Meridian ingresses
//!
//! Compiles `Ingress` specs into Contour `HTTPProxy` resources.
//! Pure compilation crate: no controller logic, no API calls.

pub mod compiler;
pub mod config;
pub mod httpproxy;
pub mod probe;
pub mod services;

pub use compiler::{default_retry_policy, make_http_proxies, HttpProxyCompiler};
pub use config::{ContourConfig, NetworkConfig, Settings};
pub use httpproxy::{BackendProtocol, HttpProxy, HttpProxySpec};
pub use services::{service_names, ServiceInfo};

/// Label carrying the generation of the source Ingress
pub const GENERATION_KEY: &str = "contour.networking.knative.dev/generation";

/// Label carrying the name of the source Ingress
pub const PARENT_KEY: &str = "contour.networking.knative.dev/parent";

/// Label carrying the SHA-1 of the proxy's virtual host
pub const DOMAIN_HASH_KEY: &str = "contour.networking.knative.dev/domainHash";

/// Label and annotation selecting the Contour instance that serves a proxy
pub const CLASS_KEY: &str = "projectcontour.io/ingress.class";

/// Ingress annotation naming the ExtensionService used for authorization
pub const EXTENSION_SERVICE_KEY: &str = "contour.networking.knative.dev/extension-service";

/// Ingress annotation naming the ExtensionService's namespace
pub const EXTENSION_SERVICE_NAMESPACE_KEY: &str =
    "contour.networking.knative.dev/extension-service-namespace";

/// Path prefix of ACME HTTP-01 challenges
pub const HTTP_CHALLENGE_PATH: &str = "/.well-known/acme-challenge";

/// Secret in the system namespace holding the internal serving CA
pub const SERVING_INTERNAL_CERT_NAME: &str = "routing-serving-certs";

/// Subject name expected on internally encrypted upstreams
pub const UPSTREAM_SUBJECT_NAME: &str = "data-plane.knative.dev";
