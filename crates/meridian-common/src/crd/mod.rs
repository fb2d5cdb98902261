//! Custom Resource Definitions consumed by Meridian
//!
//! The compiler reads the networking `Ingress` resource; everything it
//! produces lives in the proxy-specific crates.

mod ingress;

pub use ingress::{
    HeaderMatch, HttpIngressPath, HttpIngressRuleValue, HttpOption, Ingress, IngressBackend,
    IngressBackendSplit, IngressRule, IngressSpec, IngressTls, Visibility,
};
