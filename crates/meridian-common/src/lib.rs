//! Common types for Meridian: the Ingress CRD, errors, and naming utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod network;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the networking control plane runs in by default
pub const DEFAULT_SYSTEM_NAMESPACE: &str = "knative-serving";

/// Header carrying the caller's original Host when a domain mapping rewrites it
pub const ORIGINAL_HOST_HEADER: &str = "K-Original-Host";

/// Header carrying the ingress hash used by readiness probes
pub const NETWORK_HASH_HEADER: &str = "K-Network-Hash";

/// Header value that asks the proxy to answer a probe with its current hash
pub const NETWORK_HASH_OVERRIDE: &str = "override";
