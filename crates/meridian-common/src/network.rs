//! Cluster network naming
//!
//! Hostnames under the cluster domain have several equivalent spellings
//! (`name.ns`, `name.ns.svc`, `name.ns.svc.cluster.local`). Routing has to
//! answer for all of them, so declared hosts are expanded before virtual
//! hosts are generated.

use std::collections::BTreeSet;

/// Cluster domain used when none is configured
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

/// Expand a declared hostname into every equivalent domain form.
///
/// For each of the suffixes `""`, `".{domain}"` and `".svc.{domain}"` that
/// the host carries, the trimmed form is kept if it still contains a dot
/// (i.e. at least `name.namespace`). The result is sorted.
pub fn expanded_hosts(host: &str, cluster_domain: &str) -> BTreeSet<String> {
    let suffixes = [
        String::new(),
        format!(".{}", cluster_domain),
        format!(".svc.{}", cluster_domain),
    ];

    suffixes
        .iter()
        .filter_map(|suffix| {
            if suffix.is_empty() {
                Some(host)
            } else {
                host.strip_suffix(suffix.as_str())
            }
        })
        .filter(|trimmed| trimmed.contains('.'))
        .map(str::to_string)
        .collect()
}

/// Whether a declared host belongs to the cluster's internal domain.
///
/// This is a plain suffix test on the declared host; it is applied before
/// expansion so every expanded form inherits the answer.
pub fn in_cluster_domain(host: &str, cluster_domain: &str) -> bool {
    !cluster_domain.is_empty() && host.ends_with(cluster_domain)
}
