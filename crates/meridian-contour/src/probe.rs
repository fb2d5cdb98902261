//! Readiness probe insertion
//!
//! Before compilation every path is tagged with a hash of the Ingress spec so
//! that a prober can tell which generation of the configuration a proxy is
//! serving. For each path with backends, a probe route is added in front of it
//! that matches only requests carrying the override header value.
//!
//! This runs on a private copy ([`prepare`]); the compiler never sees the
//! caller's object.

use kube::ResourceExt;

use meridian_common::crd::{HeaderMatch, Ingress};
use meridian_common::kube_utils::sha256_hex;
use meridian_common::{Error, Result, NETWORK_HASH_HEADER, NETWORK_HASH_OVERRIDE};

/// Copy the Ingress and insert probe routes into the copy.
///
/// Returns the probed copy and the hash its paths carry.
pub fn prepare(ing: &Ingress) -> Result<(Ingress, String)> {
    let mut probed = ing.clone();
    let hash = insert_probe(&mut probed)?;
    Ok((probed, hash))
}

/// Hash of an Ingress spec: lowercase hex SHA-256 of its JSON form.
pub fn compute_hash(ing: &Ingress) -> Result<String> {
    let bytes = serde_json::to_vec(&ing.spec)
        .map_err(|e| Error::serialization_for_kind("Ingress", e.to_string()))?;
    Ok(sha256_hex(&bytes))
}

/// Insert probe routes in place and return the hash they carry.
///
/// Every rule must have an HTTP block; the Ingress is left untouched when
/// one does not.
pub fn insert_probe(ing: &mut Ingress) -> Result<String> {
    if let Some(index) = ing.spec.rules.iter().position(|r| r.http.is_none()) {
        return Err(Error::validation_for_field(
            resource_key(ing),
            format!("spec.rules[{}].http", index),
            "rule is missing HTTP block",
        ));
    }

    let hash = compute_hash(ing)?;

    for http in ing.spec.rules.iter_mut().filter_map(|r| r.http.as_mut()) {
        let mut paths = Vec::with_capacity(http.paths.len() * 2);

        for path in &mut http.paths {
            path.append_headers
                .insert(NETWORK_HASH_HEADER.to_string(), hash.clone());

            if path.splits.is_empty() {
                continue;
            }
            let mut probe = path.clone();
            probe.headers.insert(
                NETWORK_HASH_HEADER.to_string(),
                HeaderMatch {
                    exact: NETWORK_HASH_OVERRIDE.to_string(),
                },
            );
            paths.push(probe);
        }

        paths.append(&mut http.paths);
        http.paths = paths;
    }

    Ok(hash)
}

fn resource_key(ing: &Ingress) -> String {
    format!(
        "{}/{}",
        ing.namespace().unwrap_or_default(),
        ing.name_any()
    )
}
