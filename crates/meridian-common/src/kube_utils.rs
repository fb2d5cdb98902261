//! Kubernetes naming and hashing utilities
//!
//! Generated resources need names that are stable across reconciliations and
//! fit the 63-character limit, plus compact digests usable as label values.
//! All digests go through `aws_lc_rs` so the output is stable across Rust
//! toolchain versions (`DefaultHasher` makes no such promise).

use std::fmt;

use aws_lc_rs::digest;

/// Longest name accepted for a child resource
pub const MAX_NAME_LEN: usize = 63;

/// Length of the hex digest spliced into names that are too long
const NAME_DIGEST_LEN: usize = 32;

// =============================================================================
// Names
// =============================================================================

/// Build a deterministic child resource name from a parent name and suffix.
///
/// Returns `parent + suffix` when that fits in [`MAX_NAME_LEN`]. Otherwise
/// the parent is shortened and a 32-char digest spliced in so the result is
/// at most 63 chars and still unique per `(parent, suffix)`:
/// - if the suffix leaves room, `head(parent) + digest(parent) + suffix`
/// - if not, `head(parent) + digest(parent + suffix) + head(suffix)` with any
///   trailing `-` trimmed
pub fn child_name(parent: &str, suffix: &str) -> String {
    if parent.len() + suffix.len() <= MAX_NAME_LEN {
        return format!("{}{}", parent, suffix);
    }

    let room = MAX_NAME_LEN as isize - suffix.len() as isize - NAME_DIGEST_LEN as isize;
    if room > 0 {
        return format!(
            "{}{}{}",
            head(parent, room as usize),
            name_digest(parent),
            suffix
        );
    }

    let mut name = format!(
        "{}{}",
        head(parent, MAX_NAME_LEN - NAME_DIGEST_LEN),
        name_digest(&format!("{}{}", parent, suffix))
    );
    if name.len() < MAX_NAME_LEN {
        let pad = MAX_NAME_LEN - name.len();
        name.push_str(head(suffix, pad));
    }
    name.trim_end_matches('-').to_string()
}

/// Non-reversible digest of a hostname, used as a label value.
///
/// Lowercase hex SHA-1 (40 chars). The digest only has to be a compact,
/// label-safe index key, so the legacy algorithm is acceptable here.
pub fn domain_hash(host: &str) -> String {
    let hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, host.as_bytes());
    to_hex(hash.as_ref())
}

/// Lowercase hex SHA-256 of arbitrary bytes (64 chars).
pub fn sha256_hex(input: &[u8]) -> String {
    let hash = digest::digest(&digest::SHA256, input);
    to_hex(hash.as_ref())
}

fn name_digest(input: &str) -> String {
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    to_hex(&hash.as_ref()[..NAME_DIGEST_LEN / 2])
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
}

/// Longest prefix of `s` no longer than `len` bytes, on a char boundary.
fn head(s: &str, len: usize) -> &str {
    let mut end = len.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// =============================================================================
// NamespacedName
// =============================================================================

/// A `namespace/name` reference to a namespaced object
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespacedName {
    /// Object namespace
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl NamespacedName {
    /// Create a new reference
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a `namespace/name` key. Both parts must be non-empty.
    pub fn parse(key: &str) -> Option<Self> {
        let (namespace, name) = key.split_once('/')?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_concatenated() {
        assert_eq!(
            child_name("hello-contour-external-", "hello.default.example.com"),
            "hello-contour-external-hello.default.example.com"
        );
    }

    #[test]
    fn long_parent_is_shortened_with_digest() {
        let parent = "a".repeat(60);
        let name = child_name(&parent, "-suffix");
        assert_eq!(name.len(), MAX_NAME_LEN);
        assert!(name.ends_with("-suffix"));
        assert!(name.starts_with(&"a".repeat(24)));
    }

    #[test]
    fn long_suffix_hashes_everything() {
        let suffix = format!("{}.example.com", "x".repeat(60));
        let name = child_name("route-contour-external-", &suffix);
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(name.starts_with("route-contour-external-"));
    }

    #[test]
    fn trailing_dash_is_trimmed() {
        let suffix = format!("{}-", "-".repeat(70));
        let name = child_name("p", &suffix);
        assert!(!name.ends_with('-'));
        assert!(name.len() <= MAX_NAME_LEN);
    }

    #[test]
    fn child_names_are_deterministic_and_distinct() {
        let host_a = format!("{}.a.example.com", "x".repeat(50));
        let host_b = format!("{}.b.example.com", "x".repeat(50));
        let a1 = child_name("ing-contour-external-", &host_a);
        let a2 = child_name("ing-contour-external-", &host_a);
        let b = child_name("ing-contour-external-", &host_b);
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        let name = child_name(&"é".repeat(40), &"ü".repeat(40));
        assert!(name.len() <= MAX_NAME_LEN);
    }

    #[test]
    fn domain_hash_is_sha1_hex() {
        // sha1("example.com")
        assert_eq!(
            domain_hash("example.com"),
            "0caaf24ab1a0c33440c06afe99df986365b0781f"
        );
        assert_eq!(domain_hash("foo.example.com").len(), 40);
    }

    #[test]
    fn sha256_hex_has_fixed_length() {
        assert_eq!(sha256_hex(b"spec").len(), 64);
        assert_eq!(sha256_hex(b"spec"), sha256_hex(b"spec"));
        assert_ne!(sha256_hex(b"spec"), sha256_hex(b"spec2"));
    }

    #[test]
    fn namespaced_name_parses_and_displays() {
        let n = NamespacedName::parse("knative-serving/default-cert").unwrap();
        assert_eq!(n.namespace, "knative-serving");
        assert_eq!(n.name, "default-cert");
        assert_eq!(n.to_string(), "knative-serving/default-cert");
    }

    #[test]
    fn namespaced_name_rejects_malformed_keys() {
        assert!(NamespacedName::parse("no-namespace").is_none());
        assert!(NamespacedName::parse("/name").is_none());
        assert!(NamespacedName::parse("ns/").is_none());
        assert!(NamespacedName::parse("a/b/c").is_none());
    }
}
