//! Content-derived identifiers and fingerprints.
//!
//! A fingerprint is the lowercase hex SHA-256 of DER bytes. A content
//! identifier is an arbitrary organisation prefix followed by a fingerprint.
//! Anything that is not a content identifier names a file on local disk.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// Length of a hex encoded SHA-256 digest.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// SHA-256 of `bytes`, hex encoded in lowercase.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Returns true if `value` is exactly one hex encoded SHA-256 digest.
pub fn is_hex_fingerprint(value: &str) -> bool {
    value.len() == FINGERPRINT_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Returns true if identifiers built on `org_id` classify as content.
///
/// A path separator in the prefix would make the identifier read as a
/// filesystem path.
pub fn is_valid_org_prefix(org_id: &str) -> bool {
    !org_id.contains(['/', '\\'])
}

/// Returns true if `id` names content in the persistent store.
///
/// The last 64 characters must be a hex digest and the organisation prefix
/// before them must not contain a path separator. This only inspects the
/// shape of the string; it says nothing about whether the content exists.
pub fn is_content_identifier(id: &str) -> bool {
    let Some(split) = id.len().checked_sub(FINGERPRINT_HEX_LEN) else {
        return false;
    };
    if !id.is_char_boundary(split) {
        return false;
    }

    let (org, digest) = id.split_at(split);
    is_hex_fingerprint(digest) && is_valid_org_prefix(org)
}

/// Builds the storage identifier for content whose primary DER bytes are
/// `primary`: the leaf certificate, or the public key when there is no chain.
pub fn content_identifier(org_id: &str, primary: &[u8]) -> String {
    format!("{}{}", org_id, fingerprint(primary))
}

/// A caller supplied identifier, resolved to where its bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Key in the persistent store (without the namespace marker)
    Content(String),
    /// Local file path
    Path(PathBuf),
}

impl Identifier {
    /// Classifies `id` with [`is_content_identifier`].
    pub fn classify(id: &str) -> Self {
        if is_content_identifier(id) {
            Identifier::Content(id.to_string())
        } else {
            Identifier::Path(PathBuf::from(id))
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Identifier::Content(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Content(id) => f.write_str(id),
            Identifier::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let first = fingerprint(b"certificate bytes");
        let second = fingerprint(b"certificate bytes");

        assert_eq!(first, second);
        assert_eq!(first.len(), FINGERPRINT_HEX_LEN);
        assert_eq!(first, first.to_lowercase());
        assert_ne!(first, fingerprint(b"other bytes"));
    }

    #[test]
    fn test_fingerprint_known_value() {
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_identifier_detection() {
        let digest = fingerprint(b"leaf");

        assert!(is_content_identifier(&digest));
        assert!(is_content_identifier(&format!("orgA:{}", digest)));
        assert!(is_content_identifier(&format!("5e9d9544a1dcd60001d0ed20{}", digest)));

        assert!(!is_content_identifier("cert.pem"));
        assert!(!is_content_identifier(&format!("/etc/certs/{}", digest)));
        assert!(!is_content_identifier(&format!("orgA:{}", &digest[1..])));
        assert!(!is_content_identifier(&format!("{}.pem", digest)));
    }

    #[test]
    fn test_org_prefix_agrees_with_classification() {
        for org in ["orgA:", "", "tenants/acme:", "dom\\user:", "a.b-c:"] {
            let id = content_identifier(org, b"leaf");
            assert_eq!(is_valid_org_prefix(org), is_content_identifier(&id), "{}", org);
        }
        assert!(!is_valid_org_prefix("tenants/acme:"));
        assert!(!is_valid_org_prefix("dom\\user:"));
    }

    #[test]
    fn test_multibyte_prefix_does_not_panic() {
        let id = "é".repeat(40);
        assert!(!is_content_identifier(&id));
    }

    #[test]
    fn test_identifier_classification() {
        let id = content_identifier("orgB:", b"public key");
        assert_eq!(Identifier::classify(&id), Identifier::Content(id.clone()));
        assert!(Identifier::classify(&id).is_content());

        assert_eq!(
            Identifier::classify("/tmp/server.pem"),
            Identifier::Path(PathBuf::from("/tmp/server.pem"))
        );
        assert_eq!(Identifier::classify("/tmp/server.pem").to_string(), "/tmp/server.pem");
    }
}
