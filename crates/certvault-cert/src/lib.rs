//! Certificate material handling for certvault
//!
//! Decodes PEM streams into typed blocks, parses private keys across the
//! common encodings, encrypts keys for storage and derives the
//! content-addressed identifiers certificates are stored under.

pub mod bundle;
pub mod certificate;
pub mod classifier;
pub mod encryption;
pub mod identity;
pub mod keys;

pub use bundle::{check_bundle, BundleContent};
pub use certificate::{
    check_key_pair, CertificateMeta, CertificateMode, LeafInfo, Material, ParsedCertificate,
};
pub use classifier::{classify, first_block_der, PemBlock};
pub use identity::{
    content_identifier, fingerprint, is_content_identifier, is_valid_org_prefix, Identifier,
};
pub use keys::{decode_private_key, encrypt_private_key, PrivateKey};

/// Renders blocks as PEM text with LF line endings, one after another.
pub fn encode_blocks(blocks: &[::pem::Pem]) -> String {
    blocks
        .iter()
        .map(|block| {
            let config = ::pem::EncodeConfig::new().set_line_ending(::pem::LineEnding::LF);
            ::pem::encode_config(block, config)
        })
        .collect()
}
