//! Shape rules for bundles accepted into the store.
//!
//! A bundle is either a certificate chain with at most one private key, or a
//! single public key on its own.

use ::pem::Pem;
use certvault_core::error::CertificateError;
use rustls::pki_types::CertificateDer;
use tracing::error;

use crate::certificate::{check_key_pair, LeafInfo};
use crate::classifier::{PemBlock, CERTIFICATE_LABEL, PUBLIC_KEY_LABEL};
use crate::keys::{decode_private_key, PrivateKey};

/// The public material of an accepted bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleContent {
    /// Certificate chain, leaf first, with an optional private key
    Chain {
        chain: Vec<CertificateDer<'static>>,
        private_key: Option<Vec<u8>>,
    },
    /// DER SubjectPublicKeyInfo
    PublicKey(Vec<u8>),
}

/// Sorts classified blocks into a bundle, enforcing the shape rules.
///
/// # Errors
///
/// - `MultipleKeys` for a second private key
/// - `MixedContent` for a second public key, or a public key next to a chain
/// - `EmptyBundle` without a certificate or public key
/// - `KeyMismatch` for a private key without a certificate
/// - `InvalidCertificate` if the leaf is not valid X.509
pub fn check_bundle(blocks: Vec<PemBlock>) -> Result<BundleContent, CertificateError> {
    let mut chain: Vec<CertificateDer<'static>> = Vec::new();
    let mut public_key: Option<Vec<u8>> = None;
    let mut private_key: Option<Vec<u8>> = None;

    for block in blocks {
        match block {
            PemBlock::Certificate(der) => chain.push(der),
            PemBlock::PrivateKey { der, .. } => {
                if private_key.is_some() {
                    error!("Found multiple private keys in bundle");
                    return Err(CertificateError::MultipleKeys);
                }
                private_key = Some(der);
            }
            PemBlock::PublicKey(der) => {
                if public_key.is_some() {
                    error!("Found multiple public keys in bundle");
                    return Err(CertificateError::MixedContent);
                }
                public_key = Some(der);
            }
        }
    }

    match (chain.first(), public_key) {
        (Some(_), Some(_)) => {
            error!("Bundle holds both a certificate chain and a public key");
            Err(CertificateError::MixedContent)
        }
        (None, None) => {
            error!("Bundle holds neither a certificate nor a public key");
            Err(CertificateError::EmptyBundle)
        }
        (Some(leaf), None) => {
            LeafInfo::from_der(leaf)?;
            Ok(BundleContent::Chain { chain, private_key })
        }
        (None, Some(public_key)) => {
            if private_key.is_some() {
                error!("Private key supplied without a certificate");
                return Err(CertificateError::key_mismatch(
                    "private key supplied without a certificate",
                ));
            }
            Ok(BundleContent::PublicKey(public_key))
        }
    }
}

impl BundleContent {
    /// DER bytes the identifier is derived from: the leaf or the public key.
    pub fn primary_der(&self) -> &[u8] {
        match self {
            BundleContent::Chain { chain, .. } => chain.first().map(|c| c.as_ref()).unwrap_or(&[]),
            BundleContent::PublicKey(der) => der,
        }
    }

    /// Decodes the private key, if any, and checks it belongs to the leaf.
    pub fn matched_private_key(&self) -> Result<Option<PrivateKey>, CertificateError> {
        let BundleContent::Chain {
            chain,
            private_key: Some(der),
        } = self
        else {
            return Ok(None);
        };

        let key = decode_private_key(der)?;
        if let Some(leaf) = chain.first() {
            check_key_pair(leaf, &key)?;
        }
        Ok(Some(key))
    }

    /// The public blocks as they are written to storage.
    pub fn public_blocks(&self) -> Vec<Pem> {
        match self {
            BundleContent::Chain { chain, .. } => chain
                .iter()
                .map(|der| Pem::new(CERTIFICATE_LABEL, der.to_vec()))
                .collect(),
            BundleContent::PublicKey(der) => vec![Pem::new(PUBLIC_KEY_LABEL, der.clone())],
        }
    }
}
