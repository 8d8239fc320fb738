//! Parsed certificate bundles and their display metadata.

use chrono::{DateTime, Utc};
use certvault_core::error::CertificateError;
use rustls::pki_types::CertificateDer;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use x509_parser::prelude::*;

use crate::classifier::{classify, PemBlock};
use crate::identity::fingerprint;
use crate::keys::{decode_private_key, PrivateKey};

/// Which entries a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateMode {
    /// Only entries holding a decrypted private key
    RequirePrivateKey,
    /// Only entries without a private key
    RequirePublicOnly,
    /// Everything
    Any,
}

/// Descriptive fields of the leaf certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafInfo {
    pub issuer: String,
    pub subject: String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub dns_names: Vec<String>,
}

impl LeafInfo {
    /// Extracts leaf fields from a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CertificateError::invalid_certificate(e.to_string()))?;

        let validity = cert.validity();
        let mut dns_names = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    dns_names.push(dns.to_string());
                }
            }
        }

        Ok(Self {
            issuer: cert.issuer().to_string(),
            subject: cert.subject().to_string(),
            not_before: DateTime::from_timestamp(validity.not_before.timestamp(), 0),
            not_after: DateTime::from_timestamp(validity.not_after.timestamp(), 0),
            dns_names,
        })
    }

    /// Placeholder leaf for a standalone public key, so it can be listed
    /// alongside real certificates.
    fn for_public_key(fingerprint: &str) -> Self {
        Self {
            subject: format!("Public Key: {}", fingerprint),
            ..Self::default()
        }
    }
}

/// Returns the DER SubjectPublicKeyInfo of a certificate.
pub fn certificate_public_key(der: &[u8]) -> Result<Vec<u8>, CertificateError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| CertificateError::invalid_certificate(e.to_string()))?;
    Ok(cert.public_key().raw.to_vec())
}

/// Checks that `key` is the private half of the certificate `leaf`.
///
/// # Errors
///
/// `InvalidCertificate` if `leaf` can't be parsed, `KeyMismatch` otherwise.
pub fn check_key_pair(leaf: &[u8], key: &PrivateKey) -> Result<(), CertificateError> {
    let spki = certificate_public_key(leaf)?;
    if key.matches_public_key(&spki) {
        Ok(())
    } else {
        Err(CertificateError::key_mismatch(format!(
            "{} key does not correspond to the leaf certificate",
            key.algorithm()
        )))
    }
}

/// The public material of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Material {
    /// Certificate chain, leaf first
    Chain(Vec<CertificateDer<'static>>),
    /// DER SubjectPublicKeyInfo stored on its own
    PublicKey(Vec<u8>),
}

/// A fully parsed bundle.
///
/// The fingerprint is computed once, from the leaf certificate or the
/// standalone public key, and used for every later comparison.
#[derive(Clone)]
pub struct ParsedCertificate {
    material: Material,
    leaf: LeafInfo,
    private_key: Option<PrivateKey>,
    fingerprint: String,
}

impl fmt::Debug for ParsedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedCertificate")
            .field("fingerprint", &self.fingerprint)
            .field("leaf", &self.leaf)
            .field("material", &self.material)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[PRIVATE KEY]"),
            )
            .finish()
    }
}

impl ParsedCertificate {
    /// Parses a bundle of PEM blocks, decrypting private keys with `secret`.
    ///
    /// # Errors
    ///
    /// Propagates classifier and key codec errors; `EmptyBundle` if there is
    /// neither a certificate nor a public key, `InvalidCertificate` if the
    /// leaf can't be parsed.
    pub fn from_pem(data: &[u8], secret: &str) -> Result<Self, CertificateError> {
        let mut chain = Vec::new();
        let mut public_key = None;
        let mut private_key = None;

        for block in classify(data, Some(secret.as_bytes()))? {
            match block {
                PemBlock::Certificate(der) => chain.push(der),
                PemBlock::PrivateKey { der, .. } => {
                    private_key = Some(decode_private_key(&der)?);
                }
                PemBlock::PublicKey(der) => public_key = Some(der),
            }
        }

        let material = match (chain.is_empty(), public_key) {
            (false, _) => Material::Chain(chain),
            (true, Some(public_key)) => Material::PublicKey(public_key),
            (true, None) => return Err(CertificateError::EmptyBundle),
        };

        Self::from_parts(material, private_key)
    }

    /// Assembles a parsed certificate from already decoded parts.
    pub fn from_parts(
        material: Material,
        private_key: Option<PrivateKey>,
    ) -> Result<Self, CertificateError> {
        let (leaf, fingerprint) = match &material {
            Material::Chain(chain) => {
                let first = chain.first().ok_or(CertificateError::EmptyBundle)?;
                (LeafInfo::from_der(first)?, fingerprint(first))
            }
            Material::PublicKey(der) => {
                let fingerprint = fingerprint(der);
                (LeafInfo::for_public_key(&fingerprint), fingerprint)
            }
        };

        debug!(fingerprint = %fingerprint, "Parsed certificate bundle");

        Ok(Self {
            material,
            leaf,
            private_key,
            fingerprint,
        })
    }

    /// Lowercase hex SHA-256 of the leaf certificate or public key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn leaf(&self) -> &LeafInfo {
        &self.leaf
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Certificate chain, empty for a standalone public key.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        match &self.material {
            Material::Chain(chain) => chain,
            Material::PublicKey(_) => &[],
        }
    }

    /// The leaf certificate, if the bundle has one.
    pub fn leaf_certificate(&self) -> Option<&CertificateDer<'static>> {
        self.chain().first()
    }

    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Whether the entry passes the listing filter.
    pub fn is_listable(&self, mode: CertificateMode) -> bool {
        match mode {
            CertificateMode::RequirePrivateKey => self.has_private_key(),
            CertificateMode::RequirePublicOnly => !self.has_private_key(),
            CertificateMode::Any => true,
        }
    }

    /// Display projection under the caller's identifier.
    pub fn meta(&self, id: &str) -> CertificateMeta {
        CertificateMeta {
            id: id.to_string(),
            fingerprint: self.fingerprint.clone(),
            has_private_key: self.has_private_key(),
            issuer: self.leaf.issuer.clone(),
            subject: self.leaf.subject.clone(),
            not_before: self.leaf.not_before,
            not_after: self.leaf.not_after,
            dns_names: self.leaf.dns_names.clone(),
        }
    }
}

/// Read-only metadata for display and audit consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMeta {
    pub id: String,
    pub fingerprint: String,
    #[serde(rename = "has_private")]
    pub has_private_key: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
}
