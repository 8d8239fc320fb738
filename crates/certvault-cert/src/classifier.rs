//! PEM block classification.
//!
//! Splits a byte stream into typed blocks, decrypting password protected
//! private keys in place. Blocks with labels the store does not handle
//! (certificate requests, parameters, ...) are skipped so that they never
//! block ingestion.

use ::pem::Pem;
use certvault_core::error::CertificateError;
use pkcs8::EncryptedPrivateKeyInfo;
use rustls::pki_types::CertificateDer;
use tracing::{debug, info};

use crate::encryption::{decrypt_legacy, is_legacy_encrypted};

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
pub const PRIVATE_KEY_SUFFIX: &str = "PRIVATE KEY";
pub const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

const ENCRYPTED_MARKER: &str = "ENCRYPTED ";

/// A decoded PEM block the store knows how to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PemBlock {
    /// DER encoded X.509 certificate
    Certificate(CertificateDer<'static>),
    /// DER encoded private key in PKCS#1, PKCS#8 or SEC1 form
    PrivateKey {
        der: Vec<u8>,
        /// Whether the block was decrypted during classification
        was_encrypted: bool,
    },
    /// DER encoded SubjectPublicKeyInfo
    PublicKey(Vec<u8>),
}

impl PemBlock {
    /// The DER payload of the block.
    pub fn der(&self) -> &[u8] {
        match self {
            PemBlock::Certificate(der) => der.as_ref(),
            PemBlock::PrivateKey { der, .. } => der,
            PemBlock::PublicKey(der) => der,
        }
    }
}

/// Parses every PEM section in `data` without interpreting labels.
///
/// Text outside of PEM sections is ignored; a stream without any section
/// yields an empty list.
pub fn parse_blocks(data: &[u8]) -> Result<Vec<Pem>, CertificateError> {
    ::pem::parse_many(data).map_err(|e| CertificateError::malformed(e.to_string()))
}

/// DER payload of the first PEM section in `data`, whatever its label.
pub fn first_block_der(data: &[u8]) -> Option<Vec<u8>> {
    ::pem::parse(data).ok().map(Pem::into_contents)
}

/// Decodes and classifies all PEM blocks in `data`.
///
/// Encrypted private key blocks are decrypted with `passphrase`. Both the
/// legacy `DEK-Info` header form and PKCS#8 `ENCRYPTED PRIVATE KEY` blocks
/// are supported.
///
/// # Errors
///
/// - `MalformedInput` if a PEM section cannot be decoded
/// - `Decryption` with the block index if an encrypted block can't be decrypted
pub fn classify(data: &[u8], passphrase: Option<&[u8]>) -> Result<Vec<PemBlock>, CertificateError> {
    let mut classified = Vec::new();

    for (index, block) in parse_blocks(data)?.into_iter().enumerate() {
        let (label, der, was_encrypted) = decrypt_block(index, block, passphrase)?;

        if label == CERTIFICATE_LABEL {
            classified.push(PemBlock::Certificate(CertificateDer::from(der)));
        } else if label.ends_with(PRIVATE_KEY_SUFFIX) {
            classified.push(PemBlock::PrivateKey { der, was_encrypted });
        } else if label == PUBLIC_KEY_LABEL {
            classified.push(PemBlock::PublicKey(der));
        } else {
            info!(block = index, "Ignoring PEM block with type: {}", label);
        }
    }

    debug!("Classified {} PEM block(s)", classified.len());
    Ok(classified)
}

fn decrypt_block(
    index: usize,
    block: Pem,
    passphrase: Option<&[u8]>,
) -> Result<(String, Vec<u8>, bool), CertificateError> {
    if is_legacy_encrypted(&block) {
        let passphrase = passphrase
            .ok_or_else(|| CertificateError::decryption(index, "no passphrase supplied"))?;
        let der = decrypt_legacy(&block, passphrase)
            .map_err(|reason| CertificateError::decryption(index, reason))?;
        let label = block.tag().replacen(ENCRYPTED_MARKER, "", 1);
        return Ok((label, der, true));
    }

    if block.tag() == ENCRYPTED_PRIVATE_KEY_LABEL {
        let passphrase = passphrase
            .ok_or_else(|| CertificateError::decryption(index, "no passphrase supplied"))?;
        let info = EncryptedPrivateKeyInfo::try_from(block.contents())
            .map_err(|e| CertificateError::decryption(index, e.to_string()))?;
        let document = info
            .decrypt(passphrase)
            .map_err(|e| CertificateError::decryption(index, e.to_string()))?;
        return Ok((
            PRIVATE_KEY_SUFFIX.to_string(),
            document.as_bytes().to_vec(),
            true,
        ));
    }

    let label = block.tag().to_string();
    Ok((label, block.into_contents(), false))
}
