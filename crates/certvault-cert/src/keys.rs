//! Private key decoding and at-rest encryption.
//!
//! Keys arrive in whatever encoding the tool that produced them preferred:
//! PKCS#1 for older OpenSSL RSA keys, PKCS#8 for newer OpenSSL and most
//! generators, SEC1 for `openssl ecparam`. All three are tried in that order.

use ::pem::Pem;
use certvault_core::error::CertificateError;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, ObjectIdentifier, PrivateKeyInfo};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::classifier::ENCRYPTED_PRIVATE_KEY_LABEL;
use crate::encryption::{encrypt_block, PemCipher};

const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// A decoded private key.
#[derive(Debug, Clone, PartialEq)]
pub enum PrivateKey {
    Rsa(RsaPrivateKey),
    EcP256(p256::SecretKey),
    EcP384(p384::SecretKey),
}

impl PrivateKey {
    /// Short algorithm name for logging.
    pub fn algorithm(&self) -> &'static str {
        match self {
            PrivateKey::Rsa(_) => "RSA",
            PrivateKey::EcP256(_) => "ECDSA P-256",
            PrivateKey::EcP384(_) => "ECDSA P-384",
        }
    }

    /// Serializes the key as an unencrypted PKCS#8 document.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, CertificateError> {
        let document = match self {
            PrivateKey::Rsa(key) => key.to_pkcs8_der(),
            PrivateKey::EcP256(key) => key.to_pkcs8_der(),
            PrivateKey::EcP384(key) => key.to_pkcs8_der(),
        }
        .map_err(|e| CertificateError::encryption(e.to_string()))?;

        Ok(document.as_bytes().to_vec())
    }

    /// Returns true if `spki_der` (a DER SubjectPublicKeyInfo, as found in a
    /// certificate) holds the public half of this key.
    pub fn matches_public_key(&self, spki_der: &[u8]) -> bool {
        match self {
            PrivateKey::Rsa(key) => RsaPublicKey::from_public_key_der(spki_der)
                .map(|public| public == key.to_public_key())
                .unwrap_or(false),
            PrivateKey::EcP256(key) => p256::PublicKey::from_public_key_der(spki_der)
                .map(|public| public == key.public_key())
                .unwrap_or(false),
            PrivateKey::EcP384(key) => p384::PublicKey::from_public_key_der(spki_der)
                .map(|public| public == key.public_key())
                .unwrap_or(false),
        }
    }
}

impl From<RsaPrivateKey> for PrivateKey {
    fn from(key: RsaPrivateKey) -> Self {
        PrivateKey::Rsa(key)
    }
}

impl From<p256::SecretKey> for PrivateKey {
    fn from(key: p256::SecretKey) -> Self {
        PrivateKey::EcP256(key)
    }
}

impl From<p384::SecretKey> for PrivateKey {
    fn from(key: p384::SecretKey) -> Self {
        PrivateKey::EcP384(key)
    }
}

/// Decodes a DER private key.
///
/// # Errors
///
/// - `UnsupportedKeyType` if a PKCS#8 wrapper holds anything but an RSA,
///   P-256 or P-384 key
/// - `KeyParse` if no encoding matches
pub fn decode_private_key(der: &[u8]) -> Result<PrivateKey, CertificateError> {
    if let Ok(key) = RsaPrivateKey::from_pkcs1_der(der) {
        return Ok(PrivateKey::Rsa(key));
    }

    if let Ok(info) = PrivateKeyInfo::try_from(der) {
        if let Some(key) = decode_pkcs8(&info, der)? {
            return Ok(key);
        }
    }

    if let Ok(key) = p256::SecretKey::from_sec1_der(der) {
        return Ok(PrivateKey::EcP256(key));
    }
    if let Ok(key) = p384::SecretKey::from_sec1_der(der) {
        return Ok(PrivateKey::EcP384(key));
    }

    Err(CertificateError::KeyParse)
}

fn decode_pkcs8(info: &PrivateKeyInfo<'_>, der: &[u8]) -> Result<Option<PrivateKey>, CertificateError> {
    let algorithm = info.algorithm.oid;

    if algorithm == RSA_ENCRYPTION_OID {
        return Ok(RsaPrivateKey::from_pkcs8_der(der).ok().map(PrivateKey::Rsa));
    }

    if algorithm != EC_PUBLIC_KEY_OID {
        return Err(CertificateError::unsupported_key(algorithm.to_string()));
    }

    match info.algorithm.parameters_oid() {
        Ok(curve) if curve == SECP256R1_OID => {
            Ok(p256::SecretKey::from_pkcs8_der(der).ok().map(PrivateKey::EcP256))
        }
        Ok(curve) if curve == SECP384R1_OID => {
            Ok(p384::SecretKey::from_pkcs8_der(der).ok().map(PrivateKey::EcP384))
        }
        Ok(curve) => Err(CertificateError::unsupported_key(format!("EC curve {}", curve))),
        Err(_) => Ok(None),
    }
}

/// Serializes `key` as PKCS#8 and encrypts it with AES-256-CBC under
/// `passphrase`. A fresh IV is drawn per call.
pub fn encrypt_private_key(key: &PrivateKey, passphrase: &[u8]) -> Result<Pem, CertificateError> {
    let der = key.to_pkcs8_der()?;
    encrypt_block(ENCRYPTED_PRIVATE_KEY_LABEL, &der, passphrase, PemCipher::Aes256Cbc)
}
