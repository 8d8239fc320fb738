//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use certvault::{CertVaultConfig, CertificateManager, MemoryStorage, TrustPolicy};
use std::sync::Arc;

pub const SECRET: &str = "integration-secret";

/// A certificate with its key, as PEM and DER.
pub struct Identity {
    pub cert_pem: String,
    pub cert_der: Vec<u8>,
    pub key_pem: String,
    pub key_pair: rcgen::KeyPair,
}

impl Identity {
    /// Certificate followed by its unencrypted private key.
    pub fn bundle(&self) -> String {
        format!("{}{}", self.cert_pem, self.key_pem)
    }
}

/// Self-signed ECDSA P-256 certificate for `name`.
pub fn self_signed(name: &str) -> Identity {
    let key_pair = rcgen::KeyPair::generate().expect("Failed to generate key pair");
    let mut params =
        rcgen::CertificateParams::new(vec![name.to_string()]).expect("Invalid certificate params");
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, name);
    let cert = params
        .self_signed(&key_pair)
        .expect("Failed to self-sign certificate");

    Identity {
        cert_pem: cert.pem(),
        cert_der: cert.der().to_vec(),
        key_pem: key_pair.serialize_pem(),
        key_pair,
    }
}

/// A certificate authority that can issue leaf certificates.
pub struct Authority {
    pub cert: rcgen::Certificate,
    pub key_pair: rcgen::KeyPair,
}

impl Authority {
    pub fn new(name: &str) -> Self {
        let key_pair = rcgen::KeyPair::generate().expect("Failed to generate CA key");
        let mut params = rcgen::CertificateParams::new(Vec::<String>::new())
            .expect("Invalid CA params");
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, name);
        params.key_usages = vec![
            rcgen::KeyUsagePurpose::KeyCertSign,
            rcgen::KeyUsagePurpose::CrlSign,
        ];
        let cert = params
            .self_signed(&key_pair)
            .expect("Failed to self-sign CA");

        Self { cert, key_pair }
    }

    /// Issues a leaf for `name` with the given extended key usage.
    pub fn issue(&self, name: &str, usage: rcgen::ExtendedKeyUsagePurpose) -> Identity {
        let key_pair = rcgen::KeyPair::generate().expect("Failed to generate leaf key");
        let mut params =
            rcgen::CertificateParams::new(vec![name.to_string()]).expect("Invalid leaf params");
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, name);
        params.extended_key_usages = vec![usage];
        let cert = params
            .signed_by(&key_pair, &self.cert, &self.key_pair)
            .expect("Failed to sign leaf");

        Identity {
            cert_pem: cert.pem(),
            cert_der: cert.der().to_vec(),
            key_pem: key_pair.serialize_pem(),
            key_pair,
        }
    }

    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }
}

/// Manager over a fresh in-memory backend.
pub fn manager_with(policy: TrustPolicy) -> (CertificateManager, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let mut config = CertVaultConfig::with_secret(SECRET);
    config.trust.policy = policy;

    let manager =
        CertificateManager::new(storage.clone(), config).expect("Failed to create manager");
    (manager, storage)
}

pub fn manager() -> (CertificateManager, Arc<MemoryStorage>) {
    manager_with(TrustPolicy::FailOpen)
}

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("certvault=debug")
        .with_test_writer()
        .try_init();
}
