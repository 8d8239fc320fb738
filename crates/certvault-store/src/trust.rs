//! Trust anchors and peer validation against allow-lists of identifiers.

use certvault_cert::{fingerprint, CertificateMode};
use certvault_core::config::TrustPolicy;
use certvault_core::error::{Result, TrustError};
use rustls::pki_types::CertificateDer;
use rustls::{CommonState, RootCertStore};
use tracing::{debug, info, warn};

use crate::manager::{CertificateManager, Resolution};

/// What a completed TLS handshake revealed about the peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerHandshake {
    peer_certificates: Vec<CertificateDer<'static>>,
}

impl PeerHandshake {
    /// Wraps the certificates a peer presented, leaf first.
    pub fn new(peer_certificates: Vec<CertificateDer<'static>>) -> Self {
        Self { peer_certificates }
    }

    /// Captures the peer certificates of a rustls connection.
    ///
    /// Returns `None` while the handshake is still in progress.
    pub fn from_state(state: &CommonState) -> Option<Self> {
        if state.is_handshaking() {
            return None;
        }

        let peer_certificates = state
            .peer_certificates()
            .map(|certs| certs.to_vec())
            .unwrap_or_default();
        Some(Self::new(peer_certificates))
    }

    pub fn peer_certificates(&self) -> &[CertificateDer<'static>] {
        &self.peer_certificates
    }

    /// The first presented certificate.
    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.peer_certificates.first()
    }
}

impl CertificateManager {
    /// Builds a set of trust anchors from the leaf certificates behind `ids`.
    ///
    /// Only entries without a private key are used. Entries that can't be
    /// resolved, and standalone public keys, are skipped.
    pub async fn cert_pool<S: AsRef<str>>(&self, ids: &[S]) -> RootCertStore {
        let mut pool = RootCertStore::empty();

        for cert in self
            .list(ids, CertificateMode::RequirePublicOnly)
            .await
            .into_iter()
            .flatten()
        {
            let Some(leaf) = cert.leaf_certificate() else {
                debug!(fingerprint = %cert.fingerprint(), "Skipping public key in trust pool");
                continue;
            };

            if let Err(e) = pool.add(leaf.clone()) {
                warn!(fingerprint = %cert.fingerprint(), error = %e, "Rejected trust anchor");
            }
        }

        debug!("Built trust pool with {} anchor(s)", pool.len());
        pool
    }

    /// Checks the peer of a TLS connection against an allow-list.
    ///
    /// The SHA-256 of the peer's first certificate must equal the
    /// fingerprint of an entry in `ids`. Under [`TrustPolicy::FailOpen`] an
    /// entry that can't be resolved accepts any peer.
    ///
    /// # Errors
    ///
    /// - `NoTls` if `handshake` is `None`
    /// - `NoPeerCertificate` if the peer presented no certificate
    /// - `UntrustedPeer` if nothing on the allow-list matches
    pub async fn validate_peer<S: AsRef<str>>(
        &self,
        ids: &[S],
        handshake: Option<&PeerHandshake>,
    ) -> Result<()> {
        let handshake = handshake.ok_or(TrustError::NoTls)?;
        let leaf = handshake.leaf().ok_or(TrustError::NoPeerCertificate)?;
        let presented = fingerprint(leaf);
        let policy = self.config().trust.policy;

        for resolution in self.resolve(ids, CertificateMode::RequirePublicOnly).await {
            match resolution {
                Resolution::Found(cert) if cert.fingerprint() == presented => {
                    self.metrics().record_peer_accepted();
                    debug!(fingerprint = %presented, "Peer certificate allowed");
                    return Ok(());
                }
                Resolution::Unavailable if policy == TrustPolicy::FailOpen => {
                    self.metrics().record_peer_fail_open();
                    warn!(
                        fingerprint = %presented,
                        "Allow-list entry could not be resolved, accepting peer"
                    );
                    return Ok(());
                }
                _ => {}
            }
        }

        self.metrics().record_peer_rejected();
        info!(fingerprint = %presented, "Rejected peer certificate");
        Err(TrustError::UntrustedPeer {
            fingerprint: presented,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use certvault_core::config::CertVaultConfig;
    use certvault_core::error::CertVaultError;
    use std::sync::Arc;

    fn self_signed(name: &str) -> rcgen::CertifiedKey {
        rcgen::generate_simple_self_signed(vec![name.to_string()]).unwrap()
    }

    fn manager(policy: TrustPolicy) -> CertificateManager {
        let mut config = CertVaultConfig::with_secret("secret");
        config.trust.policy = policy;
        CertificateManager::new(Arc::new(MemoryStorage::new()), config).unwrap()
    }

    fn handshake(cert: &rcgen::CertifiedKey) -> PeerHandshake {
        PeerHandshake::new(vec![cert.cert.der().clone()])
    }

    fn trust_error(err: CertVaultError) -> TrustError {
        match err {
            CertVaultError::Trust(e) => e,
            other => panic!("expected trust error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validate_peer() {
        let manager = manager(TrustPolicy::FailOpen);
        let allowed = self_signed("allowed.local");
        let stranger = self_signed("stranger.local");
        let id = manager.add(allowed.cert.pem().as_bytes(), "orgA:").await.unwrap();

        assert_eq!(
            trust_error(manager.validate_peer(&[&id], None).await.unwrap_err()),
            TrustError::NoTls
        );
        assert_eq!(
            trust_error(
                manager
                    .validate_peer(&[&id], Some(&PeerHandshake::default()))
                    .await
                    .unwrap_err()
            ),
            TrustError::NoPeerCertificate
        );

        manager.validate_peer(&[&id], Some(&handshake(&allowed))).await.unwrap();

        let err = manager
            .validate_peer(&[&id], Some(&handshake(&stranger)))
            .await
            .unwrap_err();
        assert_eq!(
            trust_error(err),
            TrustError::UntrustedPeer {
                fingerprint: fingerprint(stranger.cert.der())
            }
        );
    }

    #[tokio::test]
    async fn test_entries_with_private_keys_never_match() {
        let manager = manager(TrustPolicy::FailOpen);
        let peer = self_signed("peer.local");
        let bundle = format!("{}{}", peer.cert.pem(), peer.key_pair.serialize_pem());
        let id = manager.add(bundle.as_bytes(), "orgA:").await.unwrap();

        assert!(manager.validate_peer(&[&id], Some(&handshake(&peer))).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_open_on_unresolvable_entry() {
        let manager = manager(TrustPolicy::FailOpen);
        let allowed = self_signed("allowed.local");
        let stranger = self_signed("stranger.local");
        let id = manager.add(allowed.cert.pem().as_bytes(), "orgA:").await.unwrap();
        let missing = format!("orgA:{}", fingerprint(b"deleted"));

        manager
            .validate_peer(&[&id, &missing], Some(&handshake(&stranger)))
            .await
            .unwrap();
        assert_eq!(manager.metrics().snapshot().peers_fail_open, 1);
        assert_eq!(manager.metrics().snapshot().peers_accepted, 0);
    }

    #[tokio::test]
    async fn test_fail_closed_on_unresolvable_entry() {
        let manager = manager(TrustPolicy::FailClosed);
        let allowed = self_signed("allowed.local");
        let stranger = self_signed("stranger.local");
        let id = manager.add(allowed.cert.pem().as_bytes(), "orgA:").await.unwrap();
        let missing = format!("orgA:{}", fingerprint(b"deleted"));

        let err = manager
            .validate_peer(&[&missing], Some(&handshake(&stranger)))
            .await
            .unwrap_err();
        assert!(matches!(trust_error(err), TrustError::UntrustedPeer { .. }));

        manager
            .validate_peer(&[&missing, &id], Some(&handshake(&allowed)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cert_pool_skips_keys_and_failures() {
        let manager = manager(TrustPolicy::FailOpen);
        let anchor = self_signed("anchor.local");
        let keyed = self_signed("keyed.local");
        let public_key = rcgen::KeyPair::generate().unwrap();

        let anchor_id = manager.add(anchor.cert.pem().as_bytes(), "o:").await.unwrap();
        let keyed_id = manager
            .add(
                format!("{}{}", keyed.cert.pem(), keyed.key_pair.serialize_pem()).as_bytes(),
                "o:",
            )
            .await
            .unwrap();
        let key_id = manager.add(public_key.public_key_pem().as_bytes(), "o:").await.unwrap();
        let missing = format!("o:{}", fingerprint(b"missing"));

        let pool = manager
            .cert_pool(&[anchor_id, keyed_id, key_id, missing])
            .await;
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_from_state_during_handshake() {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(RootCertStore::empty())
            .with_no_client_auth();
        let conn = rustls::ClientConnection::new(
            Arc::new(config),
            rustls::pki_types::ServerName::try_from("localhost").unwrap(),
        )
        .unwrap();

        assert!(PeerHandshake::from_state(&conn).is_none());
    }
}
