use super::{PresentedChain, TrustAuthority};
use crate::config::PlatformRoots;
use crate::error::TlsSetupError;
use crate::secret::Passphrase;
use crate::store::{self, StoreError};
use crate::tls;
use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::CryptoProvider;
use rustls::server::danger::ClientCertVerifier;
use rustls::server::{ParsedCertificate, WebPkiClientVerifier};
use rustls::{CertificateError, DistinguishedName, RootCertStore};
use rustls_pki_types::CertificateDer;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Trust authority backed by a set of root certificates.
///
/// Server chains are checked for a path to one of the roots with the server
/// authentication usage. Names are never compared. Client chains go through
/// rustls' client certificate verifier.
pub struct RootTrustAuthority {
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
    // Absent when there are no roots: rustls refuses to build a client
    // verifier without anchors, and every client chain is rejected anyway.
    client_verifier: Option<Arc<dyn ClientCertVerifier>>,
}

impl RootTrustAuthority {
    /// Authority over `roots`, verifying with `provider`.
    ///
    /// # Errors
    ///
    /// Returns `TlsSetupError::ContextInit` if rustls cannot build a client
    /// verifier for a non-empty root set.
    pub fn new(
        roots: RootCertStore,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self, TlsSetupError> {
        let roots = Arc::new(roots);
        let client_verifier = if roots.is_empty() {
            None
        } else {
            let verifier = WebPkiClientVerifier::builder_with_provider(
                Arc::clone(&roots),
                Arc::clone(&provider),
            )
            .build()
            .map_err(|e| TlsSetupError::ContextInit(rustls::Error::General(e.to_string())))?;
            Some(verifier)
        };

        Ok(Self {
            roots,
            provider,
            client_verifier,
        })
    }

    /// Authority over DER certificates, skipping any that are not usable anchors
    ///
    /// # Errors
    ///
    /// See [`RootTrustAuthority::new`].
    pub fn from_certificates<I>(certs: I) -> Result<Self, TlsSetupError>
    where
        I: IntoIterator<Item = CertificateDer<'static>>,
    {
        let mut roots = RootCertStore::empty();
        roots.add_parsable_certificates(certs);
        Self::new(roots, tls::get_crypto_provider())
    }

    /// Number of trust anchors
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl fmt::Debug for RootTrustAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootTrustAuthority")
            .field("roots", &self.roots.len())
            .field("provider", &"CryptoProvider")
            .field("client_verifier", &self.client_verifier.is_some())
            .finish()
    }
}

impl TrustAuthority for RootTrustAuthority {
    fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        self.roots.subjects()
    }

    fn validate_server(&self, chain: &PresentedChain<'_>) -> Result<(), rustls::Error> {
        let cert = ParsedCertificate::try_from(chain.end_entity)?;
        verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            chain.intermediates,
            chain.now,
            self.provider.signature_verification_algorithms.all,
        )
    }

    fn validate_client(&self, chain: &PresentedChain<'_>) -> Result<(), rustls::Error> {
        let Some(verifier) = &self.client_verifier else {
            return Err(rustls::Error::InvalidCertificate(
                CertificateError::UnknownIssuer,
            ));
        };
        verifier
            .verify_client_cert(chain.end_entity, chain.intermediates, chain.now)
            .map(|_| ())
    }

    fn signature_algorithms(&self) -> rustls::crypto::WebPkiSupportedAlgorithms {
        self.provider.signature_verification_algorithms
    }
}

/// Load the execution environment's default trust anchors.
///
/// # Errors
///
/// Returns `TlsSetupError::TrustStoreInit` when the platform offers no usable
/// anchors.
pub fn load_platform_authority(roots: PlatformRoots) -> Result<RootTrustAuthority, TlsSetupError> {
    let store = tls::platform_root_store(roots)?;
    tracing::debug!(source = ?roots, anchors = store.len(), "loaded platform trust authority");
    RootTrustAuthority::new(store, tls::get_crypto_provider())
}

/// Load the operator-supplied trust store at `path`.
///
/// A store holding no certificates loads successfully and rejects every chain.
///
/// # Errors
///
/// - `TrustStoreFile` if the file cannot be opened or read
/// - `TrustStoreFormat` if it is not a PKCS#12 container
/// - `TrustStoreAuth` if `passphrase` does not unlock it
/// - `TrustStoreInit` if it holds certificates but none is a usable anchor
pub fn load_custom_authority(
    path: &Path,
    passphrase: &Passphrase,
) -> Result<RootTrustAuthority, TlsSetupError> {
    let bytes = store::read_store_file(path).map_err(|source| TlsSetupError::TrustStoreFile {
        path: path.to_path_buf(),
        source,
    })?;

    let unlocked = store::open_container(&bytes, passphrase).map_err(|e| match e {
        StoreError::Format(reason) => TlsSetupError::TrustStoreFormat {
            path: path.to_path_buf(),
            reason,
        },
        StoreError::Auth => TlsSetupError::TrustStoreAuth {
            path: path.to_path_buf(),
        },
    })?;

    let certificates = unlocked.into_all_certificates();
    let found = certificates.len();
    let mut roots = RootCertStore::empty();
    let (added, ignored) =
        roots.add_parsable_certificates(certificates.into_iter().map(CertificateDer::from));

    if ignored > 0 {
        tracing::warn!(
            path = %path.display(),
            added = added,
            ignored = ignored,
            "some trust store certificates could not be used as anchors"
        );
    }

    if found > 0 && added == 0 {
        return Err(TlsSetupError::TrustStoreInit {
            source_name: path.display().to_string(),
            reason: format!("none of the {found} certificates is a usable trust anchor"),
        });
    }

    if found == 0 {
        tracing::warn!(path = %path.display(), "custom trust store is empty");
    } else {
        tracing::debug!(path = %path.display(), anchors = added, "loaded custom trust authority");
    }

    RootTrustAuthority::new(roots, tls::get_crypto_provider())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::store::fixtures::truststore_der;

    fn ca(name: &str) -> (rcgen::Certificate, rcgen::KeyPair) {
        let mut params = rcgen::CertificateParams::default();
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, name);
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        (cert, key)
    }

    #[test]
    fn test_empty_authority_rejects_everything() {
        let (cert, _key) = ca("Lonely CA");
        let authority = RootTrustAuthority::from_certificates(Vec::new()).unwrap();
        let chain = PresentedChain::new(cert.der(), &[]);

        assert!(authority.is_empty());
        assert!(authority.accepted_issuers().is_empty());
        assert!(authority.validate_server(&chain).is_err());
        assert_eq!(
            authority.validate_client(&chain).unwrap_err(),
            rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer)
        );
    }

    #[test]
    fn test_accepted_issuers_lists_root_subjects() {
        let (first, _) = ca("First CA");
        let (second, _) = ca("Second CA");
        let authority =
            RootTrustAuthority::from_certificates([first.der().clone(), second.der().clone()])
                .unwrap();

        assert_eq!(authority.len(), 2);
        assert_eq!(authority.accepted_issuers().len(), 2);
    }

    #[test]
    fn test_unparsable_certificates_are_skipped() {
        let (root, _) = ca("Good CA");
        let authority = RootTrustAuthority::from_certificates([
            CertificateDer::from(vec![0x30, 0x00]),
            root.der().clone(),
        ])
        .unwrap();

        assert_eq!(authority.len(), 1);
    }

    #[test]
    fn test_load_custom_authority_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.p12");

        match load_custom_authority(&path, &Passphrase::new("pw")) {
            Err(TlsSetupError::TrustStoreFile { path: p, source }) => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected TrustStoreFile, got {other:?}"),
        }
    }

    #[test]
    fn test_load_custom_authority_from_certificate_only_store() {
        let (root, _) = ca("Partner Root R");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.p12");
        std::fs::write(&path, truststore_der(&[root.der().as_ref()], "changeit")).unwrap();

        let authority = load_custom_authority(&path, &Passphrase::new("changeit")).unwrap();
        assert_eq!(authority.len(), 1);

        match load_custom_authority(&path, &Passphrase::new("123456")) {
            Err(TlsSetupError::TrustStoreAuth { path: p }) => assert_eq!(p, path),
            other => panic!("expected TrustStoreAuth, got {other:?}"),
        }
    }

    #[test]
    fn test_load_custom_authority_not_pkcs12() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.jks");
        std::fs::write(&path, b"\xfe\xed\xfe\xed not pkcs12").unwrap();

        let result = load_custom_authority(&path, &Passphrase::new("pw"));
        assert!(matches!(result, Err(TlsSetupError::TrustStoreFormat { .. })));
    }
}
