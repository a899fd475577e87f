//! Client identity for mutual TLS.

use crate::error::TlsSetupError;
use crate::secret::Passphrase;
use crate::store::{self, StoreError};
use crate::tls;
use rustls::client::ResolvesClientCert;
use rustls::sign::CertifiedKey;
use rustls::SignatureScheme;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::path::Path;
use std::sync::Arc;

/// Certificate chain plus signing key presented to servers.
///
/// The raw private key bytes are zeroed as soon as the signing key handle has
/// been derived; only the provider's key handle is kept.
#[derive(Debug, Clone)]
pub struct IdentityMaterial {
    key: Arc<CertifiedKey>,
}

impl IdentityMaterial {
    /// The end-entity certificate presented to servers
    #[must_use]
    pub fn end_entity(&self) -> &CertificateDer<'static> {
        &self.key.cert[0]
    }

    /// Full presented chain, end-entity first
    #[must_use]
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.key.cert
    }

    pub(crate) fn into_resolver(self) -> Arc<IdentityResolver> {
        Arc::new(IdentityResolver { key: self.key })
    }
}

/// Load the client identity from the keystore at `path`.
///
/// The first private key entry (by alias) is used, presented with the
/// certificate chain bound to it, end-entity first.
///
/// # Errors
///
/// - `KeystoreFile` if the file cannot be opened or read
/// - `KeystoreFormat` if it is not a PKCS#12 container
/// - `KeystoreAuth` if `passphrase` does not unlock it
/// - `KeyDerive` if there is no key or certificate, or the key is not usable
///   by the crypto provider
pub fn load_identity(
    path: &Path,
    passphrase: &Passphrase,
) -> Result<IdentityMaterial, TlsSetupError> {
    let bytes = store::read_store_file(path).map_err(|source| TlsSetupError::KeystoreFile {
        path: path.to_path_buf(),
        source,
    })?;

    let unlocked = store::open_container(&bytes, passphrase).map_err(|e| match e {
        StoreError::Format(reason) => TlsSetupError::KeystoreFormat {
            path: path.to_path_buf(),
            reason,
        },
        StoreError::Auth => TlsSetupError::KeystoreAuth {
            path: path.to_path_buf(),
        },
    })?;

    let key_derive = |reason: &str| TlsSetupError::KeyDerive {
        path: path.to_path_buf(),
        reason: reason.to_owned(),
    };

    let Some(entry) = unlocked.key_chains.into_iter().next() else {
        return Err(key_derive("keystore holds no private key"));
    };
    if entry.certificates.is_empty() {
        return Err(key_derive("keystore holds no certificate"));
    }

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(entry.private_key.as_slice()));
    let signing_key = tls::get_crypto_provider()
        .key_provider
        .load_private_key(key.clone_key())
        .map_err(|e| key_derive(&e.to_string()))?;

    let chain: Vec<CertificateDer<'static>> = entry
        .certificates
        .into_iter()
        .map(CertificateDer::from)
        .collect();

    tracing::debug!(
        path = %path.display(),
        alias = %entry.alias,
        chain_len = chain.len(),
        algorithm = ?signing_key.algorithm(),
        "loaded client identity"
    );

    Ok(IdentityMaterial {
        key: Arc::new(CertifiedKey::new(chain, signing_key)),
    })
}

/// Presents the loaded identity whenever a server asks for a client certificate.
#[derive(Debug)]
pub(crate) struct IdentityResolver {
    key: Arc<CertifiedKey>,
}

impl ResolvesClientCert for IdentityResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        if self.key.key.choose_scheme(sigschemes).is_none() {
            tracing::warn!(
                offered = ?sigschemes,
                "server offered no signature scheme usable with the client key"
            );
            return None;
        }
        Some(Arc::clone(&self.key))
    }

    fn has_certs(&self) -> bool {
        true
    }
}
