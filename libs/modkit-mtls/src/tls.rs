//! TLS primitives shared by the trust and identity loaders.
//!
//! Native roots are read from the OS store on every call. Each client build
//! sees the store as it is at that moment.

use crate::config::PlatformRoots;
use crate::error::TlsSetupError;
use rustls::SupportedProtocolVersion;
use rustls_pki_types::CertificateDer;
use std::sync::Arc;

/// Load native root certificates from the OS certificate store.
///
/// Returns Ok with potentially empty vec; per-certificate failures are warned,
/// not errored.
fn load_native_certs() -> Vec<CertificateDer<'static>> {
    let result = rustls_native_certs::load_native_certs();

    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }

    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }

    result.certs
}

/// Build a root store from the configured platform source.
///
/// # Errors
///
/// Returns `TlsSetupError::TrustStoreInit` if no valid root certificates are
/// available:
/// - OS certificate store is empty
/// - All certificates failed to parse
pub fn platform_root_store(roots: PlatformRoots) -> Result<rustls::RootCertStore, TlsSetupError> {
    match roots {
        PlatformRoots::WebPki => Ok(rustls::RootCertStore::from_iter(
            webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
        )),
        PlatformRoots::Native => {
            let certs = load_native_certs();
            if certs.is_empty() {
                return Err(platform_init_error(
                    "no native root CA certificates found in OS certificate store".to_owned(),
                ));
            }

            let found = certs.len();
            let mut root_store = rustls::RootCertStore::empty();
            let (added, ignored) = root_store.add_parsable_certificates(certs);

            if ignored > 0 {
                tracing::warn!(
                    added = added,
                    ignored = ignored,
                    "some native root certificates could not be parsed"
                );
            }

            if added == 0 {
                return Err(platform_init_error(format!(
                    "no usable native root CA certificates (found {found}, {ignored} unparsable)"
                )));
            }

            Ok(root_store)
        }
    }
}

fn platform_init_error(reason: String) -> TlsSetupError {
    TlsSetupError::TrustStoreInit {
        source_name: "platform".to_owned(),
        reason,
    }
}

/// Get the crypto provider for TLS connections.
///
/// 1. If a default provider is already installed globally, use it
/// 2. Otherwise create an aws-lc-rs provider without installing it
pub fn get_crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// A protocol version name as accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProtocol {
    /// `"TLSv1.2"`
    Tls12,
    /// `"TLSv1.3"`
    Tls13,
    /// `"TLS"`: whatever the provider considers safe (1.2 and 1.3)
    Any,
}

impl TlsProtocol {
    /// Parse a protocol name.
    ///
    /// # Errors
    ///
    /// Returns `TlsSetupError::ProtocolUnsupported` for anything other than
    /// `TLS`, `TLSv1.2` or `TLSv1.3`. Older versions are not implemented by
    /// rustls.
    pub fn parse(name: &str) -> Result<Self, TlsSetupError> {
        match name {
            "TLSv1.2" => Ok(TlsProtocol::Tls12),
            "TLSv1.3" => Ok(TlsProtocol::Tls13),
            "TLS" => Ok(TlsProtocol::Any),
            other => Err(TlsSetupError::ProtocolUnsupported {
                version: other.to_owned(),
            }),
        }
    }

    #[must_use]
    pub fn versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            TlsProtocol::Tls12 => TLS12_ONLY,
            TlsProtocol::Tls13 => TLS13_ONLY,
            TlsProtocol::Any => rustls::DEFAULT_VERSIONS,
        }
    }
}

impl std::fmt::Display for TlsProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsProtocol::Tls12 => f.write_str("TLSv1.2"),
            TlsProtocol::Tls13 => f.write_str("TLSv1.3"),
            TlsProtocol::Any => f.write_str("TLS"),
        }
    }
}
