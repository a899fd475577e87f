//! Assembly of the immutable TLS context.
//!
//! The build is a one-way chain, each step consuming the previous one:
//!
//! ```text
//! MtlsClientConfig ─► IdentityMaterial ─► MergedTrustAuthority ─► TlsContext
//! ```
//!
//! [`build_context`] takes the identity and merged authority by value, so a
//! context cannot exist without both.

use crate::config::MtlsClientConfig;
use crate::error::TlsSetupError;
use crate::identity::{self, IdentityMaterial};
use crate::tls::{self, TlsProtocol};
use crate::trust::{self, MergedTrustAuthority, TrustAuthority};
use rustls::ClientConfig;
use std::sync::Arc;

/// Finalized negotiation configuration: identity, trust and protocol version.
///
/// There are no mutators; any change means building a new context.
#[derive(Debug, Clone)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
    protocol: TlsProtocol,
}

impl TlsContext {
    /// The rustls configuration, shareable with any rustls-based connector
    #[must_use]
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }

    /// Protocol version the context was built for
    #[must_use]
    pub fn protocol(&self) -> TlsProtocol {
        self.protocol
    }
}

/// Bind identity, merged trust and protocol version into a context.
///
/// # Errors
///
/// - `ProtocolUnsupported` if `protocol_version` is unknown or the crypto
///   provider has no cipher suite for it
/// - `ContextInit` for any other rustls initialization failure
pub fn build_context<P, C>(
    protocol_version: &str,
    identity: IdentityMaterial,
    merged: MergedTrustAuthority<P, C>,
) -> Result<TlsContext, TlsSetupError>
where
    P: TrustAuthority + 'static,
    C: TrustAuthority + 'static,
{
    let protocol = TlsProtocol::parse(protocol_version)?;

    let config = ClientConfig::builder_with_provider(tls::get_crypto_provider())
        .with_protocol_versions(protocol.versions())
        .map_err(|e| {
            tracing::warn!(
                error = %e,
                version = protocol_version,
                "crypto provider rejected protocol version"
            );
            TlsSetupError::ProtocolUnsupported {
                version: protocol_version.to_owned(),
            }
        })?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(merged))
        .with_client_cert_resolver(identity.into_resolver());

    tracing::debug!(protocol = %protocol, "built TLS context");

    Ok(TlsContext {
        config: Arc::new(config),
        protocol,
    })
}

/// Run the whole pipeline for `config`: identity, both trust authorities,
/// merge, context.
///
/// Material is loaded fresh on every call; nothing is cached between builds.
///
/// # Errors
///
/// The first failure of any step, unchanged. See [`TlsSetupError`].
pub fn build_tls_context(config: &MtlsClientConfig) -> Result<TlsContext, TlsSetupError> {
    let identity = identity::load_identity(&config.keystore_addr, &config.keystore_pw)?;

    let platform = trust::load_platform_authority(config.platform_roots)?;
    let custom = trust::load_custom_authority(&config.truststore_addr, &config.truststore_pw)?;
    let merged = trust::merge_authorities(platform, custom);

    build_context(&config.tls_version, identity, merged)
}
