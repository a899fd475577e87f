//! Trust resolution: platform and custom trust authorities and their merge.
//!
//! A [`TrustAuthority`] answers three questions about certificates: which
//! issuers it accepts as roots, whether a chain is acceptable for a server, and
//! whether a chain is acceptable for a client. [`MergedTrustAuthority`] puts
//! two of them behind the rustls verifier interface.

mod authority;
mod merged;

pub use authority::{RootTrustAuthority, load_custom_authority, load_platform_authority};
pub use merged::{MergedTrustAuthority, merge_authorities};

use rustls::DistinguishedName;
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls_pki_types::{CertificateDer, UnixTime};
use std::fmt;

/// A certificate chain as presented by a peer, plus the time to verify at.
#[derive(Debug, Clone, Copy)]
pub struct PresentedChain<'a> {
    pub end_entity: &'a CertificateDer<'a>,
    pub intermediates: &'a [CertificateDer<'a>],
    pub now: UnixTime,
}

impl<'a> PresentedChain<'a> {
    /// Chain verified against the current system time
    #[must_use]
    pub fn new(
        end_entity: &'a CertificateDer<'a>,
        intermediates: &'a [CertificateDer<'a>],
    ) -> Self {
        Self::at(end_entity, intermediates, UnixTime::now())
    }

    #[must_use]
    pub fn at(
        end_entity: &'a CertificateDer<'a>,
        intermediates: &'a [CertificateDer<'a>],
        now: UnixTime,
    ) -> Self {
        Self {
            end_entity,
            intermediates,
            now,
        }
    }
}

/// Validator deciding whether a certificate chain should be accepted.
pub trait TrustAuthority: fmt::Debug + Send + Sync {
    /// Subjects of the roots this authority accepts
    fn accepted_issuers(&self) -> Vec<DistinguishedName>;

    /// Validate a chain presented by a server
    ///
    /// # Errors
    ///
    /// The rustls rejection when the chain does not lead to an accepted root
    /// or is otherwise invalid for server use.
    fn validate_server(&self, chain: &PresentedChain<'_>) -> Result<(), rustls::Error>;

    /// Validate a chain presented by a client
    ///
    /// # Errors
    ///
    /// The rustls rejection when the chain does not lead to an accepted root
    /// or is otherwise invalid for client use.
    fn validate_client(&self, chain: &PresentedChain<'_>) -> Result<(), rustls::Error>;

    /// Signature algorithms used for handshake signature checks
    fn signature_algorithms(&self) -> WebPkiSupportedAlgorithms {
        crate::tls::get_crypto_provider().signature_verification_algorithms
    }
}
