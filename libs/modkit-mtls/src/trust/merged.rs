use super::{PresentedChain, RootTrustAuthority, TrustAuthority};
use crate::error::{AuthorityRole, CertificateValidationError};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};

/// Composite of a platform and a custom trust authority.
///
/// - accepted issuers are the platform's only; the custom list is never
///   surfaced
/// - server chains: custom first, platform on custom failure; when both reject,
///   the platform rejection is reported
/// - client chains: platform only
///
/// As a rustls [`ServerCertVerifier`] it ignores the server name, so hostname
/// verification is off for every connection using it.
#[derive(Debug)]
pub struct MergedTrustAuthority<P = RootTrustAuthority, C = RootTrustAuthority> {
    platform: P,
    custom: C,
}

/// Merge two authorities. Pure; no I/O.
#[must_use]
pub fn merge_authorities<P, C>(platform: P, custom: C) -> MergedTrustAuthority<P, C>
where
    P: TrustAuthority,
    C: TrustAuthority,
{
    MergedTrustAuthority { platform, custom }
}

impl<P, C> MergedTrustAuthority<P, C>
where
    P: TrustAuthority,
    C: TrustAuthority,
{
    /// Platform issuers; the custom authority's issuers are never listed
    #[must_use]
    pub fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        self.platform.accepted_issuers()
    }

    /// Validate a server chain with custom-then-platform precedence.
    ///
    /// # Errors
    ///
    /// Exactly one error, attributed to [`AuthorityRole::Platform`], when both
    /// authorities reject the chain. The [`AuthorityRole::Custom`] rejection is
    /// only logged.
    pub fn validate_server(
        &self,
        chain: &PresentedChain<'_>,
    ) -> Result<(), CertificateValidationError> {
        let Err(custom_err) = self.custom.validate_server(chain) else {
            return Ok(());
        };

        let discarded = CertificateValidationError::new(AuthorityRole::Custom, custom_err);
        tracing::debug!(
            error = %discarded,
            "custom trust authority rejected server chain; retrying with platform authority"
        );

        self.platform
            .validate_server(chain)
            .map_err(|e| CertificateValidationError::new(AuthorityRole::Platform, e))
    }

    /// Validate a client chain with the platform authority alone.
    ///
    /// # Errors
    ///
    /// The platform rejection, if any.
    pub fn validate_client(
        &self,
        chain: &PresentedChain<'_>,
    ) -> Result<(), CertificateValidationError> {
        self.platform
            .validate_client(chain)
            .map_err(|e| CertificateValidationError::new(AuthorityRole::Platform, e))
    }

    fn algorithms(&self) -> WebPkiSupportedAlgorithms {
        self.platform.signature_algorithms()
    }
}

impl<P, C> TrustAuthority for MergedTrustAuthority<P, C>
where
    P: TrustAuthority,
    C: TrustAuthority,
{
    fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        MergedTrustAuthority::accepted_issuers(self)
    }

    fn validate_server(&self, chain: &PresentedChain<'_>) -> Result<(), rustls::Error> {
        MergedTrustAuthority::validate_server(self, chain)
            .map_err(CertificateValidationError::into_rustls)
    }

    fn validate_client(&self, chain: &PresentedChain<'_>) -> Result<(), rustls::Error> {
        MergedTrustAuthority::validate_client(self, chain)
            .map_err(CertificateValidationError::into_rustls)
    }

    fn signature_algorithms(&self) -> WebPkiSupportedAlgorithms {
        self.algorithms()
    }
}

impl<P, C> ServerCertVerifier for MergedTrustAuthority<P, C>
where
    P: TrustAuthority,
    C: TrustAuthority,
{
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let chain = PresentedChain::at(end_entity, intermediates, now);
        match MergedTrustAuthority::validate_server(self, &chain) {
            Ok(()) => Ok(ServerCertVerified::assertion()),
            Err(e) => {
                tracing::warn!(error = %e, "server certificate rejected");
                Err(e.into_rustls())
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms().supported_schemes()
    }
}
