use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning configuration into a TLS context.
///
/// Every variant is terminal for the build: no client is produced and nothing
/// is retried. The caller decides whether to rebuild with other settings.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TlsSetupError {
    /// Trust store file could not be opened or read
    #[error("Failed to read trust store '{}': {source}", .path.display())]
    TrustStoreFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Trust store is not a readable PKCS#12 container
    #[error("Malformed trust store '{}': {reason}", .path.display())]
    TrustStoreFormat { path: PathBuf, reason: String },

    /// Trust store passphrase does not unlock the container
    #[error("Trust store '{}' rejected the supplied passphrase", .path.display())]
    TrustStoreAuth { path: PathBuf },

    /// No usable X.509 trust anchors could be extracted
    #[error("Failed to initialize {source_name} trust authority: {reason}")]
    TrustStoreInit {
        /// `"platform"` or the trust store path
        source_name: String,
        reason: String,
    },

    /// Keystore file could not be opened or read
    #[error("Failed to read keystore '{}': {source}", .path.display())]
    KeystoreFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Keystore is not a readable PKCS#12 container
    #[error("Malformed keystore '{}': {reason}", .path.display())]
    KeystoreFormat { path: PathBuf, reason: String },

    /// Keystore passphrase does not unlock the container
    #[error("Keystore '{}' rejected the supplied passphrase", .path.display())]
    KeystoreAuth { path: PathBuf },

    /// Identity could not be turned into a signing key handle
    #[error("Failed to derive client identity from '{}': {reason}", .path.display())]
    KeyDerive { path: PathBuf, reason: String },

    /// Requested protocol version is unknown or not served by the crypto provider
    #[error("TLS protocol version '{version}' is not supported")]
    ProtocolUnsupported { version: String },

    /// Any other TLS context initialization failure
    #[error("Failed to initialize TLS context: {0}")]
    ContextInit(#[source] rustls::Error),
}

/// Which half of a merged trust decision produced a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityRole {
    /// Operator-supplied trust store
    Custom,
    /// Default trust anchors of the execution environment
    Platform,
}

impl std::fmt::Display for AuthorityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorityRole::Custom => f.write_str("custom"),
            AuthorityRole::Platform => f.write_str("platform"),
        }
    }
}

/// A certificate chain was rejected during a handshake.
#[derive(Error, Debug, Clone)]
#[error("Certificate rejected by {authority} trust authority: {source}")]
pub struct CertificateValidationError {
    authority: AuthorityRole,
    #[source]
    source: rustls::Error,
}

impl CertificateValidationError {
    #[must_use]
    pub fn new(authority: AuthorityRole, source: rustls::Error) -> Self {
        Self { authority, source }
    }

    /// The authority whose rejection is being reported
    #[must_use]
    pub fn authority(&self) -> AuthorityRole {
        self.authority
    }

    /// The underlying rustls rejection
    #[must_use]
    pub fn reason(&self) -> &rustls::Error {
        &self.source
    }

    /// Unwrap into the rustls error handed back across the verifier boundary
    #[must_use]
    pub fn into_rustls(self) -> rustls::Error {
        self.source
    }
}

/// Classification of URL validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL scheme is not `https`
    NotHttps,
}

/// HTTP client error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// TLS context could not be built; no client exists
    #[error("TLS setup failed: {0}")]
    Setup(#[from] TlsSetupError),

    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Single request attempt timed out
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transport error (network, connection, TLS handshake)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid URL
    #[error("Invalid URL '{url}': {kind:?}")]
    InvalidUri { url: String, kind: InvalidUriKind },
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}
