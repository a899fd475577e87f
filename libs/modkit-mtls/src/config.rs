use crate::secret::Passphrase;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Protocol version used when the configuration does not name one
pub const DEFAULT_TLS_VERSION: &str = "TLSv1.2";

/// Source of the platform trust anchors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PlatformRoots {
    /// OS native root certificate store
    #[default]
    Native,
    /// Mozilla's root certificates (webpki-roots, no OS dependency)
    WebPki,
}

/// Connection pool settings handed to the hyper client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle connections older than this are evicted (default: 90 seconds)
    ///
    /// `None` keeps idle connections indefinitely.
    #[serde(deserialize_with = "duration_serde::deserialize_opt")]
    pub idle_timeout: Option<Duration>,

    /// Maximum idle connections kept per host (default: 32)
    pub max_idle_per_host: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(Duration::from_secs(90)),
            max_idle_per_host: 32,
        }
    }
}

/// Complete, immutable input to a client build.
///
/// Constructed once (in code or deserialized from configuration) and passed by
/// value into [`HttpClientBuilder`](crate::HttpClientBuilder). Paths and
/// passphrases are not pre-validated; failures surface from the loaders.
#[derive(Debug, Clone, Deserialize)]
pub struct MtlsClientConfig {
    /// Location of the custom trust store (PKCS#12)
    pub truststore_addr: PathBuf,

    /// Passphrase of the custom trust store
    pub truststore_pw: Passphrase,

    /// Location of the client identity keystore (PKCS#12)
    pub keystore_addr: PathBuf,

    /// Passphrase of the client identity keystore
    pub keystore_pw: Passphrase,

    /// Negotiated protocol version (default: `"TLSv1.2"`)
    #[serde(default = "default_tls_version")]
    pub tls_version: String,

    /// Where the fallback trust anchors come from (default: native)
    #[serde(default)]
    pub platform_roots: PlatformRoots,

    /// Connection pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Per-request timeout (default: 30 seconds)
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "duration_serde::deserialize"
    )]
    pub request_timeout: Duration,
}

impl MtlsClientConfig {
    /// Configuration with the four required credentials and defaults elsewhere
    #[must_use]
    pub fn new(
        truststore_addr: impl Into<PathBuf>,
        truststore_pw: Passphrase,
        keystore_addr: impl Into<PathBuf>,
        keystore_pw: Passphrase,
    ) -> Self {
        Self {
            truststore_addr: truststore_addr.into(),
            truststore_pw,
            keystore_addr: keystore_addr.into(),
            keystore_pw,
            tls_version: default_tls_version(),
            platform_roots: PlatformRoots::default(),
            pool: PoolConfig::default(),
            request_timeout: default_request_timeout(),
        }
    }

    /// Same configuration with another protocol version
    #[must_use]
    pub fn with_tls_version(self, tls_version: impl Into<String>) -> Self {
        Self {
            tls_version: tls_version.into(),
            ..self
        }
    }

    /// Same configuration with another platform trust source
    #[must_use]
    pub fn with_platform_roots(self, platform_roots: PlatformRoots) -> Self {
        Self {
            platform_roots,
            ..self
        }
    }
}

fn default_tls_version() -> String {
    DEFAULT_TLS_VERSION.to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Human-readable durations (`"30s"`, `"2m"`) via `humantime`.
mod duration_serde {
    use serde::{Deserialize, Deserializer, de};
    use std::time::Duration;

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw)
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&raw), &"a duration"))
    }

    pub fn deserialize_opt<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(d)? {
            Some(raw) => humantime::parse_duration(&raw).map(Some).map_err(|_| {
                de::Error::invalid_value(de::Unexpected::Str(&raw), &"a duration")
            }),
            None => Ok(None),
        }
    }
}
