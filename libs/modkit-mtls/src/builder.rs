use crate::config::{MtlsClientConfig, PoolConfig};
use crate::context::{self, TlsContext};
use crate::error::HttpError;
use bytes::Bytes;
use http_body_util::Full;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;

/// Where the TLS context comes from at build time
enum ContextSource {
    /// Run the whole pipeline from configuration
    Config(MtlsClientConfig),
    /// Use an already built context
    Prebuilt(TlsContext),
}

/// Builder for constructing an [`HttpClient`](crate::HttpClient) on top of a
/// merged-trust TLS context.
pub struct HttpClientBuilder {
    source: ContextSource,
    pool: PoolConfig,
    request_timeout: Duration,
}

impl HttpClientBuilder {
    /// Create a builder that loads identity and trust from `config` on
    /// [`build`](Self::build)
    #[must_use]
    pub fn with_config(config: MtlsClientConfig) -> Self {
        let pool = config.pool.clone();
        let request_timeout = config.request_timeout;
        Self {
            source: ContextSource::Config(config),
            pool,
            request_timeout,
        }
    }

    /// Create a builder around an existing TLS context
    ///
    /// Pool and timeout settings start from their defaults.
    #[must_use]
    pub fn from_context(context: TlsContext) -> Self {
        Self {
            source: ContextSource::Prebuilt(context),
            pool: PoolConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the idle connection timeout for the connection pool
    ///
    /// Connections that remain idle for longer than this duration will be
    /// closed and removed from the pool. Default: 90 seconds.
    ///
    /// Set to `None` to disable idle timeout (connections kept indefinitely).
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool.idle_timeout = timeout;
        self
    }

    /// Set the maximum number of idle connections per host
    ///
    /// Setting to `0` disables connection reuse entirely. Default: 32.
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool.max_idle_per_host = max;
        self
    }

    /// Build the HTTP client
    ///
    /// # Errors
    ///
    /// Returns `HttpError::Setup` if any step of the TLS pipeline fails; no
    /// client is produced in that case.
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        let context = match self.source {
            ContextSource::Config(config) => context::build_tls_context(&config)?,
            ContextSource::Prebuilt(context) => context,
        };

        let https = build_https_connector(&context);

        let mut client_builder = Client::builder(TokioExecutor::new());

        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.pool.max_idle_per_host)
            .http2_only(false);

        if let Some(idle_timeout) = self.pool.idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }

        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        tracing::debug!(
            protocol = %context.protocol(),
            max_idle_per_host = self.pool.max_idle_per_host,
            idle_timeout = ?self.pool.idle_timeout,
            request_timeout = ?self.request_timeout,
            "built mTLS HTTP client; server hostname verification is disabled"
        );

        Ok(crate::HttpClient {
            inner: hyper_client,
            request_timeout: self.request_timeout,
        })
    }
}

/// HTTPS-only connector over the context's rustls configuration.
///
/// `enable_all_versions()` advertises both h2 and http/1.1 via ALPN; the
/// protocol is picked during the handshake.
fn build_https_connector(context: &TlsContext) -> HttpsConnector<HttpConnector> {
    let tls_config = rustls::ClientConfig::clone(&context.client_config());
    hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_only()
        .enable_all_versions()
        .build()
}
