use crate::builder::HttpClientBuilder;
use crate::config::MtlsClientConfig;
use crate::error::{HttpError, InvalidUriKind};
use bytes::Bytes;
use http::{Request, Response, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use std::time::Duration;

/// Pooled hyper client over the mutual TLS connector
pub type PooledClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// HTTPS client presenting the configured identity and trusting the merged
/// authority.
///
/// `HttpClient` is `Clone + Send + Sync`. Clones share one connection pool, so
/// store the client directly instead of wrapping it in `Arc<Mutex<_>>`.
///
/// Responses are returned for every HTTP status; only transport failures,
/// timeouts and invalid URLs are errors. Bodies are left to the caller.
///
/// # Example
///
/// ```ignore
/// let client = HttpClient::builder(config).build()?;
/// let resp = client.get("https://partner.internal/health").await?;
/// println!("{}", resp.status());
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) inner: PooledClient,
    pub(crate) request_timeout: Duration,
}

impl HttpClient {
    /// Create a builder for `config`
    #[must_use]
    pub fn builder(config: MtlsClientConfig) -> HttpClientBuilder {
        HttpClientBuilder::with_config(config)
    }

    /// Per-request timeout applied by [`send`](Self::send)
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Send a request
    ///
    /// The request URI must be absolute with the `https` scheme.
    ///
    /// # Errors
    ///
    /// - `InvalidUri` if the URI is not an absolute `https` URI
    /// - `Timeout` if no response head arrives within the request timeout
    /// - `Transport` for connection, handshake or protocol failures,
    ///   including certificates rejected by the merged trust authority
    pub async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, HttpError> {
        validate_uri(request.uri(), &request.uri().to_string())?;

        let method = request.method().clone();
        let uri = request.uri().clone();

        match tokio::time::timeout(self.request_timeout, self.inner.request(request)).await {
            Ok(Ok(response)) => {
                tracing::trace!(%method, %uri, status = %response.status(), "response received");
                Ok(response)
            }
            Ok(Err(e)) => {
                tracing::debug!(%method, %uri, error = %e, "request failed");
                Err(e.into())
            }
            Err(_) => {
                let timeout = self.request_timeout;
                tracing::debug!(%method, %uri, ?timeout, "request timed out");
                Err(HttpError::Timeout(self.request_timeout))
            }
        }
    }

    /// Send a GET request with an empty body
    ///
    /// # Errors
    ///
    /// `InvalidUri` if `url` does not parse, plus everything [`send`](Self::send)
    /// returns.
    pub async fn get(&self, url: &str) -> Result<Response<Incoming>, HttpError> {
        let uri = parse_url(url)?;
        let request = Request::get(uri).body(Full::new(Bytes::new()))?;
        self.send(request).await
    }
}

fn parse_url(url: &str) -> Result<Uri, HttpError> {
    let uri: Uri = url.parse().map_err(|_: http::uri::InvalidUri| HttpError::InvalidUri {
        url: url.to_owned(),
        kind: InvalidUriKind::ParseError,
    })?;
    validate_uri(&uri, url)?;
    Ok(uri)
}

/// Require an absolute `https` URI with a host.
fn validate_uri(uri: &Uri, url: &str) -> Result<(), HttpError> {
    if uri.authority().is_none() {
        return Err(HttpError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::MissingAuthority,
        });
    }

    if uri.scheme_str() != Some("https") {
        return Err(HttpError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::NotHttps,
        });
    }

    Ok(())
}
