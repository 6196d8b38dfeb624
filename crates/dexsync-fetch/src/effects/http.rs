use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Status line, validators and body of one GET response.
pub struct HttpResponse<E> {
    pub status:        u16,
    /// Final URL after redirects.
    pub effective_url: String,
    pub etag:          Option<String>,
    pub last_modified: Option<String>,
    pub body:          BoxStream<'static, Result<Bytes, E>>,
}

#[cfg(test)]
impl<E: Send + 'static> HttpResponse<E> {
    /// A response with an empty body and no validators.
    pub(crate) fn empty(status: u16, effective_url: impl Into<String>) -> Self {
        Self {
            status,
            effective_url: effective_url.into(),
            etag: None,
            last_modified: None,
            body: Box::pin(futures_util::stream::empty()),
        }
    }
}

impl<E> fmt::Debug for HttpResponse<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("effective_url", &self.effective_url)
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .field("body", &"{ ... }")
            .finish()
    }
}

/// Asynchronous HTTP client abstraction.
///
/// This trait provides the minimal interface the engine needs. Implementations
/// follow redirects, pool connections per host and map their own failures
/// (DNS, connect, TLS) to `Self::Error`. Non-success statuses are NOT errors:
/// they are returned as a response and classified by the engine.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Stub implementations for testing
pub trait HttpClient: Send + Sync {
    /// Error type for transport failures.
    type Error: std::error::Error + Send + 'static;

    /// Send a GET request with the given headers.
    ///
    /// Resolves once the status line and headers have arrived; the body is
    /// streamed afterwards through [`HttpResponse::body`].
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send;
}

impl<T: HttpClient> HttpClient for &T {
    type Error = T::Error;

    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send {
        (**self).get(url, headers)
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use crate::data::EngineOptions;
    use crate::error::{FetchError, Result};
    use reqwest::header::{ETAG, HeaderMap, HeaderName, LAST_MODIFIED};

    /// Production HTTP client implementation using reqwest.
    ///
    /// The underlying connection pool is shared by clones.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Build a client with default engine options.
        pub fn new() -> Result<Self> { Self::from_options(&EngineOptions::default()) }

        /// Build a client tuned for an engine configured with `options`.
        ///
        /// Keeps up to `window` idle connections per host so a saturated
        /// window reuses them across admissions.
        pub fn from_options(options: &EngineOptions) -> Result<Self> {
            let client = reqwest::Client::builder()
                .user_agent(options.user_agent.as_str())
                .connect_timeout(options.transfer_timeout)
                .pool_max_idle_per_host(options.effective_window())
                .build()
                .map_err(|e| FetchError::ClientInit(e.to_string()))?;
            Ok(Self { client })
        }

        pub fn from_client(client: reqwest::Client) -> Self { Self { client } }
    }

    fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> std::result::Result<HttpResponse<Self::Error>, Self::Error> {
            let mut request = self.client.get(url);

            for (key, value) in headers {
                request = request.header(key, value);
            }

            let response = request.send().await?;
            let status = response.status().as_u16();
            let effective_url = response.url().to_string();
            let etag = header_value(response.headers(), ETAG);
            let last_modified = header_value(response.headers(), LAST_MODIFIED);

            Ok(HttpResponse {
                status,
                effective_url,
                etag,
                last_modified,
                body: Box::pin(response.bytes_stream()),
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
