//! Outbound HTTP used by the readiness probe.

use bytes::Bytes;
use daedalus_core::{BoxError, BoxFuture};
use http::{HeaderMap, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// Default timeout for a probe request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A buffered HTTP response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

/// Issues `GET` requests.
pub trait Fetch: Send + Sync + 'static {
    /// Fetches `uri` and buffers the response.
    fn get(&self, uri: Uri) -> BoxFuture<'_, Result<FetchResponse, BoxError>>;
}

/// [`Fetch`] over plain HTTP using the hyper client.
#[derive(Debug, Clone)]
pub struct HyperFetch {
    client: Client<HttpConnector, Empty<Bytes>>,
    timeout: Duration,
}

impl HyperFetch {
    /// Creates a client with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Creates a client with the given timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            timeout,
        }
    }

    async fn fetch(&self, uri: Uri) -> Result<FetchResponse, BoxError> {
        let request = http::Request::get(uri).body(Empty::new())?;
        let response = tokio::time::timeout(self.timeout, self.client.request(request)).await??;
        let (parts, body) = response.into_parts();
        let body = tokio::time::timeout(self.timeout, body.collect())
            .await??
            .to_bytes();
        Ok(FetchResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

impl Default for HyperFetch {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HyperFetch {
    fn get(&self, uri: Uri) -> BoxFuture<'_, Result<FetchResponse, BoxError>> {
        Box::pin(self.fetch(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_refused_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetch = HyperFetch::with_timeout(Duration::from_secs(1));
        let uri: Uri = format!("http://{addr}/health").parse().unwrap();
        assert!(fetch.get(uri).await.is_err());
    }
}
