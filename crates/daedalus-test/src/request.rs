//! Test request building.

use crate::client::TestClient;
use crate::error::TestError;
use crate::multipart::MultipartBuilder;
use crate::response::TestResponse;
use bytes::Bytes;
use daedalus_core::{body, Request};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;

/// A request bound to a [`TestClient`].
///
/// Builder errors are kept until [`send`](Self::send) so calls can be chained.
#[must_use]
pub struct TestRequestBuilder<'a> {
    client: &'a TestClient,
    method: Method,
    uri: String,
    query: Vec<String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    error: Option<TestError>,
}

impl<'a> TestRequestBuilder<'a> {
    pub(crate) fn new(client: &'a TestClient, method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            client,
            method,
            uri: uri.as_ref().to_string(),
            query: Vec::new(),
            headers: client.default_headers().clone(),
            body: None,
            error: None,
        }
    }

    fn fail(mut self, error: TestError) -> Self {
        self.error.get_or_insert(error);
        self
    }

    /// Sets a header, replacing any previous value.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = match HeaderName::try_from(name.as_ref()) {
            Ok(name) => name,
            Err(e) => return self.fail(TestError::InvalidHeader(e.to_string())),
        };
        let value = match HeaderValue::try_from(value.as_ref()) {
            Ok(value) => value,
            Err(e) => return self.fail(TestError::InvalidHeader(e.to_string())),
        };
        self.headers.insert(name, value);
        self
    }

    /// Sets the `Accept` header.
    pub fn accept(self, accept: impl AsRef<str>) -> Self {
        self.header(header::ACCEPT.as_str(), accept)
    }

    /// Appends URL-encoded query parameters.
    ///
    /// ```ignore
    /// client.get("/graphql").query(&[("query", "{ hello }")]).send().await;
    /// ```
    pub fn query<T: Serialize + ?Sized>(mut self, params: &T) -> Self {
        match serde_urlencoded::to_string(params) {
            Ok(encoded) if encoded.is_empty() => self,
            Ok(encoded) => {
                self.query.push(encoded);
                self
            }
            Err(e) => self.fail(TestError::RequestBuild(format!("invalid query: {e}"))),
        }
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = Some(Bytes::from(bytes));
                self.header(header::CONTENT_TYPE.as_str(), "application/json")
            }
            Err(e) => self.fail(TestError::Json(e)),
        }
    }

    /// Sets a GraphQL-over-HTTP JSON body from a query and variables.
    pub fn graphql(self, query: &str, variables: serde_json::Value) -> Self {
        self.json(&serde_json::json!({ "query": query, "variables": variables }))
    }

    /// Sets a `multipart/form-data` body.
    pub fn multipart(mut self, multipart: MultipartBuilder) -> Self {
        self.body = Some(multipart.to_bytes());
        self.header(header::CONTENT_TYPE.as_str(), multipart.content_type())
    }

    /// Builds the request without sending it.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded by the builder, or an error if the
    /// URI is invalid.
    pub fn build(self) -> Result<Request, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut uri = self.uri;
        if !self.query.is_empty() {
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&self.query.join("&"));
        }

        let mut request = http::Request::builder()
            .method(self.method)
            .uri(uri)
            .body(self.body.map_or_else(body::empty, body::full))
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;
        *request.headers_mut() = self.headers;
        Ok(request)
    }

    /// Sends the request through the client's lifecycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built or the response body
    /// cannot be read.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let client = self.client;
        let request = self.build()?;
        client.send_request(request).await
    }

    /// Sends the request through the client's lifecycle.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or read.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{MockEngine, TestClient};
    use http::Method;

    #[test]
    fn test_query_is_appended() {
        let client = TestClient::for_engine(MockEngine::new());
        let request = client
            .get("/graphql?operationName=A")
            .query(&[("query", "{ a }")])
            .build()
            .unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(
            request.uri().to_string(),
            "/graphql?operationName=A&query=%7B+a+%7D"
        );
    }

    #[test]
    fn test_invalid_header_is_reported_on_build() {
        let client = TestClient::for_engine(MockEngine::new());
        let result = client
            .post("/graphql")
            .header("bad header", "x")
            .json(&serde_json::json!({}))
            .build();
        assert!(matches!(result, Err(crate::TestError::InvalidHeader(_))));
    }

    #[test]
    fn test_json_sets_content_type() {
        let client = TestClient::for_engine(MockEngine::new());
        let request = client
            .post("/graphql")
            .graphql("{ a }", serde_json::json!({}))
            .build()
            .unwrap();
        assert_eq!(request.headers()["content-type"], "application/json");
    }
}
