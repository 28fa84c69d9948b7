//! HTTP body and message types shared by every Daedalus crate.
//!
//! Requests and responses carry a boxed body so that multipart uploads can be
//! decoded as a stream and subscription results can be written incrementally.

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full, StreamBody};
use std::future::Future;
use std::pin::Pin;

/// A boxed, thread-safe error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed future, used at every async trait seam.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The body type for requests and responses.
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// HTTP request type used by the pipeline.
pub type Request = http::Request<Body>;

/// HTTP response type produced by the pipeline.
pub type Response = http::Response<Body>;

/// Creates a body holding a complete buffer.
pub fn full(data: impl Into<Bytes>) -> Body {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Creates an empty body.
pub fn empty() -> Body {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Creates a body from a stream of chunks.
pub fn stream<S, E>(chunks: S) -> Body
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    StreamBody::new(
        chunks
            .map_ok(http_body::Frame::data)
            .map_err(Into::into),
    )
    .boxed_unsync()
}

/// Converts any compatible body into a [`Body`].
pub fn boxed<B>(body: B) -> Body
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// Collects a body into a single buffer.
///
/// # Errors
///
/// Returns the underlying body error if a frame cannot be read.
pub async fn to_bytes(body: Body) -> Result<Bytes, BoxError> {
    Ok(body.collect().await?.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_full_body_roundtrip() {
        let bytes = to_bytes(full("hello")).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_empty_body() {
        let bytes = to_bytes(empty()).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_stream_body_concatenates_chunks() {
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
        ]);
        let bytes = to_bytes(stream(chunks)).await.unwrap();
        assert_eq!(&bytes[..], b"ab");
    }
}
