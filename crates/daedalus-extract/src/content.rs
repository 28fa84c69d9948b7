//! Content-type matching and bounded body reads.

use bytes::Bytes;
use daedalus_core::body::Body;
use daedalus_core::{DaedalusError, MultipartLimit};
use http::request::Parts;
use http::{header, Method};
use http_body_util::{BodyExt, LengthLimitError, Limited};

/// Default maximum request body size (64 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Parses the request's `Content-Type`, if present and well formed.
pub(crate) fn content_type(head: &Parts) -> Option<mime::Mime> {
    head.headers
        .get(header::CONTENT_TYPE)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Returns `true` for a POST whose media type satisfies `matches`.
pub(crate) fn is_post_with(head: &Parts, matches: impl Fn(&mime::Mime) -> bool) -> bool {
    head.method == Method::POST && content_type(head).is_some_and(|m| matches(&m))
}

/// Reads a whole body, refusing to buffer more than `max` bytes.
///
/// # Errors
///
/// Returns [`DaedalusError::PayloadTooLarge`] when the limit is exceeded and
/// [`DaedalusError::RequestParse`] when the body cannot be read.
pub async fn read_body(body: Body, max: usize) -> Result<Bytes, DaedalusError> {
    // Boxed with an explicit `Send` bound so callers' futures can be proven
    // `Send` (works around a higher-ranked lifetime inference limitation).
    let collect: daedalus_core::BoxFuture<'static, _> = Box::pin(Limited::new(body, max).collect());
    match collect.await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(DaedalusError::payload_too_large(
            MultipartLimit::BodySize,
            max,
        )),
        Err(e) => Err(DaedalusError::request_parse(format!(
            "failed to read request body: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::body;

    fn head(method: Method, content_type: Option<&str>) -> Parts {
        let mut builder = http::Request::builder().method(method).uri("/graphql");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_content_type_with_parameters() {
        let parts = head(Method::POST, Some("application/json; charset=utf-8"));
        let mime = content_type(&parts).unwrap();
        assert_eq!(mime.essence_str(), "application/json");
    }

    #[test]
    fn test_is_post_with_rejects_get() {
        let parts = head(Method::GET, Some("application/json"));
        assert!(!is_post_with(&parts, |_| true));
    }

    #[test]
    fn test_missing_content_type() {
        let parts = head(Method::POST, None);
        assert!(content_type(&parts).is_none());
        assert!(!is_post_with(&parts, |_| true));
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let bytes = read_body(body::full("abc"), 3).await.unwrap();
        assert_eq!(&bytes[..], b"abc");
    }

    #[tokio::test]
    async fn test_read_body_over_limit() {
        let err = read_body(body::full("abcd"), 3).await.unwrap_err();
        assert!(matches!(
            err,
            DaedalusError::PayloadTooLarge {
                limit: MultipartLimit::BodySize,
                max: 3
            }
        ));
    }
}
