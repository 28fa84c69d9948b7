//! Uploaded file handles.

use bytes::Bytes;
use futures_util::Stream;
use std::convert::Infallible;
use std::fmt;

/// Handle to a binary part of a multipart upload.
///
/// The decoder creates one per declared upload and binds it into the request
/// variables. The payload is reference-counted, so cloning a handle (for
/// example when one file is bound at several paths) never copies the data.
/// The buffer is released when the last handle is dropped at the end of the
/// request.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadRef {
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadRef {
    /// Creates a new upload handle.
    #[must_use]
    pub fn new(filename: Option<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            filename,
            content_type,
            data,
        }
    }

    /// Returns the client-supplied file name, if any.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Returns the declared media type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns the byte length of the upload.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns the raw bytes.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Reads the upload as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid UTF-8.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.data)
    }

    /// Returns the upload as a single-chunk byte stream.
    pub fn stream(&self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures_util::stream::iter([Ok(self.data.clone())])
    }
}

impl fmt::Debug for UploadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRef")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn test_upload_accessors() {
        let upload = UploadRef::new(
            Some("a.txt".to_string()),
            Some("text/plain".to_string()),
            Bytes::from_static(b"hello"),
        );

        assert_eq!(upload.filename(), Some("a.txt"));
        assert_eq!(upload.content_type(), Some("text/plain"));
        assert_eq!(upload.size(), 5);
        assert_eq!(upload.text().unwrap(), "hello");
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        let upload = UploadRef::new(None, None, Bytes::from_static(&[0xff, 0xfe]));
        assert!(upload.text().is_err());
    }

    #[tokio::test]
    async fn test_stream_yields_content() {
        let upload = UploadRef::new(None, None, Bytes::from_static(b"abc"));
        let chunks: Vec<_> = upload.stream().collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), &Bytes::from_static(b"abc"));
    }

    #[test]
    fn test_debug_omits_payload() {
        let upload = UploadRef::new(None, None, Bytes::from_static(b"secret"));
        let debug = format!("{upload:?}");
        assert!(debug.contains("size: 6"));
        assert!(!debug.contains("secret"));
    }
}
