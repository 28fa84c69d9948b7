//! `multipart/form-data` bodies following the GraphQL multipart request
//! convention.

use bytes::Bytes;
use serde::Serialize;

const BOUNDARY: &str = "daedalus-test-boundary";

enum Part {
    Field {
        name: String,
        value: Bytes,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        content: Bytes,
    },
}

/// Builds a multipart request body.
///
/// # Example
///
/// ```
/// use daedalus_test::MultipartBuilder;
/// use serde_json::json;
///
/// let body = MultipartBuilder::new()
///     .operations(&json!({
///         "query": "mutation ($file: Upload!) { readFile(file: $file) }",
///         "variables": { "file": null }
///     }))
///     .map(&json!({ "0": ["variables.file"] }))
///     .file("0", "hello.txt", "text/plain", "hello");
///
/// assert!(body.content_type().starts_with("multipart/form-data; boundary="));
/// ```
#[must_use]
pub struct MultipartBuilder {
    parts: Vec<Part>,
}

impl Default for MultipartBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBuilder {
    /// Creates an empty body.
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Adds the `operations` field.
    ///
    /// # Panics
    ///
    /// Panics if `value` cannot be serialized.
    pub fn operations<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.json_field("operations", value)
    }

    /// Adds the `map` field.
    ///
    /// # Panics
    ///
    /// Panics if `value` cannot be serialized.
    pub fn map<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.json_field("map", value)
    }

    fn json_field<T: Serialize + ?Sized>(self, name: &str, value: &T) -> Self {
        let bytes = serde_json::to_vec(value).expect("multipart field should serialize");
        self.field(name, bytes)
    }

    /// Adds a plain field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.parts.push(Part::Field {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a file part.
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(Part::File {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            content: content.into(),
        });
        self
    }

    /// Returns the `Content-Type` header for this body.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    /// Encodes the body.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Field { name, value } => {
                    out.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    out.extend_from_slice(value);
                }
                Part::File {
                    name,
                    filename,
                    content_type,
                    content,
                } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(content);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Bytes::from(out)
    }
}
