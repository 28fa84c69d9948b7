//! Multipart upload decoding.
//!
//! Implements the GraphQL multipart request convention: a `multipart/form-data`
//! body carrying an `operations` field (the request parameters, with `null`
//! placeholders where files go), a `map` field (decimal key to list of
//! variable paths) and one binary part per key.
//!
//! ```text
//! operations: {"query":"mutation($f:File!){read(file:$f)}","variables":{"file":null}}
//! map:        {"0":["variables.file"]}
//! 0:          <file bytes>
//! ```
//!
//! Parts are read as a stream. Every limit is checked as each chunk arrives,
//! so an oversized part is rejected before it is fully buffered. Binary parts
//! that arrive before `operations`/`map` are held until both are known.

use crate::content::{content_type, is_post_with, DEFAULT_MAX_BODY_SIZE};
use crate::path::bind_at_path;
use crate::ParseStrategy;
use bytes::{Bytes, BytesMut};
use daedalus_core::body::Body;
use daedalus_core::{
    BoxFuture, DaedalusError, GraphQLParams, MultipartLimit, RequestParser, UploadRef, Value,
};
use http::request::Parts;
use http::HeaderMap;
use http_body_util::BodyDataStream;
use indexmap::IndexMap;

/// Default maximum size of a single file (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Default maximum number of files.
pub const DEFAULT_MAX_FILES: usize = 16;

/// Default maximum size of a non-file field (1 MiB).
pub const DEFAULT_MAX_FIELD_SIZE: usize = 1024 * 1024;

/// Default maximum cumulative header size (16 KiB).
pub const DEFAULT_MAX_HEADER_SIZE: usize = 16 * 1024;

/// Resource limits for multipart decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartLimits {
    /// Maximum bytes in one file part.
    pub file_size: usize,
    /// Maximum number of file parts.
    pub files: usize,
    /// Maximum bytes in `operations` or `map`.
    pub field_size: usize,
    /// Maximum header bytes summed over all parts.
    pub header_size: usize,
    /// Maximum bytes in the whole body.
    pub body_size: usize,
}

impl Default for MultipartLimits {
    fn default() -> Self {
        Self {
            file_size: DEFAULT_MAX_FILE_SIZE,
            files: DEFAULT_MAX_FILES,
            field_size: DEFAULT_MAX_FIELD_SIZE,
            header_size: DEFAULT_MAX_HEADER_SIZE,
            body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl MultipartLimits {
    /// Create limits with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum file size.
    #[must_use]
    pub const fn file_size(mut self, bytes: usize) -> Self {
        self.file_size = bytes;
        self
    }

    /// Set the maximum number of files.
    #[must_use]
    pub const fn files(mut self, count: usize) -> Self {
        self.files = count;
        self
    }

    /// Set the maximum field size.
    #[must_use]
    pub const fn field_size(mut self, bytes: usize) -> Self {
        self.field_size = bytes;
        self
    }

    /// Set the maximum cumulative header size.
    #[must_use]
    pub const fn header_size(mut self, bytes: usize) -> Self {
        self.header_size = bytes;
        self
    }

    /// Set the maximum body size.
    #[must_use]
    pub const fn body_size(mut self, bytes: usize) -> Self {
        self.body_size = bytes;
        self
    }
}

/// Parses `multipart/form-data` upload requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartParser {
    limits: MultipartLimits,
}

impl MultipartParser {
    /// Creates a parser with the given limits.
    #[must_use]
    pub const fn new(limits: MultipartLimits) -> Self {
        Self { limits }
    }

    /// Returns the configured limits.
    pub const fn limits(&self) -> &MultipartLimits {
        &self.limits
    }
}

impl RequestParser for MultipartParser {
    fn name(&self) -> &'static str {
        "multipart"
    }

    fn parse<'a>(
        &'a self,
        head: &'a Parts,
        body: Body,
    ) -> BoxFuture<'a, Result<GraphQLParams, DaedalusError>> {
        Box::pin(decode(head, body, self.limits))
    }
}

impl ParseStrategy for MultipartParser {
    fn accepts(&self, head: &Parts) -> bool {
        is_post_with(head, |m| {
            m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA
        })
    }
}

fn parse_error(message: impl Into<String>) -> DaedalusError {
    DaedalusError::request_parse(message)
}

fn multer_error(err: multer::Error, limits: &MultipartLimits) -> DaedalusError {
    match err {
        multer::Error::StreamSizeExceeded { .. } => {
            DaedalusError::payload_too_large(MultipartLimit::BodySize, limits.body_size)
        }
        other => parse_error(format!("malformed multipart body: {other}")),
    }
}

fn header_len(headers: &HeaderMap) -> usize {
    // name + ": " + value + CRLF
    headers
        .iter()
        .map(|(name, value)| name.as_str().len() + value.len() + 4)
        .sum()
}

async fn read_part(
    field: &mut multer::Field<'static>,
    max: usize,
    limit: MultipartLimit,
    limits: &MultipartLimits,
) -> Result<Bytes, DaedalusError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multer_error(e, limits))?
    {
        if buf.len() + chunk.len() > max {
            return Err(DaedalusError::payload_too_large(limit, max));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Decodes a multipart upload request into parameters with bound uploads.
///
/// # Errors
///
/// Returns [`DaedalusError::PayloadTooLarge`] as soon as any limit is
/// exceeded, and [`DaedalusError::RequestParse`] for a malformed body, a
/// missing `operations`/`map` field, an unresolvable path, or a file part
/// without a map entry (and vice versa).
pub async fn decode(
    head: &Parts,
    body: Body,
    limits: MultipartLimits,
) -> Result<GraphQLParams, DaedalusError> {
    let boundary = content_type(head)
        .and_then(|m| m.get_param(mime::BOUNDARY).map(|b| b.as_str().to_string()))
        .ok_or_else(|| parse_error("missing boundary in multipart Content-Type"))?;

    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(limits.body_size as u64));
    let mut multipart =
        multer::Multipart::with_constraints(BodyDataStream::new(body), boundary, constraints);

    let mut operations: Option<Bytes> = None;
    let mut map: Option<Bytes> = None;
    let mut files: IndexMap<String, UploadRef> = IndexMap::new();
    let mut header_bytes = 0usize;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multer_error(e, &limits))?
    {
        header_bytes += header_len(field.headers());
        if header_bytes > limits.header_size {
            return Err(DaedalusError::payload_too_large(
                MultipartLimit::HeaderSize,
                limits.header_size,
            ));
        }

        let name = field
            .name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| parse_error("multipart part without a name"))?;

        match name.as_str() {
            "operations" | "map" => {
                let slot = if name == "operations" {
                    &mut operations
                } else {
                    &mut map
                };
                if slot.is_some() {
                    return Err(parse_error(format!("duplicate multipart field `{name}`")));
                }
                let data = read_part(
                    &mut field,
                    limits.field_size,
                    MultipartLimit::FieldSize,
                    &limits,
                )
                .await?;
                *slot = Some(data);
            }
            _ => {
                if files.len() >= limits.files {
                    return Err(DaedalusError::payload_too_large(
                        MultipartLimit::Files,
                        limits.files,
                    ));
                }
                if files.contains_key(&name) {
                    return Err(parse_error(format!("duplicate file part `{name}`")));
                }
                let filename = field.file_name().map(ToOwned::to_owned);
                let media_type = field.content_type().map(ToString::to_string);
                let data = read_part(
                    &mut field,
                    limits.file_size,
                    MultipartLimit::FileSize,
                    &limits,
                )
                .await?;
                files.insert(name, UploadRef::new(filename, media_type, data));
            }
        }
    }

    let operations =
        operations.ok_or_else(|| parse_error("missing multipart field `operations`"))?;
    let map = map.ok_or_else(|| parse_error("missing multipart field `map`"))?;

    let mut params = GraphQLParams::from_json_slice(&operations)?;
    let map: IndexMap<String, Vec<String>> = serde_json::from_slice(&map)
        .map_err(|e| parse_error(format!("invalid multipart `map` field: {e}")))?;

    let bound = files.len();
    for (key, paths) in map {
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(parse_error(format!("map key `{key}` is not a decimal index")));
        }
        let upload = files
            .shift_remove(&key)
            .ok_or_else(|| parse_error(format!("no file part for map key `{key}`")))?;

        for path in paths {
            let rest = path
                .strip_prefix("variables.")
                .ok_or_else(|| parse_error(format!("path `{path}` is not under `variables`")))?;
            let variables = params
                .variables
                .as_mut()
                .ok_or_else(|| parse_error(format!("path `{path}` does not exist")))?;
            bind_at_path(variables, rest, Value::Upload(upload.clone()))?;
        }
    }

    if let Some(key) = files.keys().next() {
        return Err(parse_error(format!("file part `{key}` has no map entry")));
    }

    tracing::debug!(files = bound, "decoded multipart upload");
    Ok(params)
}
