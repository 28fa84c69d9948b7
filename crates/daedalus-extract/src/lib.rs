//! # Daedalus Extract
//!
//! Request parsing strategies for the Daedalus GraphQL server.
//!
//! Each strategy is a [`RequestParser`] with an [`accepts`](ParseStrategy::accepts)
//! predicate over the request head. The lifecycle installs the matching
//! strategy; when none matches, the no-op parser yields empty parameters.
//!
//! | Strategy | Method | Content type |
//! |----------|--------|--------------|
//! | [`QueryStringParser`] | `GET` | any |
//! | [`JsonParser`] | `POST` | `application/json`, `*/*+json` |
//! | [`FormParser`] | `POST` | `application/x-www-form-urlencoded` |
//! | [`GraphQLBodyParser`] | `POST` | `application/graphql` |
//! | [`MultipartParser`] | `POST` | `multipart/form-data` |
//!
//! ## Example
//!
//! ```rust
//! use daedalus_extract::{ParseStrategy, QueryStringParser};
//! use daedalus_core::body;
//!
//! let (head, _) = http::Request::get("/graphql?query={greetings}")
//!     .body(body::empty())
//!     .unwrap()
//!     .into_parts();
//!
//! assert!(QueryStringParser.accepts(&head));
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod content;
mod form;
mod json;
pub mod multipart;
mod path;
mod query;

pub use content::{read_body, DEFAULT_MAX_BODY_SIZE};
pub use daedalus_core::RequestParser;
pub use form::FormParser;
pub use json::{GraphQLBodyParser, JsonParser};
pub use multipart::{MultipartLimits, MultipartParser};
pub use path::bind_at_path;
pub use query::{params_from_query_string, QueryStringParser};

use http::request::Parts;

/// A request parser that knows which requests it handles.
pub trait ParseStrategy: RequestParser {
    /// Returns `true` if this strategy should parse the request.
    fn accepts(&self, head: &Parts) -> bool;
}
