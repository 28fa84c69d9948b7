//! # Daedalus Test
//!
//! In-memory testing for the Daedalus GraphQL pipeline. Requests go through
//! the full plugin lifecycle without binding a port.
//!
//! - [`TestClient`] sends requests into a [`Lifecycle`](daedalus_middleware::Lifecycle)
//! - [`TestRequestBuilder`] adds headers, query strings, JSON and multipart bodies
//! - [`TestResponse`] reads the body and offers assertions
//! - [`MockEngine`] answers operations from a script and records what it ran
//!
//! ## Example
//!
//! ```ignore
//! use daedalus_test::{MockEngine, MultipartBuilder, TestClient};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn upload_reaches_the_engine() {
//!     let engine = MockEngine::echo();
//!     let calls = engine.calls();
//!     let client = TestClient::for_engine(engine);
//!
//!     let response = client
//!         .post("/graphql")
//!         .multipart(
//!             MultipartBuilder::new()
//!                 .operations(&json!({"query": "mutation ($f: Upload!) { f(f: $f) }", "variables": {"f": null}}))
//!                 .map(&json!({"0": ["variables.f"]}))
//!                 .file("0", "a.txt", "text/plain", "hello"),
//!         )
//!         .send()
//!         .await;
//!
//!     response.assert_status(http::StatusCode::OK);
//!     assert_eq!(response.json_value().unwrap()["data"]["variables"]["f"], "hello");
//!     assert_eq!(calls.len(), 1);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod engine;
mod error;
mod multipart;
mod request;
mod response;

pub use client::TestClient;
pub use engine::{CallLog, MockEngine, RecordedCall};
pub use error::TestError;
pub use multipart::MultipartBuilder;
pub use request::TestRequestBuilder;
pub use response::TestResponse;
