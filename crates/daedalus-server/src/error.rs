//! Server error types.

use thiserror::Error;

/// Errors raised while starting or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be parsed or bound.
    #[error("Bind error: {0}")]
    BindError(String),

    /// The server was built without an engine.
    #[error("Missing engine: call `engine` or `envelop` on the builder")]
    MissingEngine,

    /// The accept loop ended abnormally.
    #[error("Server task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
