//! Per-instance identity.

use std::fmt;
use uuid::Uuid;

/// Response header carrying the server identity on health responses.
pub const SERVER_ID_HEADER: &str = "x-daedalus-server-id";

/// A random id minted once per server instance.
///
/// The readiness probe compares it against the id returned by its own
/// health endpoint to prove it reached this instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerIdentity(String);

impl ServerIdentity {
    /// Mints a new identity (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wraps an existing id.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identities_are_unique_v7() {
        let a = ServerIdentity::generate();
        let b = ServerIdentity::generate();
        assert_ne!(a, b);
        assert_eq!(Uuid::parse_str(a.as_str()).unwrap().get_version_num(), 7);
    }
}
