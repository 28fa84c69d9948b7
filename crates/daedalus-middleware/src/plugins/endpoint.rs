//! Endpoint guard.

use crate::plugin::{Capabilities, OnRequestDone, OnRequestPayload, Plugin};
use crate::response;
use daedalus_core::{BoxFuture, DaedalusError};

/// Answers requests outside the GraphQL endpoint with `404 Not Found`.
///
/// Register it after plugins that serve their own paths (such as health
/// checks) so those still get a chance to answer.
#[derive(Debug, Clone)]
pub struct EndpointPlugin {
    endpoint: String,
}

impl EndpointPlugin {
    /// Guards `endpoint`, e.g. `/graphql`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Returns the guarded path.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn matches(&self, path: &str) -> bool {
        path == self.endpoint || path.trim_end_matches('/') == self.endpoint.trim_end_matches('/')
    }
}

impl Plugin for EndpointPlugin {
    fn name(&self) -> &'static str {
        "endpoint"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ON_REQUEST
    }

    fn on_request<'a>(
        &'a self,
        mut payload: OnRequestPayload<'a>,
    ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
        Box::pin(async move {
            let path = payload.request().uri.path().to_string();
            if !self.matches(&path) {
                tracing::debug!(path = %path, "request outside the GraphQL endpoint");
                let err = DaedalusError::NotFound { path };
                payload.end_response(response::error(&err, false));
            }
            Ok(None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, get, StubEngine};
    use crate::Lifecycle;
    use daedalus_core::ServerContext;
    use http::StatusCode;
    use std::sync::Arc;

    #[test]
    fn test_matching_ignores_trailing_slash() {
        let guard = EndpointPlugin::new("/graphql");
        assert!(guard.matches("/graphql"));
        assert!(guard.matches("/graphql/"));
        assert!(!guard.matches("/graphiql"));
        assert!(!guard.matches("/"));
    }

    #[tokio::test]
    async fn test_other_paths_get_not_found() {
        let lifecycle = Lifecycle::builder(Arc::new(StubEngine))
            .plugin(EndpointPlugin::new("/graphql"))
            .build();

        let response = lifecycle
            .handle(get("/other?query={a}"), &ServerContext::new())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("/other"));
    }
}
