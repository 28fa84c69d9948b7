//! Normalized GraphQL request parameters.

use crate::engine::Document;
use crate::error::DaedalusError;
use crate::value::Value;
use indexmap::IndexMap;
use serde::Deserialize;

/// The query of a GraphQL request.
#[derive(Debug, Clone)]
pub enum Query {
    /// Query source text.
    Text(String),
    /// A document the engine already parsed.
    Document(Document),
}

impl Query {
    /// Returns the source text, if this is not a pre-parsed document.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Document(_) => None,
        }
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// The normalized shape of a GraphQL request.
///
/// Every request parser produces one of these. Absent fields stay `None`;
/// an explicit JSON `null` is treated the same as an absent field.
#[derive(Debug, Clone, Default)]
pub struct GraphQLParams {
    /// The query text or document.
    pub query: Option<Query>,
    /// The operation to run when the document holds several.
    pub operation_name: Option<String>,
    /// Operation variables, in the order the client sent them.
    pub variables: Option<IndexMap<String, Value>>,
    /// Protocol extensions.
    pub extensions: Option<IndexMap<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireParams {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    operation_name: Option<String>,
    #[serde(default)]
    variables: Option<IndexMap<String, Value>>,
    #[serde(default)]
    extensions: Option<IndexMap<String, Value>>,
}

impl From<WireParams> for GraphQLParams {
    fn from(wire: WireParams) -> Self {
        Self {
            query: wire.query.map(Query::Text),
            operation_name: wire.operation_name,
            variables: wire.variables,
            extensions: wire.extensions,
        }
    }
}

impl GraphQLParams {
    /// Creates parameters holding only a query.
    #[must_use]
    pub fn query(query: impl Into<Query>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Adds a variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Returns the query source text, if present as text.
    pub fn query_text(&self) -> Option<&str> {
        self.query.as_ref().and_then(Query::as_text)
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        self.query.is_none()
            && self.operation_name.is_none()
            && self.variables.is_none()
            && self.extensions.is_none()
    }

    /// Decodes parameters from a JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`DaedalusError::RequestParse`] if the body is not a JSON
    /// object of the expected shape.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, DaedalusError> {
        serde_json::from_slice::<WireParams>(body)
            .map(Into::into)
            .map_err(|e| DaedalusError::request_parse(format!("invalid JSON body: {e}")))
    }

    /// Decodes parameters from an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DaedalusError::RequestParse`] if the value is not an object
    /// of the expected shape.
    pub fn from_value(value: Value) -> Result<Self, DaedalusError> {
        let json = serde_json::to_value(&value)
            .map_err(|e| DaedalusError::request_parse(e.to_string()))?;
        serde_json::from_value::<WireParams>(json)
            .map(Into::into)
            .map_err(|e| DaedalusError::request_parse(format!("invalid operations: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_full() {
        let params = GraphQLParams::from_json_slice(
            br#"{"query":"{a}","operationName":"Op","variables":{"x":1},"extensions":{"e":true}}"#,
        )
        .unwrap();

        assert_eq!(params.query_text(), Some("{a}"));
        assert_eq!(params.operation_name.as_deref(), Some("Op"));
        assert_eq!(params.variables.unwrap()["x"], Value::Number(1.into()));
        assert_eq!(params.extensions.unwrap()["e"], Value::Bool(true));
    }

    #[test]
    fn test_from_json_nulls_are_absent() {
        let params =
            GraphQLParams::from_json_slice(br#"{"query":"{a}","variables":null}"#).unwrap();
        assert!(params.variables.is_none());
        assert!(params.extensions.is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = GraphQLParams::from_json_slice(b"{not json").unwrap_err();
        assert!(matches!(err, DaedalusError::RequestParse(_)));
    }

    #[test]
    fn test_from_json_rejects_non_object_variables() {
        let err = GraphQLParams::from_json_slice(br#"{"query":"{a}","variables":[1]}"#)
            .unwrap_err();
        assert!(matches!(err, DaedalusError::RequestParse(_)));
    }

    #[test]
    fn test_builder_helpers() {
        let params = GraphQLParams::query("{a}")
            .with_operation_name("A")
            .with_variable("id", "1");
        assert_eq!(params.query_text(), Some("{a}"));
        assert_eq!(params.variables.unwrap()["id"], Value::from("1"));
        assert!(GraphQLParams::default().is_empty());
    }
}
