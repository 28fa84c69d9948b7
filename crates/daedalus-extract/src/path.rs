//! Dotted-path assignment into variables.

use daedalus_core::{DaedalusError, Value};
use indexmap::IndexMap;

/// Replaces the value at a dotted path such as `files.1` or `input.avatar`.
///
/// Numeric segments index lists; any other segment keys an object. The
/// location must already exist: the client is expected to send a `null`
/// placeholder wherever an upload will be bound.
///
/// # Errors
///
/// Returns [`DaedalusError::RequestParse`] if any segment does not resolve.
///
/// # Example
///
/// ```rust
/// use daedalus_core::Value;
/// use daedalus_extract::bind_at_path;
/// use indexmap::IndexMap;
///
/// let mut vars: IndexMap<String, Value> =
///     serde_json::from_str(r#"{"files":[null,null]}"#).unwrap();
/// bind_at_path(&mut vars, "files.1", Value::from("x")).unwrap();
/// assert_eq!(vars["files"], serde_json::from_str::<Value>(r#"[null,"x"]"#).unwrap());
/// ```
pub fn bind_at_path(
    root: &mut IndexMap<String, Value>,
    path: &str,
    value: Value,
) -> Result<(), DaedalusError> {
    let missing = || DaedalusError::request_parse(format!("path `{path}` does not exist"));

    let mut segments = path.split('.');
    let first = segments.next().filter(|s| !s.is_empty()).ok_or_else(missing)?;
    let mut slot = root.get_mut(first).ok_or_else(missing)?;

    for segment in segments {
        slot = match slot {
            Value::Object(map) => map.get_mut(segment),
            Value::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get_mut(index)),
            _ => None,
        }
        .ok_or_else(missing)?;
    }

    *slot = value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(json: &str) -> IndexMap<String, Value> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_bind_top_level() {
        let mut v = vars(r#"{"file":null}"#);
        bind_at_path(&mut v, "file", Value::from("up")).unwrap();
        assert_eq!(v["file"], Value::from("up"));
    }

    #[test]
    fn test_bind_nested_object_in_list() {
        let mut v = vars(r#"{"input":{"docs":[{"file":null}]}}"#);
        bind_at_path(&mut v, "input.docs.0.file", Value::from("up")).unwrap();
        assert_eq!(
            v["input"].pointer("docs.0.file"),
            Some(&Value::from("up"))
        );
    }

    #[test]
    fn test_bind_missing_key() {
        let mut v = vars(r#"{"file":null}"#);
        assert!(bind_at_path(&mut v, "other", Value::Null).is_err());
        assert!(bind_at_path(&mut v, "file.inner", Value::Null).is_err());
    }

    #[test]
    fn test_bind_index_out_of_range() {
        let mut v = vars(r#"{"files":[null]}"#);
        assert!(bind_at_path(&mut v, "files.1", Value::Null).is_err());
        assert!(bind_at_path(&mut v, "files.x", Value::Null).is_err());
    }

    #[test]
    fn test_bind_empty_path() {
        let mut v = vars(r#"{"":null}"#);
        assert!(bind_at_path(&mut v, "", Value::Null).is_err());
    }
}
