use anyhow::{bail, Result};
use serde_json::Value;

/// Normalize the source's collapsed one-to-many representation.
///
/// The catalog XML renders a child relationship as a bare object when exactly
/// one child exists and as an array when more than one does, with nothing in
/// the document marking which case applies. Every nesting boundary goes
/// through here so no projector ever sees a bare singleton.
pub fn resolve(node: Option<&Value>) -> Vec<&Value> {
    match node {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    }
}

/// `resolve` applied at the end of an optional path walk.
pub fn children<'a>(node: &'a Value, path: &[&str]) -> Vec<&'a Value> {
    resolve(walk(node, path))
}

/// Optional chaining: `walk(term, &["term", "subjects", "subject"])`.
pub fn walk<'a>(node: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = node;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

/// Scalar at `path` rendered as text. Absent, empty, and non-scalar values
/// are all `None` so optional columns stay NULL instead of "".
pub fn text(node: &Value, path: &[&str]) -> Option<String> {
    match walk(node, path)? {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer at `path`; accepts a number or a numeric string.
pub fn int(node: &Value, path: &[&str]) -> Option<i64> {
    match walk(node, path)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integer that is part of a primary key. Its absence is a data-shape
/// violation and aborts the traversal rather than silently defaulting.
pub fn require_int(node: &Value, path: &[&str], what: &str) -> Result<i64> {
    match int(node, path) {
        Some(n) => Ok(n),
        None => bail!("missing or non-numeric {} at {:?}", what, path),
    }
}

/// Text that is part of a primary key, e.g. a subject code.
pub fn require_text(node: &Value, path: &[&str], what: &str) -> Result<String> {
    match text(node, path) {
        Some(s) => Ok(s),
        None => bail!("missing {} at {:?}", what, path),
    }
}

/// Guard for nodes that must be trees; any other type is a shape violation.
pub fn require_object<'a>(node: &'a Value, what: &str) -> Result<&'a Value> {
    if node.is_object() {
        Ok(node)
    } else {
        bail!("expected {} to be an element, got {}", what, type_name(node))
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
