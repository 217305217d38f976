//! Path navigation over JSON document trees
//!
//! Documents are stored as `serde_json::Value` trees. The engine only looks
//! inside a body at configured paths (id, revision, sequence id, column
//! projections, criteria fields), so everything it needs is here:
//!
//! - [`JsonPath`] / [`PathSegment`]: a parsed location such as `user.name`
//!   or `items[0].sku`
//! - [`get_at_path`] / [`get_or`]: read, with a default for absent paths
//! - [`set_at_path`]: write, creating intermediate containers
//! - [`extract_at_path`]: read-then-remove of the leaf
//! - [`fallback_at_path`]: write only if the path is currently absent
//!
//! All navigation functions are total. A segment that does not match the
//! container it lands on (a key into an array, an index into a scalar)
//! counts as "absent" when reading and is overwritten when writing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// JsonPath and PathSegment
// =============================================================================

/// Error type for JSON path parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Empty key in path
    #[error("empty key in path at position {0}")]
    EmptyKey(usize),
    /// Unclosed bracket
    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),
    /// Invalid array index
    #[error("invalid array index at position {0}: {1}")]
    InvalidIndex(usize, String),
    /// Unexpected character
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

/// A segment in a JSON path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object key: `.foo`
    Key(String),
    /// Array index: `[0]`
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A path into a JSON document
///
/// # Path Syntax
///
/// | Syntax | Meaning | Example |
/// |--------|---------|---------|
/// | `key` | Object property | `email` |
/// | `a.b` | Nested property | `address.city` |
/// | `a[n]` | Property then index | `tags[0]` |
/// | (empty) | Root | `` |
///
/// Paths serialize as their string form so they can be written in TOML
/// configuration.
///
/// # Examples
///
/// ```
/// use docstore_core::json::JsonPath;
///
/// let path: JsonPath = "address.city".parse().unwrap();
/// assert_eq!(path, JsonPath::root().key("address").key("city"));
/// assert_eq!(path.to_string(), "address.city");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// Create the root path (empty path)
    pub fn root() -> Self {
        JsonPath {
            segments: Vec::new(),
        }
    }

    /// Create a path from a vector of segments
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        JsonPath { segments }
    }

    /// Get the path segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True for the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a key segment (builder pattern)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an index segment (builder pattern)
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    /// Get the parent path (None if root)
    pub fn parent(&self) -> Option<JsonPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(JsonPath::from_segments(
            self.segments[..self.segments.len() - 1].to_vec(),
        ))
    }

    /// True if `self` is a prefix of `other` (or equal to it)
    pub fn is_ancestor_of(&self, other: &JsonPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// True if one path contains the other
    pub fn overlaps(&self, other: &JsonPath) -> bool {
        self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    /// Dotted string form (`a.b[0].c`)
    pub fn to_path_string(&self) -> String {
        let mut result = String::new();
        for seg in &self.segments {
            match seg {
                PathSegment::Key(k) => {
                    if !result.is_empty() {
                        result.push('.');
                    }
                    result.push_str(k);
                }
                PathSegment::Index(i) => {
                    result.push('[');
                    result.push_str(&i.to_string());
                    result.push(']');
                }
            }
        }
        result
    }
}

impl FromStr for JsonPath {
    type Err = PathParseError;

    /// Parse a path from a string
    ///
    /// Accepts `foo`, `.foo`, `foo.bar`, `foo[0]` and `foo[0].bar`.
    /// Key characters are alphanumerics, `_`, `-` and `$`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(JsonPath::root());
        }

        let chars: Vec<char> = s.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        if chars[0] == '.' {
            i += 1;
        }

        while i < chars.len() {
            if chars[i] == '.' {
                i += 1;
                if i >= chars.len() || chars[i] == '.' {
                    return Err(PathParseError::EmptyKey(i));
                }
            }

            if chars[i] == '[' {
                let start = i;
                i += 1;
                let idx_start = i;
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(PathParseError::UnclosedBracket(start));
                }
                let idx_str: String = chars[idx_start..i].iter().collect();
                let idx = idx_str
                    .parse::<usize>()
                    .map_err(|_| PathParseError::InvalidIndex(idx_start, idx_str))?;
                segments.push(PathSegment::Index(idx));
                i += 1;
            } else if is_key_char(chars[i]) {
                let key_start = i;
                while i < chars.len() && is_key_char(chars[i]) {
                    i += 1;
                }
                segments.push(PathSegment::Key(chars[key_start..i].iter().collect()));
            } else {
                return Err(PathParseError::UnexpectedChar(chars[i], i));
            }
        }

        Ok(JsonPath { segments })
    }
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '$'
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

impl Serialize for JsonPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_path_string())
    }
}

impl<'de> Deserialize<'de> for JsonPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Reading
// =============================================================================

/// Get the value at `path`, or `None` if any segment is absent
///
/// ```
/// use docstore_core::json::{get_at_path, JsonPath};
/// use serde_json::json;
///
/// let doc = json!({"user": {"scores": [100, 95]}});
/// let path: JsonPath = "user.scores[1]".parse().unwrap();
/// assert_eq!(get_at_path(&doc, &path), Some(&json!(95)));
/// assert_eq!(get_at_path(&doc, &"user.name".parse().unwrap()), None);
/// ```
pub fn get_at_path<'a>(value: &'a Value, path: &JsonPath) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(obj)) => obj.get(key)?,
            (PathSegment::Index(idx), Value::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Get a clone of the value at `path`, or `default` if absent
pub fn get_or(value: &Value, path: &JsonPath, default: Value) -> Value {
    get_at_path(value, path).cloned().unwrap_or(default)
}

/// True if every segment of `path` exists in `value`
pub fn contains_path(value: &Value, path: &JsonPath) -> bool {
    get_at_path(value, path).is_some()
}

// =============================================================================
// Writing
// =============================================================================

/// Set the value at `path`, creating intermediate containers as needed
///
/// Missing intermediates become objects (for a key segment) or arrays (for
/// an index segment). A node of the wrong kind is replaced. Arrays shorter
/// than a requested index are padded with `null`. The root path replaces
/// the whole tree.
///
/// ```
/// use docstore_core::json::{set_at_path, JsonPath};
/// use serde_json::json;
///
/// let mut doc = json!({});
/// set_at_path(&mut doc, &"meta.rev".parse().unwrap(), json!(3));
/// assert_eq!(doc, json!({"meta": {"rev": 3}}));
/// ```
pub fn set_at_path(root: &mut Value, path: &JsonPath, value: Value) {
    let slot = slot_at_path(root, path);
    *slot = value;
}

/// Walk to the slot at `path`, materializing every segment on the way
fn slot_at_path<'a>(root: &'a mut Value, path: &JsonPath) -> &'a mut Value {
    let mut current = root;
    for segment in path.segments() {
        current = match segment {
            PathSegment::Key(key) => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                match current {
                    Value::Object(obj) => obj.entry(key.clone()).or_insert(Value::Null),
                    _ => unreachable!("replaced with an object above"),
                }
            }
            PathSegment::Index(idx) => {
                if !current.is_array() {
                    *current = Value::Array(Vec::new());
                }
                match current {
                    Value::Array(arr) => {
                        if arr.len() <= *idx {
                            arr.resize(*idx + 1, Value::Null);
                        }
                        &mut arr[*idx]
                    }
                    _ => unreachable!("replaced with an array above"),
                }
            }
        };
    }
    current
}

/// Remove the leaf at `path` and return it, or `default` if absent
///
/// Only the leaf is removed; intermediate containers that become empty
/// stay in place. Removing an array element shifts the following
/// elements. Extracting the root takes the whole tree and leaves `null`.
///
/// ```
/// use docstore_core::json::{extract_at_path, JsonPath};
/// use serde_json::json;
///
/// let mut doc = json!({"meta": {"rev": 3}, "name": "a"});
/// let rev = extract_at_path(&mut doc, &"meta.rev".parse().unwrap(), json!(0));
/// assert_eq!(rev, json!(3));
/// assert_eq!(doc, json!({"meta": {}, "name": "a"}));
/// ```
pub fn extract_at_path(root: &mut Value, path: &JsonPath, default: Value) -> Value {
    let parent_path = match path.parent() {
        Some(parent) => parent,
        None => return std::mem::take(root),
    };

    let parent = match get_at_path_mut(root, &parent_path) {
        Some(parent) => parent,
        None => return default,
    };

    let removed = match (path.segments().last(), parent) {
        (Some(PathSegment::Key(key)), Value::Object(obj)) => obj.remove(key),
        (Some(PathSegment::Index(idx)), Value::Array(arr)) if *idx < arr.len() => {
            Some(arr.remove(*idx))
        }
        _ => None,
    };
    removed.unwrap_or(default)
}

/// Set `path` to `fallback` only if it is currently absent
///
/// Returns true if the tree was modified. A path holding an explicit
/// `null` counts as present.
pub fn fallback_at_path(root: &mut Value, path: &JsonPath, fallback: Value) -> bool {
    if contains_path(root, path) {
        return false;
    }
    set_at_path(root, path, fallback);
    true
}

/// Mutable lookup without materializing anything
fn get_at_path_mut<'a>(value: &'a mut Value, path: &JsonPath) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(obj)) => obj.get_mut(key)?,
            (PathSegment::Index(idx), Value::Array(arr)) => arr.get_mut(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}
