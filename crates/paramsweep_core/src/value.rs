//! Scalar and sequence values carried by sweep parameters.
//!
//! `Value` is totally ordered and hashable so that sweep axes can be
//! deduplicated and sorted. Floats compare with `f64::total_cmp` and hash by
//! their bit pattern, which keeps `Eq`, `Ord` and `Hash` consistent.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A parameter value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Path(PathBuf),
    /// Ordered sequence; a sweep axis unless the owning parameter is forced scalar
    List(Vec<Value>),
    /// Ordered mapping. Never stored in a parameter, only used to insert branches.
    Map(Vec<(String, Value)>),
}

/// Element type reported by `Parameter::datatype`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    Int,
    Float,
    Text,
    Path,
    List,
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Path(_) => 4,
            Value::List(_) => 5,
            Value::Map(_) => 6,
        }
    }

    /// Type tag of this value, `None` for mappings
    #[must_use]
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Value::Bool(_) => Some(TypeTag::Bool),
            Value::Int(_) => Some(TypeTag::Int),
            Value::Float(_) => Some(TypeTag::Float),
            Value::Text(_) => Some(TypeTag::Text),
            Value::Path(_) => Some(TypeTag::Path),
            Value::List(_) => Some(TypeTag::List),
            Value::Map(_) => None,
        }
    }

    /// Text and paths are displayed quoted and are never iterated
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Value::Text(_) | Value::Path(_))
    }

    /// True if a mapping appears anywhere inside this value
    #[must_use]
    pub fn contains_map(&self) -> bool {
        match self {
            Value::Map(_) => true,
            Value::List(items) => items.iter().any(Value::contains_map),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert a JSON document into a value, keeping object key order.
    ///
    /// Returns `None` if the document contains `null`.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Option<Value> {
        Some(match json {
            serde_json::Value::Null => return None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64()?),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
                    .collect::<Option<Vec<_>>>()?,
            ),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Path(a), Value::Path(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Path(p) => p.hash(state),
            Value::List(items) => items.hash(state),
            Value::Map(entries) => entries.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Path(p) => write!(f, "{}", p.display()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<PathBuf> for Value {
    fn from(v: PathBuf) -> Self {
        Value::Path(v)
    }
}

impl From<&Path> for Value {
    fn from(v: &Path) -> Self {
        Value::Path(v.to_path_buf())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_float_ordering_is_total() {
        let mut values = vec![Value::Float(2.5), Value::Float(-1.0), Value::Float(0.5)];
        values.sort();
        assert_eq!(
            values,
            vec![Value::Float(-1.0), Value::Float(0.5), Value::Float(2.5)]
        );
    }

    #[test]
    fn test_equal_values_hash_equal() {
        let set: HashSet<Value> = [Value::Float(1.5), Value::Float(1.5), Value::Int(1)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert!(Value::Int(100) < Value::Float(0.0));
    }

    #[test]
    fn test_from_json_keeps_key_order() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": [1.5, 2.5], "name": "er"}"#).unwrap();
        let value = Value::from_json(json).unwrap();
        let Value::Map(entries) = value else {
            panic!("expected a mapping");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "name"]);
        assert_eq!(entries[1].1, Value::from(vec![1.5, 2.5]));
    }

    #[test]
    fn test_from_json_rejects_null() {
        let json: serde_json::Value = serde_json::from_str("[1, null]").unwrap();
        assert!(Value::from_json(json).is_none());
    }

    #[test]
    fn test_display_list() {
        assert_eq!(Value::from(vec![1, 2, 3]).to_string(), "[1, 2, 3]");
    }
}
