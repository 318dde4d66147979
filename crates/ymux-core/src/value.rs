//! Content kinds and item value types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use yrs::Any;

/// Kind of content held by a document's root shared type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    /// Collaborative text, addressed in UTF-8 bytes
    #[default]
    Text,
    /// Ordered sequence of items, addressed by element index
    Sequence,
    /// Key-value map, diffed by key
    Map,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Text => write!(f, "text"),
            ContentKind::Sequence => write!(f, "sequence"),
            ContentKind::Map => write!(f, "map"),
        }
    }
}

impl std::str::FromStr for ContentKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ContentKind::Text),
            "sequence" | "array" => Ok(ContentKind::Sequence),
            "map" => Ok(ContentKind::Map),
            _ => Err(crate::Error::InvalidKind(s.to_string())),
        }
    }
}

/// An owned value stored in a sequence or map.
///
/// Serializes as plain JSON; binary content becomes an array of numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Binary(Vec<u8>),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Number::Integer(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(Number::Float(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<&Any> for Value {
    fn from(any: &Any) -> Self {
        match any {
            Any::Null | Any::Undefined => Value::Null,
            Any::Bool(b) => Value::Bool(*b),
            Any::Number(n) => Value::Number(Number::Float(*n)),
            Any::BigInt(n) => Value::Number(Number::Integer(*n)),
            Any::String(s) => Value::String(s.to_string()),
            Any::Buffer(buf) => Value::Binary(buf.to_vec()),
            Any::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            Any::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Any {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Any::Null,
            Value::Bool(b) => Any::Bool(b),
            Value::Number(Number::Integer(n)) => Any::BigInt(n),
            Value::Number(Number::Float(n)) => Any::Number(n),
            Value::String(s) => Any::String(Arc::from(s)),
            Value::Binary(buf) => Any::Buffer(Arc::from(buf)),
            Value::Array(items) => {
                let items: Vec<Any> = items.into_iter().map(Any::from).collect();
                Any::Array(Arc::from(items))
            }
            Value::Object(entries) => Any::Map(Arc::new(
                entries.into_iter().map(|(k, v)| (k, Any::from(v))).collect(),
            )),
        }
    }
}

/// Number type supporting both integers and floats
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("text".parse::<ContentKind>().unwrap(), ContentKind::Text);
        assert_eq!("Array".parse::<ContentKind>().unwrap(), ContentKind::Sequence);
        assert_eq!("map".parse::<ContentKind>().unwrap(), ContentKind::Map);
        assert!("tree".parse::<ContentKind>().is_err());
    }

    #[test]
    fn test_any_conversion_keeps_structure() {
        let mut obj = HashMap::new();
        obj.insert("name".to_string(), Value::from("Alice"));
        obj.insert("tags".to_string(), Value::from(vec!["a", "b"]));
        let value = Value::Object(obj);

        let any = Any::from(value.clone());
        assert_eq!(Value::from(&any), value);
    }

    #[test]
    fn test_integer_and_float_stay_distinct() {
        assert_eq!(
            Value::from(&Any::from(Value::from(3i64))),
            Value::Number(Number::Integer(3))
        );
        assert_eq!(
            Value::from(&Any::from(Value::from(1.5))),
            Value::Number(Number::Float(1.5))
        );
    }

    #[test]
    fn test_binary_serializes_as_numbers() {
        let value = Value::from(&Any::Buffer(Arc::from(vec![1u8, 2])));
        assert_eq!(value, Value::Binary(vec![1, 2]));
        assert_eq!(serde_json::to_string(&value).unwrap(), "[1,2]");
    }
}
