//! Attribute values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of a group or variable attribute.
///
/// Attributes are heterogeneous; the variant tag decides how the value is read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f64),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of scalar values. Floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::IntArray(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::FloatArray(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// Non-zero integer values are true.
    pub fn is_true(&self) -> bool {
        self.as_i64().is_some_and(|v| v != 0)
    }

    /// Number of elements (1 for scalars and text).
    pub fn len(&self) -> usize {
        match self {
            Self::IntArray(v) => v.len(),
            Self::FloatArray(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::IntArray(_) => "int[]",
            Self::FloatArray(_) => "float[]",
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        Self::IntArray(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatArray(v)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", v)?;
    }
    Ok(())
}

/// CDL-style rendering: text is quoted, arrays are comma separated.
impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::IntArray(v) => write_list(f, v),
            Self::FloatArray(v) => write_list(f, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(AttrValue::from("K").as_str(), Some("K"));
        assert_eq!(AttrValue::from(3i64).as_f64(), Some(3.0));
        assert_eq!(AttrValue::from(2.5).as_i64(), None);
        assert!(AttrValue::Int(1).is_true());
        assert!(!AttrValue::Int(0).is_true());
        assert!(!AttrValue::from("1").is_true());
        assert_eq!(AttrValue::from(vec![1.0, 2.0]).len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(AttrValue::from("degrees").to_string(), "\"degrees\"");
        assert_eq!(AttrValue::from(vec![1i64, 2, 3]).to_string(), "1, 2, 3");
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_string(&AttrValue::Int(7)).unwrap();
        assert_eq!(json, r#"{"kind":"int","value":7}"#);
        let back: AttrValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AttrValue::Int(7));
    }
}
