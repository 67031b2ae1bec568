//! Closed set of scalar value shapes used by variable parameters and
//! prompt metadata. Coercion from a declared `format` string happens once,
//! at `TaskSpec` validation time (C3 step 3), never again downstream.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ScalarValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Coerce into the shape declared by `format` (`"string"`, `"int"`,
    /// `"float"`, `"bool"`). Returns `None` if the value cannot be
    /// represented in that format.
    pub fn coerce(&self, format: &str) -> Option<Self> {
        match format {
            "string" => self.as_str().map(|s| Self::Str(s.to_string())).or_else(|| match self {
                Self::Int(i) => Some(Self::Str(i.to_string())),
                Self::Float(f) => Some(Self::Str(f.to_string())),
                Self::Bool(b) => Some(Self::Str(b.to_string())),
                Self::Str(_) => None,
            }),
            "int" => self.as_i64().map(Self::Int),
            "float" => self.as_f64().map(Self::Float),
            "bool" => self.as_bool().map(Self::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_numeric_string_to_declared_int_format() {
        let v = ScalarValue::Str("42".to_string());
        assert_eq!(v.coerce("int"), None);
        let v = ScalarValue::Int(42);
        assert_eq!(v.coerce("string"), Some(ScalarValue::Str("42".to_string())));
    }

    #[test]
    fn float_with_integral_value_coerces_to_int() {
        let v = ScalarValue::Float(3.0);
        assert_eq!(v.as_i64(), Some(3));
        assert_eq!(ScalarValue::Float(3.5).as_i64(), None);
    }
}
