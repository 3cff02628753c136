//! Typed table cells.

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;

/// One table cell, keeping the type it was read with so passthrough columns
/// are written back unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Arrays, objects and out-of-range numbers from JSON input.
    Json(Value),
}

impl Cell {
    /// Convert a decoded JSON value. `null` becomes [`Cell::Empty`].
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(s) => Self::Text(s),
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(f)) if !n.is_u64() => Self::Float(f),
                _ => Self::Json(Value::Number(n)),
            },
            other => Self::Json(other),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Bool(b) => Value::Bool(*b),
            Self::Json(v) => v.clone(),
        }
    }

    /// The cell as text, the way it is shown in a prompt or a CSV field.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Empty => Cow::Borrowed(""),
            Self::Text(s) => Cow::Borrowed(s),
            Self::Int(i) => Cow::Owned(i.to_string()),
            Self::Float(f) => Cow::Owned(f.to_string()),
            Self::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Self::Json(v) => Cow::Owned(v.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// Text comparisons look at the rendered value, so `Cell::Int(7) == "7"`.
impl PartialEq<str> for Cell {
    fn eq(&self, other: &str) -> bool {
        self.as_text() == other
    }
}

impl PartialEq<&str> for Cell {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == *other
    }
}

impl PartialEq<String> for Cell {
    fn eq(&self, other: &String) -> bool {
        self.as_text() == other.as_str()
    }
}
