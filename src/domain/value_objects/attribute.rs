//! Scalar attribute values for the open character schema

use serde::{Deserialize, Serialize};

use super::CharacterId;

/// Closed set of scalar kinds an attribute may hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Flag(bool),
    Reference(CharacterId),
}

impl AttributeValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert a JSON scalar; arrays are joined, objects and null rejected
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.trim().to_string())),
            Value::Bool(b) => Some(Self::Flag(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Number)),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| Self::from_json(item).map(|v| v.to_string()))
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(Self::Text(parts.join(", ")))
                }
            }
            _ => None,
        }
    }

    /// Interpret a bare free-text answer, preferring numbers and booleans
    pub fn from_free_text(raw: &str) -> Option<Self> {
        let text = raw
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(n) = text.parse::<i64>() {
            return Some(Self::Integer(n));
        }
        if let Ok(n) = text.parse::<f64>() {
            return Some(Self::Number(n));
        }
        match text.to_lowercase().as_str() {
            "true" | "yes" => Some(Self::Flag(true)),
            "false" | "no" => Some(Self::Flag(false)),
            _ => Some(Self::Text(text.to_string())),
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Number(n) => write!(f, "{}", n),
            Self::Flag(b) => write!(f, "{}", b),
            Self::Reference(id) => write!(f, "@{}", id),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<CharacterId> for AttributeValue {
    fn from(id: CharacterId) -> Self {
        Self::Reference(id)
    }
}
