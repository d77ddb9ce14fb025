// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primitive parameter values and their inferred types.

use serde::{Deserialize, Serialize};

/// A scalar value carried by an element parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimitiveValue {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl PrimitiveValue {
    /// Converts a JSON scalar. Null, arrays and objects have no primitive form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    /// The primitive type of this value.
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Self::Boolean(_) => ParameterType::Boolean,
            Self::Number(_) => ParameterType::Number,
            Self::String(_) => ParameterType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for PrimitiveValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for PrimitiveValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for PrimitiveValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl std::fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Date => "date",
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_convert_from_json() {
        assert_eq!(
            PrimitiveValue::from_json(&json!(true)),
            Some(PrimitiveValue::Boolean(true))
        );
        assert_eq!(
            PrimitiveValue::from_json(&json!(2.5)),
            Some(PrimitiveValue::Number(2.5))
        );
        assert_eq!(
            PrimitiveValue::from_json(&json!("W-01")),
            Some(PrimitiveValue::String("W-01".into()))
        );
        assert_eq!(PrimitiveValue::from_json(&json!(null)), None);
        assert_eq!(PrimitiveValue::from_json(&json!([1, 2])), None);
    }

    #[test]
    fn untagged_serialization_is_plain() {
        let v = PrimitiveValue::Number(3.0);
        assert_eq!(serde_json::to_string(&v).unwrap(), "3.0");
        let back: PrimitiveValue = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(back, PrimitiveValue::String("12".into()));
    }

    #[test]
    fn type_names() {
        assert_eq!(ParameterType::Number.to_string(), "number");
        assert_eq!(
            serde_json::to_string(&ParameterType::Boolean).unwrap(),
            "\"boolean\""
        );
    }
}
