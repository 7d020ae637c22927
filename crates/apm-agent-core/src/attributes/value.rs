// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Serialize, Serializer};

/// Value of an attribute.
///
/// The scalar variants are the closed set accepted for user attributes.
/// [`AttributeValue::Unsupported`] carries the type label of anything else;
/// it is rejected as a user attribute and rendered as its label otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Unsupported(String),
}

impl AttributeValue {
    /// Builds the fallback for a value of type `T` outside the closed set.
    pub fn unsupported<T: ?Sized>() -> Self {
        Self::Unsupported(std::any::type_name::<T>().to_string())
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "i64",
            Self::Uint(_) => "u64",
            Self::Float(_) => "f64",
            Self::String(_) => "string",
            Self::Unsupported(label) => label,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Uint(u) => serializer.serialize_u64(*u),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Unsupported(label) => serializer.serialize_str(label),
        }
    }
}

macro_rules! from_signed {
    ($($ty:ty),*) => {
        $(impl From<$ty> for AttributeValue {
            fn from(v: $ty) -> Self {
                Self::Int(v as i64)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($ty:ty),*) => {
        $(impl From<$ty> for AttributeValue {
            fn from(v: $ty) -> Self {
                Self::Uint(v as u64)
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<()> for AttributeValue {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::Uint(u)
                } else {
                    n.as_f64().map_or(Self::Null, Self::Float)
                }
            }
            Value::String(s) => Self::String(s),
            Value::Array(_) => Self::Unsupported("array".to_string()),
            Value::Object(_) => Self::Unsupported("object".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversions() {
        assert_eq!(AttributeValue::from(-3i8), AttributeValue::Int(-3));
        assert_eq!(AttributeValue::from(7usize), AttributeValue::Uint(7));
        assert_eq!(AttributeValue::from(1.5f32), AttributeValue::Float(1.5));
        assert_eq!(AttributeValue::from(None::<i32>), AttributeValue::Null);
        assert_eq!(AttributeValue::from(Some("x")), AttributeValue::from("x"));
    }

    #[test]
    fn test_json_containers_are_unsupported() {
        let value = AttributeValue::from(json!([1, 2]));
        assert!(!value.is_supported());
        assert_eq!(value.type_name(), "array");
        assert_eq!(
            AttributeValue::from(json!({"a": 1})).type_name(),
            "object"
        );
        assert_eq!(AttributeValue::from(json!(12)), AttributeValue::Int(12));
        assert_eq!(
            AttributeValue::from(json!(u64::MAX)),
            AttributeValue::Uint(u64::MAX)
        );
    }

    #[test]
    fn test_serialize_each_variant() {
        let values = vec![
            AttributeValue::Null,
            AttributeValue::Bool(true),
            AttributeValue::Int(-1),
            AttributeValue::Uint(2),
            AttributeValue::Float(0.25),
            AttributeValue::from("s"),
            AttributeValue::unsupported::<Vec<u8>>(),
        ];
        let js = serde_json::to_value(&values).unwrap();
        let label = std::any::type_name::<Vec<u8>>();
        assert_eq!(js, json!([null, true, -1, 2, 0.25, "s", label]));
    }
}
