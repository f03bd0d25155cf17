//! Owned, decoded form of a record.

use std::collections::BTreeMap;

/// A value produced when decoding a field from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    I64(i64),
    U64(u64),
    /// Name of the stored enum variant.
    Enum(String),
    /// Every declared flag and its stored bit.
    Mask(BTreeMap<String, bool>),
    Struct(BTreeMap<String, Value>),
    Array(Vec<Value>),
    /// Active variant of a view.
    View {
        key: u64,
        variant: String,
        value: Box<Value>,
    },
}

impl Value {
    /// Member `name` of a struct value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            Value::I64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let value = Value::Struct(BTreeMap::from([
            ("a".to_string(), Value::U64(3)),
            ("b".to_string(), Value::I64(-1)),
        ]));

        assert_eq!(value.get("a").and_then(Value::as_u64), Some(3));
        assert_eq!(value.get("b").and_then(Value::as_u64), None);
        assert_eq!(value.get("b").and_then(Value::as_i64), Some(-1));
        assert_eq!(value.get("c"), None);
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
    }
}
