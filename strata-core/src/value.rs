use std::cmp::Ordering;
use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// A dynamically typed attribute value.
///
/// Values carry a total order so that providers can sort and compare keys
/// without knowing the entity type: `Null` sorts first, then booleans,
/// numbers (integers and floats compare numerically), text, and lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(0) => Some(false),
            Value::Int(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::List(_) => "list",
        }
    }

    /// Lowercase the ASCII letters of text values; other variants are
    /// returned unchanged. Non-ASCII characters are left as they are, the
    /// same folding SQL engines apply in `LOWER` and `NOCASE`.
    pub fn to_lowercase(&self) -> Value {
        match self {
            Value::Text(s) => Value::Text(s.to_ascii_lowercase()),
            other => other.clone(),
        }
    }

    /// Compare two values, optionally folding ASCII case first.
    pub fn compare(&self, other: &Value, ignore_case: bool) -> Ordering {
        if ignore_case {
            if let (Value::Text(a), Value::Text(b)) = (self, other) {
                return a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase());
            }
        }
        self.cmp(other)
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::List(_) => 4,
        }
    }

    pub(crate) fn arithmetic(&self, op: ArithOp, other: &Value) -> Result<Value, DataError> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => {
                let result = match op {
                    ArithOp::Add => a.checked_add(*b),
                    ArithOp::Sub => a.checked_sub(*b),
                    ArithOp::Mul => a.checked_mul(*b),
                    ArithOp::Div => {
                        if *b == 0 {
                            return Ok(Value::Null);
                        }
                        a.checked_div(*b)
                    }
                };
                result
                    .map(Value::Int)
                    .ok_or_else(|| DataError::query(format!("integer overflow in {a} {op} {b}")))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => Ok(match op {
                    ArithOp::Add => Value::Float(a + b),
                    ArithOp::Sub => Value::Float(a - b),
                    ArithOp::Mul => Value::Float(a * b),
                    ArithOp::Div if b == 0.0 => Value::Null,
                    ArithOp::Div => Value::Float(a / b),
                }),
                _ => Err(DataError::query(format!(
                    "cannot apply {op} to {} and {}",
                    self.type_name(),
                    other.type_name()
                ))),
            },
        }
    }
}

/// Arithmetic operators shared by the expression tree and [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl std::fmt::Display for ArithOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        };
        f.write_str(symbol)
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
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                // both arms are numeric, as_f64 cannot fail here
                let a = self.as_f64().unwrap_or_default();
                let b = other.as_f64().unwrap_or_default();
                a.total_cmp(&b)
            }
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident as $target:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )+
    };
}

impl_value_from!(
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
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

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

// ── Entity attribute conversions ────────────────────────────────────────

/// Convert an attribute or method argument into a [`Value`].
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be used as an attribute value",
    label = "not convertible to strata::Value",
    note = "built-in types: String, &str, integers, floats, bool, Option<T>, Vec<T>. Implement `IntoValue` for custom types."
)]
pub trait IntoValue {
    fn to_value(&self) -> Value;

    /// Like [`to_value`](IntoValue::to_value), but rejects values a
    /// [`Value`] cannot hold exactly. Providers use it on every write.
    fn try_to_value(&self, attribute: &str) -> Result<Value, DataError> {
        let _ = attribute;
        Ok(self.to_value())
    }
}

/// Rebuild an attribute from a stored [`Value`].
///
/// `attribute` names the attribute being decoded and is only used for error
/// messages.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be decoded from an attribute value",
    label = "not decodable from strata::Value",
    note = "built-in types: String, integers, floats, bool, Option<T>, Vec<T>. Implement `FromValue` for custom types."
)]
pub trait FromValue: Sized {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError>;
}

pub(crate) fn type_mismatch(attribute: &str, expected: &str, found: &Value) -> DataError {
    DataError::mapping(format!(
        "attribute '{attribute}' expects {expected}, found {}",
        found.type_name()
    ))
}

impl IntoValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl IntoValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl<T: IntoValue + ?Sized> IntoValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn try_to_value(&self, attribute: &str) -> Result<Value, DataError> {
        (**self).try_to_value(attribute)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn try_to_value(&self, attribute: &str) -> Result<Value, DataError> {
        match self {
            Some(v) => v.try_to_value(attribute),
            None => Ok(Value::Null),
        }
    }
}

fn try_list<'a, T: IntoValue + 'a>(
    items: impl Iterator<Item = &'a T>,
    attribute: &str,
) -> Result<Value, DataError> {
    items
        .map(|item| item.try_to_value(attribute))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

impl<T: IntoValue> IntoValue for [T] {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }

    fn try_to_value(&self, attribute: &str) -> Result<Value, DataError> {
        try_list(self.iter(), attribute)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }

    fn try_to_value(&self, attribute: &str) -> Result<Value, DataError> {
        self.as_slice().try_to_value(attribute)
    }
}

impl<T: IntoValue> IntoValue for VecDeque<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }

    fn try_to_value(&self, attribute: &str) -> Result<Value, DataError> {
        try_list(self.iter(), attribute)
    }
}

impl<T: IntoValue> IntoValue for BTreeSet<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }

    fn try_to_value(&self, attribute: &str) -> Result<Value, DataError> {
        try_list(self.iter(), attribute)
    }
}

macro_rules! impl_int_value {
    ($($ty:ty),+) => {
        $(
            impl IntoValue for $ty {
                /// Saturates at `i64::MAX`. Operands above it still compare
                /// correctly against stored integers, which never exceed it.
                fn to_value(&self) -> Value {
                    Value::Int(i64::try_from(*self).unwrap_or(i64::MAX))
                }

                fn try_to_value(&self, attribute: &str) -> Result<Value, DataError> {
                    i64::try_from(*self).map(Value::Int).map_err(|_| {
                        DataError::mapping(format!(
                            "attribute '{attribute}' holds {value}, which does not fit a 64-bit signed integer",
                            value = self,
                        ))
                    })
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
                    let i = value
                        .as_i64()
                        .ok_or_else(|| type_mismatch(attribute, stringify!($ty), &value))?;
                    <$ty>::try_from(i).map_err(|_| type_mismatch(attribute, stringify!($ty), &value))
                }
            }
        )+
    };
}

impl_int_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl IntoValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl IntoValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for Value {
    fn from_value(value: Value, _attribute: &str) -> Result<Self, DataError> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(type_mismatch(attribute, "String", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
        value
            .as_bool()
            .ok_or_else(|| type_mismatch(attribute, "bool", &value))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
        value
            .as_f64()
            .ok_or_else(|| type_mismatch(attribute, "f64", &value))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
        f64::from_value(value, attribute).map(|f| f as f32)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
        match value {
            Value::Null => Ok(None),
            v => T::from_value(v, attribute).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
        match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| T::from_value(item, attribute))
                .collect(),
            // collections are never stored as null, but a missing column reads back as one
            Value::Null => Ok(Vec::new()),
            other => Err(type_mismatch(attribute, "list", &other)),
        }
    }
}

impl<T: FromValue> FromValue for VecDeque<T> {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
        Vec::<T>::from_value(value, attribute).map(VecDeque::from)
    }
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
    fn from_value(value: Value, attribute: &str) -> Result<Self, DataError> {
        Vec::<T>::from_value(value, attribute).map(|v| v.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sorts_first() {
        let mut values = vec![
            Value::from("b"),
            Value::Int(3),
            Value::Null,
            Value::Float(1.5),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![Value::Null, Value::Float(1.5), Value::Int(3), Value::from("b")]
        );
    }

    #[test]
    fn test_numbers_compare_across_variants() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert!(Value::Int(2) < Value::Float(2.5));
    }

    #[test]
    fn test_compare_ignore_case() {
        let a = Value::from("Apple");
        let b = Value::from("apple");
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.compare(&b, true), Ordering::Equal);
    }

    #[test]
    fn test_ignore_case_folds_ascii_only() {
        let upper = Value::from("ÉCLAIR");
        let title = Value::from("Éclair");
        let lower = Value::from("éclair");
        assert_eq!(upper.compare(&title, true), Ordering::Equal);
        assert_ne!(title.compare(&lower, true), Ordering::Equal);
        assert_eq!(lower.to_lowercase(), Value::from("éclair"));
    }

    #[test]
    fn test_integer_division_by_zero_is_null() {
        let v = Value::Int(4).arithmetic(ArithOp::Div, &Value::Int(0)).unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn test_mixed_arithmetic_promotes_to_float() {
        let v = Value::Int(4).arithmetic(ArithOp::Mul, &Value::Float(0.5)).unwrap();
        assert_eq!(v, Value::Float(2.0));
    }

    #[test]
    fn test_try_to_value_rejects_unrepresentable_unsigned() {
        assert_eq!((i64::MAX as u64).try_to_value("hits").unwrap(), Value::Int(i64::MAX));
        let err = u64::MAX.try_to_value("hits").unwrap_err();
        assert!(matches!(err, DataError::Mapping(ref msg) if msg.contains("'hits'")));
        assert!(Some(usize::MAX).try_to_value("hits").is_err());
        assert!(vec![1u64, u64::MAX].try_to_value("samples").is_err());
        assert_eq!(None::<u64>.try_to_value("hits").unwrap(), Value::Null);
        assert_eq!(u64::MAX.to_value(), Value::Int(i64::MAX));
    }

    #[test]
    fn test_from_value_type_mismatch_is_mapping_error() {
        let err = String::from_value(Value::Int(1), "name").unwrap_err();
        assert!(matches!(err, DataError::Mapping(_)));
    }

    #[test]
    fn test_optional_and_list_round_trip() {
        let price: Option<f64> = FromValue::from_value(Value::Null, "price").unwrap();
        assert!(price.is_none());

        let tags: Vec<String> = FromValue::from_value(Value::from(vec!["a", "b"]), "tags").unwrap();
        assert_eq!(tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_untagged_json_shape() {
        let v = Value::List(vec![Value::from("FURNITURE"), Value::Int(2)]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"["FURNITURE",2]"#);
        let back: Value = serde_json::from_str(r#"["FURNITURE",2.5,null]"#).unwrap();
        assert_eq!(
            back,
            Value::List(vec![Value::from("FURNITURE"), Value::Float(2.5), Value::Null])
        );
    }
}
