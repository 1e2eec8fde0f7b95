//! Group keys: hashable key tuples and the read-only GroupKey accessor

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float64Type, Int32Type, Int64Type};
use ordered_float::OrderedFloat;

use crate::error::{DataError, DataResult};
use crate::series::Series;
use crate::value::Value;

/// One component of a composite group key
///
/// Variant order is the sort order: a key column holds a single type, so the
/// only cross-variant comparison is against `Null`, which sorts last. `Null`
/// equals `Null` and nothing else; NaN equals NaN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum KeyPart {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(Arc<str>),
    Null,
}

/// Composite key of one row across all key columns
pub(crate) type KeyTuple = Box<[KeyPart]>;

impl KeyPart {
    /// Convert a lookup value; `Int` is widened when the key column is Float64
    pub(crate) fn from_value(value: &Value, column_type: &DataType) -> DataResult<Self> {
        Ok(match (value, column_type) {
            (Value::Null, _) => KeyPart::Null,
            (Value::Bool(b), _) => KeyPart::Bool(*b),
            (Value::Int(i), DataType::Float64) => KeyPart::Float(OrderedFloat(*i as f64)),
            (Value::Int(i), _) => KeyPart::Int(*i),
            (Value::Float(f), _) => KeyPart::Float(OrderedFloat(*f)),
            (Value::String(s), _) => KeyPart::String(s.clone()),
            (Value::List(_), _) => {
                return Err(DataError::Grouping(
                    "cannot use List as a group key".to_string(),
                ))
            }
        })
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            KeyPart::Null => Value::Null,
            KeyPart::Bool(b) => Value::Bool(*b),
            KeyPart::Int(i) => Value::Int(*i),
            KeyPart::Float(f) => Value::Float(f.into_inner()),
            KeyPart::String(s) => Value::String(s.clone()),
        }
    }
}

/// Convert a whole key column into key parts, one per row
///
/// Strings are interned so equal keys share one allocation.
pub(crate) fn column_key_parts(series: &Series) -> DataResult<Vec<KeyPart>> {
    let array = series.array();
    let parts = match array.data_type() {
        DataType::Int64 => array
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map_or(KeyPart::Null, KeyPart::Int))
            .collect(),
        DataType::Int32 => array
            .as_primitive::<Int32Type>()
            .iter()
            .map(|v| v.map_or(KeyPart::Null, |i| KeyPart::Int(i64::from(i))))
            .collect(),
        DataType::Float64 => array
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map_or(KeyPart::Null, |f| KeyPart::Float(OrderedFloat(f))))
            .collect(),
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map_or(KeyPart::Null, KeyPart::Bool))
            .collect(),
        DataType::Utf8 => {
            let mut interned: HashMap<&str, Arc<str>> = HashMap::new();
            array
                .as_string::<i32>()
                .iter()
                .map(|v| match v {
                    Some(s) => KeyPart::String(
                        interned.entry(s).or_insert_with(|| Arc::from(s)).clone(),
                    ),
                    None => KeyPart::Null,
                })
                .collect()
        }
        DataType::Null => vec![KeyPart::Null; array.len()],
        other => {
            return Err(DataError::Grouping(format!(
                "cannot use column '{}' of type {other:?} as a group key",
                series.name()
            )))
        }
    };
    Ok(parts)
}

/// The key of one group: key column names with the group's values
///
/// Read-only. Fields are accessible by name with [`GroupKey::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKey {
    names: Arc<[String]>,
    values: Vec<Value>,
}

impl GroupKey {
    pub(crate) fn new(names: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { names, values }
    }

    /// Key column names
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Key values, in key column order
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the named key column
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.values[i])
    }

    /// Number of key columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when grouping by no columns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (name, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} = {value}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sorts_last_and_equals_itself() {
        let mut parts = vec![KeyPart::Null, KeyPart::Int(3), KeyPart::Int(-1)];
        parts.sort();
        assert_eq!(parts, vec![KeyPart::Int(-1), KeyPart::Int(3), KeyPart::Null]);
        assert_eq!(KeyPart::Null, KeyPart::Null);
        assert_ne!(KeyPart::Null, KeyPart::Int(0));
    }

    #[test]
    fn test_float_keys_hash_nan() {
        let series = Series::from_floats("f", vec![f64::NAN, 1.0, f64::NAN]);
        let parts = column_key_parts(&series).unwrap();
        assert_eq!(parts[0], parts[2]);
        assert_ne!(parts[0], parts[1]);
    }

    #[test]
    fn test_lookup_value_widens_int_for_float_column() {
        let part = KeyPart::from_value(&Value::Int(2), &DataType::Float64).unwrap();
        assert_eq!(part, KeyPart::Float(OrderedFloat(2.0)));
        assert!(KeyPart::from_value(&Value::list(vec![]), &DataType::Int64).is_err());
    }

    #[test]
    fn test_string_parts_with_nulls() {
        let series = Series::from_optional_strings("s", vec![Some("a"), None, Some("a")]);
        let parts = column_key_parts(&series).unwrap();
        assert_eq!(parts[0], parts[2]);
        assert_eq!(parts[1], KeyPart::Null);
        assert_eq!(parts[0].to_value(), Value::string("a"));
    }

    #[test]
    fn test_group_key_access() {
        let names: Arc<[String]> = Arc::from(vec!["g".to_string(), "h".to_string()]);
        let key = GroupKey::new(names, vec![Value::Int(1), Value::string("x")]);
        assert_eq!(key.get("h"), Some(&Value::string("x")));
        assert_eq!(key.get("z"), None);
        assert_eq!(key.to_string(), "(g = 1, h = \"x\")");
    }
}
