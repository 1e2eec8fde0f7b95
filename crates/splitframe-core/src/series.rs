//! Series: A single column of data backed by Arrow arrays

use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, ListArray, StringArray,
    UInt64Array,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::compute;
use arrow::datatypes::{DataType, Field, Float64Type, Int32Type, Int64Type};

use crate::error::{DataError, DataResult};
use crate::value::Value;

/// A single column of homogeneous data backed by an Arrow array
#[derive(Clone)]
pub struct Series {
    /// Column name
    name: String,
    /// The underlying Arrow array (reference-counted for zero-copy)
    array: ArrayRef,
}

impl Series {
    /// Create a new Series from an Arrow array
    #[must_use]
    pub fn new(name: impl Into<String>, array: ArrayRef) -> Self {
        Self {
            name: name.into(),
            array,
        }
    }

    /// Create a Series from a vector of integers
    #[must_use]
    pub fn from_ints(name: impl Into<String>, values: Vec<i64>) -> Self {
        let array = Arc::new(Int64Array::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of floats
    #[must_use]
    pub fn from_floats(name: impl Into<String>, values: Vec<f64>) -> Self {
        let array = Arc::new(Float64Array::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of booleans
    #[must_use]
    pub fn from_bools(name: impl Into<String>, values: Vec<bool>) -> Self {
        let array = Arc::new(BooleanArray::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of strings
    #[must_use]
    pub fn from_strings(name: impl Into<String>, values: Vec<&str>) -> Self {
        let array = Arc::new(StringArray::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of optional integers
    #[must_use]
    pub fn from_optional_ints(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        let array = Arc::new(Int64Array::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of optional floats
    #[must_use]
    pub fn from_optional_floats(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        let array = Arc::new(Float64Array::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a vector of optional strings
    #[must_use]
    pub fn from_optional_strings(name: impl Into<String>, values: Vec<Option<&str>>) -> Self {
        let array = Arc::new(StringArray::from(values)) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Series from a slice of Values
    ///
    /// The type is inferred from the first non-null value.
    ///
    /// # Errors
    /// Returns error if values have mixed types
    pub fn from_values(name: impl Into<String>, values: &[Value]) -> DataResult<Self> {
        if values.is_empty() {
            // Default to Int64 for empty series
            return Ok(Self::from_ints(name, vec![]));
        }

        // Find the first non-null value to determine type; ints widen to floats
        let first_type = values.iter().find(|v| !v.is_null());
        let has_float = values.iter().any(|v| matches!(v, Value::Float(_)));

        match first_type {
            Some(Value::Int(_)) if !has_float => {
                let ints: Vec<Option<i64>> = values
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) => Ok(Some(*i)),
                        Value::Null => Ok(None),
                        _ => Err(mismatch("Int", v)),
                    })
                    .collect::<DataResult<Vec<_>>>()?;
                Ok(Self::from_optional_ints(name, ints))
            }
            Some(Value::Int(_) | Value::Float(_)) => {
                let floats: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| match v {
                        Value::Float(f) => Ok(Some(*f)),
                        Value::Int(i) => Ok(Some(*i as f64)), // Allow int -> float coercion
                        Value::Null => Ok(None),
                        _ => Err(mismatch("Float", v)),
                    })
                    .collect::<DataResult<Vec<_>>>()?;
                Ok(Self::from_optional_floats(name, floats))
            }
            Some(Value::Bool(_)) => {
                let bools: Vec<Option<bool>> = values
                    .iter()
                    .map(|v| match v {
                        Value::Bool(b) => Ok(Some(*b)),
                        Value::Null => Ok(None),
                        _ => Err(mismatch("Bool", v)),
                    })
                    .collect::<DataResult<Vec<_>>>()?;
                let array = Arc::new(BooleanArray::from(bools)) as ArrayRef;
                Ok(Self::new(name, array))
            }
            Some(Value::String(_)) => {
                let strings: Vec<Option<&str>> = values
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => Ok(Some(s.as_ref())),
                        Value::Null => Ok(None),
                        _ => Err(mismatch("String", v)),
                    })
                    .collect::<DataResult<Vec<_>>>()?;
                Ok(Self::from_optional_strings(name, strings))
            }
            Some(Value::List(_)) => Self::list_from_values(name, values),
            Some(Value::Null) | None => {
                // All null values - default to Int64
                let nulls: Vec<Option<i64>> = vec![None; values.len()];
                Ok(Self::from_optional_ints(name, nulls))
            }
        }
    }

    /// Build a List array; each cell is a list (or null)
    fn list_from_values(name: impl Into<String>, values: &[Value]) -> DataResult<Self> {
        let mut flat = Vec::new();
        let mut lengths = Vec::with_capacity(values.len());
        let mut validity = Vec::with_capacity(values.len());

        for v in values {
            match v {
                Value::List(items) => {
                    flat.extend(items.iter().cloned());
                    lengths.push(items.len());
                    validity.push(true);
                }
                Value::Null => {
                    lengths.push(0);
                    validity.push(false);
                }
                _ => return Err(mismatch("List", v)),
            }
        }

        let inner = Series::from_values("item", &flat)?;
        let field = Arc::new(Field::new("item", inner.data_type().clone(), true));
        let offsets = OffsetBuffer::<i32>::from_lengths(lengths);
        let nulls = if validity.iter().all(|valid| *valid) {
            None
        } else {
            Some(NullBuffer::from(validity))
        };
        let array = ListArray::try_new(field, offsets, inner.array, nulls)?;
        Ok(Self::new(name, Arc::new(array) as ArrayRef))
    }

    /// Get the column name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Check if the series is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Get the Arrow data type
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }

    /// Get the underlying Arrow array
    #[must_use]
    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    /// Get the number of null values
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.array.null_count()
    }

    /// Check if a value at index is null
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.array.is_null(index)
    }

    /// Get a value at the given index
    ///
    /// # Errors
    /// Returns error if index is out of bounds or the type is unsupported
    pub fn get(&self, index: usize) -> DataResult<Value> {
        if index >= self.len() {
            return Err(DataError::OutOfBounds {
                index,
                length: self.len(),
            });
        }

        if self.is_null(index) {
            return Ok(Value::Null);
        }

        match self.array.data_type() {
            DataType::Int64 => Ok(Value::Int(
                self.array.as_primitive::<Int64Type>().value(index),
            )),
            DataType::Int32 => Ok(Value::Int(i64::from(
                self.array.as_primitive::<Int32Type>().value(index),
            ))),
            DataType::Float64 => Ok(Value::Float(
                self.array.as_primitive::<Float64Type>().value(index),
            )),
            DataType::Boolean => Ok(Value::Bool(self.array.as_boolean().value(index))),
            DataType::Utf8 => Ok(Value::string(self.array.as_string::<i32>().value(index))),
            DataType::List(_) => {
                let inner = Series::new("item", self.array.as_list::<i32>().value(index));
                Ok(Value::list(inner.to_values()?))
            }
            other => Err(DataError::InvalidOperation(format!(
                "cannot get value of type {other:?}"
            ))),
        }
    }

    /// Convert to a vector of Values
    ///
    /// # Errors
    /// Returns error if conversion fails
    pub fn to_values(&self) -> DataResult<Vec<Value>> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Gather the rows at `indices` into a new Series
    ///
    /// # Errors
    /// Returns error if any index is out of bounds
    pub fn take(&self, indices: &[usize]) -> DataResult<Self> {
        let length = self.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= length) {
            return Err(DataError::OutOfBounds { index, length });
        }
        let indices = UInt64Array::from_iter_values(indices.iter().map(|&i| i as u64));
        let array = compute::take(self.array.as_ref(), &indices, None)?;
        Ok(Self::new(self.name.clone(), array))
    }

    /// Calculate the sum of numeric values
    ///
    /// # Errors
    /// Returns error for non-numeric types
    pub fn sum(&self) -> DataResult<Value> {
        match self.array.data_type() {
            DataType::Int64 => {
                let sum = compute::sum(self.array.as_primitive::<Int64Type>()).unwrap_or(0);
                Ok(Value::Int(sum))
            }
            DataType::Float64 => {
                let sum = compute::sum(self.array.as_primitive::<Float64Type>()).unwrap_or(0.0);
                Ok(Value::Float(sum))
            }
            other => Err(DataError::TypeMismatch {
                expected: "numeric type".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    /// Calculate the mean of numeric values
    ///
    /// # Errors
    /// Returns error for non-numeric types
    pub fn mean(&self) -> DataResult<Value> {
        let count = self.count();
        let sum = match self.sum()? {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
            _ => return Ok(Value::Null),
        };
        if count == 0 {
            Ok(Value::Null)
        } else {
            Ok(Value::Float(sum / count as f64))
        }
    }

    /// Get the minimum value
    ///
    /// # Errors
    /// Returns error for non-comparable types
    pub fn min(&self) -> DataResult<Value> {
        match self.array.data_type() {
            DataType::Int64 => Ok(compute::min(self.array.as_primitive::<Int64Type>()).into()),
            DataType::Float64 => Ok(compute::min(self.array.as_primitive::<Float64Type>()).into()),
            DataType::Utf8 => Ok(compute::min_string(self.array.as_string::<i32>()).into()),
            other => Err(DataError::TypeMismatch {
                expected: "comparable type".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    /// Get the maximum value
    ///
    /// # Errors
    /// Returns error for non-comparable types
    pub fn max(&self) -> DataResult<Value> {
        match self.array.data_type() {
            DataType::Int64 => Ok(compute::max(self.array.as_primitive::<Int64Type>()).into()),
            DataType::Float64 => Ok(compute::max(self.array.as_primitive::<Float64Type>()).into()),
            DataType::Utf8 => Ok(compute::max_string(self.array.as_string::<i32>()).into()),
            other => Err(DataError::TypeMismatch {
                expected: "comparable type".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    /// Count non-null values
    #[must_use]
    pub fn count(&self) -> usize {
        self.len() - self.null_count()
    }

    /// Numeric values with nulls skipped
    ///
    /// # Errors
    /// Returns error for non-numeric types
    pub fn to_f64_values(&self) -> DataResult<Vec<f64>> {
        match self.array.data_type() {
            DataType::Int64 => Ok(self
                .array
                .as_primitive::<Int64Type>()
                .iter()
                .flatten()
                .map(|i| i as f64)
                .collect()),
            DataType::Float64 => Ok(self
                .array
                .as_primitive::<Float64Type>()
                .iter()
                .flatten()
                .collect()),
            other => Err(DataError::TypeMismatch {
                expected: "numeric type".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }
}

fn mismatch(expected: &str, found: &Value) -> DataError {
    DataError::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Series {{ name: {:?}, dtype: {:?}, len: {} }}",
            self.name,
            self.data_type(),
            self.len()
        )
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Series: {} ({:?})", self.name, self.data_type())?;
        let max_display = 10;
        let len = self.len();

        for i in 0..len.min(max_display) {
            if let Ok(val) = self.get(i) {
                writeln!(f, "  {i}: {val}")?;
            }
        }

        if len > max_display {
            writeln!(f, "  ... ({} more rows)", len - max_display)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ints() {
        let series = Series::from_ints("numbers", vec![1, 2, 3, 4, 5]);
        assert_eq!(series.name(), "numbers");
        assert_eq!(series.len(), 5);
        assert_eq!(series.data_type(), &DataType::Int64);
    }

    #[test]
    fn test_get_values() {
        let series = Series::from_ints("nums", vec![10, 20, 30]);
        assert_eq!(series.get(0).unwrap(), Value::Int(10));
        assert_eq!(series.get(2).unwrap(), Value::Int(30));
        assert!(matches!(
            series.get(3),
            Err(DataError::OutOfBounds { index: 3, length: 3 })
        ));
    }

    #[test]
    fn test_from_values_with_nulls() {
        let values = vec![Value::Float(1.5), Value::Null, Value::Int(2)];
        let series = Series::from_values("x", &values).unwrap();
        assert_eq!(series.data_type(), &DataType::Float64);
        assert_eq!(series.null_count(), 1);
        assert_eq!(series.get(2).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_from_values_int_first_widens() {
        let values = vec![Value::Int(3), Value::Float(0.5)];
        let series = Series::from_values("x", &values).unwrap();
        assert_eq!(series.data_type(), &DataType::Float64);
        assert_eq!(series.get(0).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_from_values_mixed_types_fails() {
        let values = vec![Value::Int(1), Value::string("a")];
        assert!(matches!(
            Series::from_values("x", &values),
            Err(DataError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_list_values_roundtrip_cells() {
        let values = vec![
            Value::list(vec![Value::Int(1), Value::Int(2)]),
            Value::Null,
            Value::list(vec![]),
        ];
        let series = Series::from_values("cells", &values).unwrap();
        assert!(matches!(series.data_type(), DataType::List(_)));
        assert_eq!(series.len(), 3);
        assert_eq!(series.get(0).unwrap(), values[0]);
        assert_eq!(series.get(1).unwrap(), Value::Null);
        assert_eq!(series.get(2).unwrap(), Value::list(vec![]));
    }

    #[test]
    fn test_take() {
        let series = Series::from_strings("s", vec!["a", "b", "c", "d"]);
        let taken = series.take(&[3, 0, 0]).unwrap();
        assert_eq!(
            taken.to_values().unwrap(),
            vec![Value::string("d"), Value::string("a"), Value::string("a")]
        );
        assert!(series.take(&[4]).is_err());
    }

    #[test]
    fn test_aggregations() {
        let series = Series::from_optional_ints("n", vec![Some(4), None, Some(2)]);
        assert_eq!(series.sum().unwrap(), Value::Int(6));
        assert_eq!(series.mean().unwrap(), Value::Float(3.0));
        assert_eq!(series.min().unwrap(), Value::Int(2));
        assert_eq!(series.max().unwrap(), Value::Int(4));
        assert_eq!(series.count(), 2);

        let names = Series::from_strings("s", vec!["pear", "apple"]);
        assert_eq!(names.min().unwrap(), Value::string("apple"));
        assert!(names.sum().is_err());
    }
}
