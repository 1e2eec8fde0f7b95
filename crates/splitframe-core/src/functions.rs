//! Built-in column callables
//!
//! Each takes exactly one column. Their names drive derived output names, so
//! `SpecTerm::apply("x", sum())` produces `x_sum`.

use std::collections::HashSet;

use anyhow::bail;

use crate::key::{column_key_parts, KeyPart};
use crate::output::Output;
use crate::series::Series;
use crate::spec::ColumnFn;
use crate::value::Value;

fn unary(name: &'static str, f: fn(&Series) -> anyhow::Result<Output>) -> ColumnFn {
    ColumnFn::new(name, move |cols| match cols {
        [col] => f(col),
        _ => bail!("{name} takes exactly one column, got {}", cols.len()),
    })
}

/// The column unchanged
#[must_use]
pub fn identity() -> ColumnFn {
    unary("identity", |col| Ok(Output::Series(col.clone())))
}

/// Sum of non-null values
#[must_use]
pub fn sum() -> ColumnFn {
    unary("sum", |col| Ok(col.sum()?.into()))
}

/// Arithmetic mean of non-null values; null when there are none
#[must_use]
pub fn mean() -> ColumnFn {
    unary("mean", |col| Ok(col.mean()?.into()))
}

#[must_use]
pub fn min() -> ColumnFn {
    unary("min", |col| Ok(col.min()?.into()))
}

#[must_use]
pub fn max() -> ColumnFn {
    unary("max", |col| Ok(col.max()?.into()))
}

/// First value, or null for an empty column
#[must_use]
pub fn first() -> ColumnFn {
    unary("first", |col| {
        Ok(if col.is_empty() {
            Value::Null
        } else {
            col.get(0)?
        }
        .into())
    })
}

/// Last value, or null for an empty column
#[must_use]
pub fn last() -> ColumnFn {
    unary("last", |col| {
        Ok(match col.len() {
            0 => Value::Null,
            n => col.get(n - 1)?,
        }
        .into())
    })
}

/// Number of values, nulls included
#[must_use]
pub fn length() -> ColumnFn {
    unary("length", |col| Ok(Output::from(i64::try_from(col.len())?)))
}

/// Number of non-null values
#[must_use]
pub fn count() -> ColumnFn {
    unary("count", |col| Ok(Output::from(i64::try_from(col.count())?)))
}

/// Population variance of non-null values
#[must_use]
pub fn var() -> ColumnFn {
    unary("var", |col| Ok(variance(col)?.map_or(Value::Null, Value::Float).into()))
}

/// Population standard deviation of non-null values
#[must_use]
pub fn std() -> ColumnFn {
    unary("std", |col| {
        Ok(variance(col)?
            .map_or(Value::Null, |v| Value::Float(v.sqrt()))
            .into())
    })
}

/// Median of non-null values
#[must_use]
pub fn median() -> ColumnFn {
    unary("median", |col| {
        let mut values = col.to_f64_values()?;
        if values.is_empty() {
            return Ok(Value::Null.into());
        }
        values.sort_by(f64::total_cmp);
        let mid = values.len() / 2;
        let median = if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };
        Ok(median.into())
    })
}

/// Number of distinct non-null values
#[must_use]
pub fn count_distinct() -> ColumnFn {
    unary("count_distinct", |col| {
        let distinct: HashSet<KeyPart> = column_key_parts(col)?
            .into_iter()
            .filter(|part| *part != KeyPart::Null)
            .collect();
        Ok(Output::from(i64::try_from(distinct.len())?))
    })
}

fn variance(col: &Series) -> anyhow::Result<Option<f64>> {
    let values = col.to_f64_values()?;
    if values.is_empty() {
        return Ok(None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sum_sq_diff: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    Ok(Some(sum_sq_diff / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: &ColumnFn, col: Series) -> Output {
        f.call(&[col]).unwrap()
    }

    fn scalar(output: Output) -> Value {
        match output {
            Output::Value(v) => v,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn test_numeric_reductions() {
        let col = || Series::from_optional_ints("x", vec![Some(1), None, Some(3), Some(4)]);
        assert_eq!(scalar(call(&sum(), col())), Value::Int(8));
        assert_eq!(
            scalar(call(&mean(), col())),
            Value::Float(8.0 / 3.0)
        );
        assert_eq!(scalar(call(&min(), col())), Value::Int(1));
        assert_eq!(scalar(call(&max(), col())), Value::Int(4));
        assert_eq!(scalar(call(&median(), col())), Value::Float(3.0));
        assert_eq!(scalar(call(&length(), col())), Value::Int(4));
        assert_eq!(scalar(call(&count(), col())), Value::Int(3));
    }

    #[test]
    fn test_var_and_std() {
        let col = || Series::from_floats("x", vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(scalar(call(&var(), col())), Value::Float(4.0));
        assert_eq!(scalar(call(&std(), col())), Value::Float(2.0));
        let empty = Series::from_floats("x", vec![]);
        assert_eq!(scalar(call(&var(), empty)), Value::Null);
    }

    #[test]
    fn test_first_last_and_distinct() {
        let col = || Series::from_strings("s", vec!["b", "a", "b"]);
        assert_eq!(scalar(call(&first(), col())), Value::string("b"));
        assert_eq!(scalar(call(&last(), col())), Value::string("b"));
        assert_eq!(scalar(call(&count_distinct(), col())), Value::Int(2));
        assert_eq!(
            scalar(call(&first(), Series::from_ints("e", vec![]))),
            Value::Null
        );
    }

    #[test]
    fn test_identity_keeps_values() {
        let out = call(&identity(), Series::from_ints("x", vec![5, 6]));
        match out {
            Output::Series(s) => assert_eq!(s.to_values().unwrap(), vec![Value::Int(5), Value::Int(6)]),
            other => panic!("expected a series, got {other:?}"),
        }
    }

    #[test]
    fn test_arity_and_type_errors() {
        let a = Series::from_ints("a", vec![1]);
        let b = Series::from_ints("b", vec![2]);
        assert!(sum().call(&[a, b]).is_err());
        assert!(sum().call(&[Series::from_strings("s", vec!["x"])]).is_err());
        assert_eq!(sum().name(), "sum");
    }
}
