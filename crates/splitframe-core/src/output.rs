//! Callable return values and their classification into result shapes

use std::fmt;

use crate::dataframe::DataFrame;
use crate::error::{DataError, DataResult};
use crate::series::Series;
use crate::value::Value;

/// Raw value returned by a user callable
#[derive(Debug, Clone)]
pub enum Output {
    /// A single value
    Value(Value),
    /// A one-dimensional sequence
    Values(Vec<Value>),
    /// A column; its name is ignored
    Series(Series),
    /// Named scalar fields, one output row
    Record(Vec<(String, Value)>),
    /// Named columns of equal length
    Columns(Vec<(String, Vec<Value>)>),
    /// A table
    Table(DataFrame),
    /// Rows of equal width; columns are named `x1..xn`
    Matrix(Vec<Vec<Value>>),
    /// A sequence or value stored as one cell instead of being expanded
    Cell(Box<Output>),
}

impl Output {
    /// Wrap a value so it lands in a single cell
    #[must_use]
    pub fn cell(inner: impl Into<Output>) -> Self {
        Output::Cell(Box::new(inner.into()))
    }

    /// Build a record from (name, value) pairs
    #[must_use]
    pub fn record<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Output::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build named columns from (name, values) pairs
    #[must_use]
    pub fn columns<K>(columns: impl IntoIterator<Item = (K, Vec<Value>)>) -> Self
    where
        K: Into<String>,
    {
        Output::Columns(columns.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Value(value)
    }
}

impl From<i64> for Output {
    fn from(value: i64) -> Self {
        Output::Value(Value::Int(value))
    }
}

impl From<f64> for Output {
    fn from(value: f64) -> Self {
        Output::Value(Value::Float(value))
    }
}

impl From<bool> for Output {
    fn from(value: bool) -> Self {
        Output::Value(Value::Bool(value))
    }
}

impl From<&str> for Output {
    fn from(value: &str) -> Self {
        Output::Value(Value::string(value))
    }
}

impl From<Vec<Value>> for Output {
    fn from(values: Vec<Value>) -> Self {
        Output::Values(values)
    }
}

impl From<Series> for Output {
    fn from(series: Series) -> Self {
        Output::Series(series)
    }
}

impl From<DataFrame> for Output {
    fn from(df: DataFrame) -> Self {
        Output::Table(df)
    }
}

/// Shape-tagged result of one callable invocation for one group
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ApplyResult {
    Scalar(Value),
    Vector(Vec<Value>),
    Row {
        names: Vec<String>,
        values: Vec<Value>,
    },
    /// `rows` is kept apart from `columns` so zero-column tables keep their height
    Table {
        names: Vec<String>,
        columns: Vec<Vec<Value>>,
        rows: usize,
    },
}

/// Tag of an [`ApplyResult`], for cross-group comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultKind {
    Scalar,
    Vector,
    Row,
    Table,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultKind::Scalar => "a scalar",
            ResultKind::Vector => "a vector",
            ResultKind::Row => "a row",
            ResultKind::Table => "a table",
        };
        f.write_str(name)
    }
}

impl ApplyResult {
    /// Classify a raw callable output
    ///
    /// # Errors
    /// Returns error for ragged columns or matrices, duplicate field names, or
    /// a cell holding something that is not a value or a sequence
    pub(crate) fn classify(output: Output) -> DataResult<Self> {
        Ok(match output {
            Output::Value(value) => ApplyResult::Scalar(value),
            Output::Values(values) => ApplyResult::Vector(values),
            Output::Series(series) => ApplyResult::Vector(series.to_values()?),
            Output::Record(fields) => {
                let (names, values): (Vec<String>, Vec<Value>) = fields.into_iter().unzip();
                check_unique(&names)?;
                ApplyResult::Row { names, values }
            }
            Output::Columns(columns) => {
                let (names, columns): (Vec<String>, Vec<Vec<Value>>) =
                    columns.into_iter().unzip();
                check_unique(&names)?;
                check_equal_lengths(&names, &columns)?;
                let rows = columns.first().map_or(0, Vec::len);
                ApplyResult::Table {
                    names,
                    columns,
                    rows,
                }
            }
            Output::Table(df) => {
                let names = df.columns();
                let columns = df
                    .iter_columns()
                    .map(|c| c?.to_values())
                    .collect::<DataResult<Vec<_>>>()?;
                ApplyResult::Table {
                    names,
                    columns,
                    rows: df.num_rows(),
                }
            }
            Output::Matrix(rows) => matrix_to_table(rows)?,
            Output::Cell(inner) => match *inner {
                Output::Value(value) => ApplyResult::Scalar(value),
                Output::Values(values) => ApplyResult::Scalar(Value::list(values)),
                Output::Series(series) => ApplyResult::Scalar(Value::list(series.to_values()?)),
                _ => {
                    return Err(DataError::shape(
                        "cell",
                        "only a value or a sequence can be stored in a single cell",
                    ))
                }
            },
        })
    }

    pub(crate) fn kind(&self) -> ResultKind {
        match self {
            ApplyResult::Scalar(_) => ResultKind::Scalar,
            ApplyResult::Vector(_) => ResultKind::Vector,
            ApplyResult::Row { .. } => ResultKind::Row,
            ApplyResult::Table { .. } => ResultKind::Table,
        }
    }

    /// Field names of row and table results
    pub(crate) fn field_names(&self) -> Option<&[String]> {
        match self {
            ApplyResult::Row { names, .. } | ApplyResult::Table { names, .. } => Some(names),
            _ => None,
        }
    }

    /// Rows produced, or None for scalars and rows
    pub(crate) fn num_rows(&self) -> Option<usize> {
        match self {
            ApplyResult::Scalar(_) | ApplyResult::Row { .. } => None,
            ApplyResult::Vector(values) => Some(values.len()),
            ApplyResult::Table { rows, .. } => Some(*rows),
        }
    }

    /// Whether this result repeats to fill any row count
    ///
    /// Scalars, rows and single-row vectors or tables broadcast.
    pub(crate) fn broadcasts(&self) -> bool {
        self.num_rows().map_or(true, |rows| rows == 1)
    }

    /// Value of output column `col` at output row `row`
    ///
    /// Broadcasting results ignore `row`. Callers guarantee both are in range.
    pub(crate) fn value_at(&self, col: usize, row: usize) -> &Value {
        match self {
            ApplyResult::Scalar(value) => value,
            ApplyResult::Vector(values) if values.len() == 1 => &values[0],
            ApplyResult::Vector(values) => &values[row],
            ApplyResult::Row { values, .. } => &values[col],
            ApplyResult::Table { columns, rows: 1, .. } => &columns[col][0],
            ApplyResult::Table { columns, .. } => &columns[col][row],
        }
    }
}

fn check_unique(names: &[String]) -> DataResult<()> {
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(DataError::shape(
                "result fields",
                format!("duplicate field name '{name}'"),
            ));
        }
    }
    Ok(())
}

fn check_equal_lengths(names: &[String], columns: &[Vec<Value>]) -> DataResult<()> {
    if let Some(first) = columns.first() {
        for (name, column) in names.iter().zip(columns) {
            if column.len() != first.len() {
                return Err(DataError::shape(
                    "result columns",
                    format!(
                        "column '{name}' has {} values, expected {}",
                        column.len(),
                        first.len()
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn matrix_to_table(rows: Vec<Vec<Value>>) -> DataResult<ApplyResult> {
    let width = rows.first().map_or(0, Vec::len);
    let height = rows.len();
    let mut columns = vec![Vec::with_capacity(rows.len()); width];
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != width {
            return Err(DataError::shape(
                "matrix result",
                format!("row {i} has {} values, expected {width}", row.len()),
            ));
        }
        for (column, value) in columns.iter_mut().zip(row) {
            column.push(value);
        }
    }
    let names = (1..=width).map(|i| format!("x{i}")).collect();
    Ok(ApplyResult::Table {
        names,
        columns,
        rows: height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_basic_shapes() {
        assert_eq!(
            ApplyResult::classify(Output::from(3_i64)).unwrap(),
            ApplyResult::Scalar(Value::Int(3))
        );
        let vector = ApplyResult::classify(Series::from_ints("s", vec![1, 2]).into()).unwrap();
        assert_eq!(vector.kind(), ResultKind::Vector);
        assert_eq!(vector.num_rows(), Some(2));

        let row = ApplyResult::classify(Output::record([("a", 1), ("b", 2)])).unwrap();
        assert_eq!(row.kind(), ResultKind::Row);
        assert_eq!(row.num_rows(), None);
        assert_eq!(row.value_at(1, 7), &Value::Int(2));
    }

    #[test]
    fn test_cell_unwraps_to_scalar() {
        let cell = Output::cell(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            ApplyResult::classify(cell).unwrap(),
            ApplyResult::Scalar(Value::list(vec![Value::Int(1), Value::Int(2)]))
        );
        let nested = Output::cell(Output::record([("a", 1)]));
        assert!(ApplyResult::classify(nested).is_err());
    }

    #[test]
    fn test_matrix_becomes_table() {
        let m = Output::Matrix(vec![
            vec![Value::Int(1), Value::Int(2)],
            vec![Value::Int(3), Value::Int(4)],
            vec![Value::Int(5), Value::Int(6)],
        ]);
        let table = ApplyResult::classify(m).unwrap();
        assert_eq!(table.field_names().unwrap(), ["x1", "x2"]);
        assert_eq!(table.num_rows(), Some(3));
        assert_eq!(table.value_at(1, 2), &Value::Int(6));

        let ragged = Output::Matrix(vec![vec![Value::Int(1)], vec![]]);
        assert!(matches!(
            ApplyResult::classify(ragged),
            Err(DataError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_columns_must_be_equal_length_and_unique() {
        let ragged = Output::columns([("a", vec![Value::Int(1)]), ("b", vec![])]);
        assert!(ApplyResult::classify(ragged).is_err());
        let dup = Output::record([("a", 1), ("a", 2)]);
        assert!(ApplyResult::classify(dup).is_err());
    }

    #[test]
    fn test_table_output() {
        let df = DataFrame::from_series(vec![
            Series::from_ints("lo", vec![1, 2]),
            Series::from_strings("tag", vec!["p", "q"]),
        ])
        .unwrap();
        let table = ApplyResult::classify(df.into()).unwrap();
        assert_eq!(table.field_names().unwrap().len(), 2);
        assert_eq!(table.value_at(1, 0), &Value::string("p"));
    }

    #[test]
    fn test_zero_column_table_keeps_height() {
        let df = DataFrame::zero_columns(2).unwrap();
        let table = ApplyResult::classify(df.into()).unwrap();
        assert!(table.field_names().unwrap().is_empty());
        assert_eq!(table.num_rows(), Some(2));
        assert!(!table.broadcasts());
    }

    #[test]
    fn test_single_row_results_broadcast() {
        let one = ApplyResult::classify(Output::Values(vec![Value::Int(7)])).unwrap();
        assert!(one.broadcasts());
        assert_eq!(one.value_at(0, 4), &Value::Int(7));

        let two = ApplyResult::classify(Output::Values(vec![Value::Int(1), Value::Int(2)])).unwrap();
        assert!(!two.broadcasts());

        let table = ApplyResult::classify(Output::columns([("a", vec![Value::Int(3)])])).unwrap();
        assert!(table.broadcasts());
        assert_eq!(table.value_at(0, 5), &Value::Int(3));
    }
}
