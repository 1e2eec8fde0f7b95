//! DataFrame: A columnar data structure backed by Apache Arrow

use std::fmt;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::{Field, Schema, SchemaRef};

use crate::error::{DataError, DataResult};
use crate::parallel::should_parallelize;
use crate::series::Series;

/// A DataFrame is a two-dimensional, column-oriented data structure
/// backed by Apache Arrow.
///
/// The grouping engine treats it as read-only: every operation returns a new
/// DataFrame and the column arrays are shared, not copied.
#[derive(Clone)]
pub struct DataFrame {
    /// The Arrow schema (column names and types)
    schema: SchemaRef,
    /// The data as Arrow RecordBatches
    batches: Vec<RecordBatch>,
}

impl DataFrame {
    /// Create an empty DataFrame with a schema
    #[must_use]
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    /// Create a DataFrame from a vector of Series
    ///
    /// # Errors
    /// Returns error if series have different lengths or duplicate names
    pub fn from_series(columns: Vec<Series>) -> DataResult<Self> {
        if columns.is_empty() {
            let schema = Arc::new(Schema::empty());
            return Ok(Self::empty(schema));
        }

        // Check all columns have the same length
        let len = columns[0].len();
        for col in &columns {
            if col.len() != len {
                return Err(DataError::SchemaMismatch(format!(
                    "column '{}' has {} rows, expected {}",
                    col.name(),
                    col.len(),
                    len
                )));
            }
        }

        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|other| other.name() == col.name()) {
                return Err(DataError::SchemaMismatch(format!(
                    "duplicate column name '{}'",
                    col.name()
                )));
            }
        }

        // Build schema and arrays
        let fields: Vec<Field> = columns
            .iter()
            .map(|s| Field::new(s.name(), s.data_type().clone(), true))
            .collect();

        let schema = Arc::new(Schema::new(fields));

        let arrays: Vec<_> = columns.iter().map(|s| s.array().clone()).collect();

        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        Ok(Self {
            schema,
            batches: vec![batch],
        })
    }

    /// Get the schema
    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Get column names
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Get the number of columns
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// Get the number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Check if the DataFrame is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Get a column by name as a Series
    ///
    /// # Errors
    /// Returns error if column not found
    pub fn column(&self, name: &str) -> DataResult<Series> {
        let idx = self
            .schema
            .index_of(name)
            .map_err(|_| DataError::ColumnNotFound(name.to_string()))?;
        self.column_by_index(idx)
    }

    /// Get a column by index as a Series
    ///
    /// # Errors
    /// Returns error if index is out of bounds
    pub fn column_by_index(&self, index: usize) -> DataResult<Series> {
        if index >= self.num_columns() {
            return Err(DataError::InvalidColumnIndex(index));
        }

        let field = self.schema.field(index);
        let name = field.name().clone();

        if self.batches.is_empty() {
            // Return empty series with correct type
            let array = arrow::array::new_empty_array(field.data_type());
            return Ok(Series::new(name, array));
        }

        if self.batches.len() == 1 {
            let array = self.batches[0].column(index).clone();
            return Ok(Series::new(name, array));
        }

        // Multiple batches - need to concatenate
        let arrays: Vec<_> = self
            .batches
            .iter()
            .map(|b| b.column(index).as_ref())
            .collect();
        let concatenated = arrow::compute::concat(&arrays)?;
        Ok(Series::new(name, concatenated))
    }

    /// Iterate over columns, returning each column as a Series
    pub fn iter_columns(&self) -> impl Iterator<Item = DataResult<Series>> + '_ {
        (0..self.num_columns()).map(move |i| self.column_by_index(i))
    }

    /// Take the rows at the given indices, in that order
    ///
    /// Automatically uses parallel processing for large DataFrames.
    ///
    /// # Errors
    /// Returns error if any index is out of bounds
    pub fn take(&self, indices: &[usize]) -> DataResult<Self> {
        let num_rows = self.num_rows();
        for &idx in indices {
            if idx >= num_rows {
                return Err(DataError::OutOfBounds {
                    index: idx,
                    length: num_rows,
                });
            }
        }

        if should_parallelize(indices.len() * self.num_columns()) {
            self.take_parallel(indices)
        } else {
            self.take_sequential(indices)
        }
    }

    fn take_sequential(&self, indices: &[usize]) -> DataResult<Self> {
        let columns = self
            .iter_columns()
            .map(|col| col?.take(indices))
            .collect::<DataResult<Vec<_>>>()?;
        self.with_rows(columns, indices.len())
    }

    fn take_parallel(&self, indices: &[usize]) -> DataResult<Self> {
        use rayon::prelude::*;

        let columns: Vec<Series> = self.iter_columns().collect::<DataResult<Vec<_>>>()?;
        let taken = columns
            .into_par_iter()
            .map(|col| col.take(indices))
            .collect::<DataResult<Vec<_>>>()?;
        self.with_rows(taken, indices.len())
    }

    /// Add or replace a column with a Series
    ///
    /// A column with the same name is replaced in place; otherwise the
    /// column is appended.
    ///
    /// # Errors
    /// Returns error if the Series has a different length than the DataFrame
    pub fn with_column(&self, series: Series) -> DataResult<Self> {
        if series.len() != self.num_rows() && self.num_columns() > 0 {
            return Err(DataError::SchemaMismatch(format!(
                "cannot add column '{}' with {} rows to DataFrame with {} rows",
                series.name(),
                series.len(),
                self.num_rows()
            )));
        }

        let mut columns: Vec<Series> = self.iter_columns().collect::<DataResult<Vec<_>>>()?;
        match columns.iter().position(|c| c.name() == series.name()) {
            Some(pos) => columns[pos] = series,
            None => columns.push(series),
        }
        DataFrame::from_series(columns)
    }

    fn with_rows(&self, columns: Vec<Series>, num_rows: usize) -> DataResult<Self> {
        if columns.is_empty() {
            return Self::zero_columns(num_rows);
        }
        DataFrame::from_series(columns)
    }

    /// A DataFrame with no columns but `num_rows` rows
    ///
    /// # Errors
    /// Returns error if the batch cannot be built
    pub fn zero_columns(num_rows: usize) -> DataResult<Self> {
        let schema = Arc::new(Schema::empty());
        let options = arrow::array::RecordBatchOptions::new().with_row_count(Some(num_rows));
        let batch = RecordBatch::try_new_with_options(schema.clone(), vec![], &options)?;
        Ok(Self {
            schema,
            batches: vec![batch],
        })
    }

    /// Pretty print the DataFrame for display
    #[must_use]
    pub fn to_pretty_string(&self, max_rows: usize) -> String {
        use arrow::util::pretty::pretty_format_batches;

        if self.batches.is_empty() {
            return format!("Empty DataFrame with columns: {:?}", self.columns());
        }

        let shown: Vec<usize> = (0..self.num_rows().min(max_rows)).collect();
        let display_df = match self.take_sequential(&shown) {
            Ok(df) => df,
            Err(_) => return "Error formatting DataFrame".to_string(),
        };

        match pretty_format_batches(&display_df.batches) {
            Ok(table) => {
                let total = self.num_rows();
                if total > max_rows {
                    format!("{table}\n... showing {max_rows} of {total} rows")
                } else {
                    table.to_string()
                }
            }
            Err(e) => format!("Error formatting: {e}"),
        }
    }
}

impl fmt::Debug for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFrame")
            .field("columns", &self.columns())
            .field("rows", &self.num_rows())
            .field("batches", &self.batches.len())
            .finish()
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pretty_string(20))
    }
}
