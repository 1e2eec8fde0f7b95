//! Group index: partition of row positions by composite key

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::DataType;
use tracing::debug;

use crate::dataframe::DataFrame;
use crate::error::{DataError, DataResult};
use crate::key::{column_key_parts, GroupKey, KeyPart, KeyTuple};
use crate::options::GroupOrder;
use crate::selector::ColumnSelector;
use crate::value::Value;

#[derive(Debug, Clone)]
struct Group {
    tuple: KeyTuple,
    key: GroupKey,
    rows: Vec<usize>,
}

/// Partition of a table's rows into groups, with keyed lookup
///
/// The row lists of all groups partition `0..num_rows` exactly. Rows within a
/// group are in ascending source order.
#[derive(Debug, Clone)]
pub struct GroupIndex {
    key_columns: Arc<[String]>,
    key_types: Vec<DataType>,
    groups: Vec<Group>,
    lookup: HashMap<KeyTuple, usize>,
    row_group: Vec<usize>,
    order: GroupOrder,
}

impl GroupIndex {
    /// Build an index over `df` keyed by the columns `keys` selects
    ///
    /// Grouping by no columns yields one group holding every row, or no groups
    /// for an empty table.
    ///
    /// # Errors
    /// Returns error if the selector does not resolve or a key column has an
    /// unhashable type
    pub fn build(df: &DataFrame, keys: &ColumnSelector, order: GroupOrder) -> DataResult<Self> {
        let key_columns = keys.resolve(&df.columns())?;
        let num_rows = df.num_rows();

        let mut key_types = Vec::with_capacity(key_columns.len());
        let mut key_parts = Vec::with_capacity(key_columns.len());
        for name in &key_columns {
            let series = df.column(name)?;
            key_types.push(series.data_type().clone());
            key_parts.push(column_key_parts(&series)?);
        }

        let mut groups: Vec<(KeyTuple, Vec<usize>)> = Vec::new();
        let mut lookup: HashMap<KeyTuple, usize> = HashMap::new();
        if key_columns.is_empty() {
            if num_rows > 0 {
                let tuple: KeyTuple = Box::new([]);
                lookup.insert(tuple.clone(), 0);
                groups.push((tuple, (0..num_rows).collect()));
            }
        } else {
            for row in 0..num_rows {
                let tuple: KeyTuple = key_parts.iter().map(|col| col[row].clone()).collect();
                match lookup.entry(tuple) {
                    Entry::Occupied(entry) => groups[*entry.get()].1.push(row),
                    Entry::Vacant(entry) => {
                        groups.push((entry.key().clone(), vec![row]));
                        entry.insert(groups.len() - 1);
                    }
                }
            }
        }

        if order == GroupOrder::Sorted {
            // Null is the greatest KeyPart, so all-null tuples land last
            groups.sort_by(|a, b| a.0.cmp(&b.0));
            for (id, (tuple, _)) in groups.iter().enumerate() {
                lookup.insert(tuple.clone(), id);
            }
        }

        let mut row_group = vec![0; num_rows];
        for (id, (_, rows)) in groups.iter().enumerate() {
            for &row in rows {
                row_group[row] = id;
            }
        }

        let key_columns: Arc<[String]> = Arc::from(key_columns);
        let groups: Vec<Group> = groups
            .into_iter()
            .map(|(tuple, rows)| Group {
                key: GroupKey::new(
                    key_columns.clone(),
                    tuple.iter().map(KeyPart::to_value).collect(),
                ),
                tuple,
                rows,
            })
            .collect();

        debug!(
            keys = ?key_columns,
            rows = num_rows,
            groups = groups.len(),
            order = ?order,
            "built group index"
        );

        Ok(Self {
            key_columns,
            key_types,
            groups,
            lookup,
            row_group,
            order,
        })
    }

    /// Names of the key columns
    #[must_use]
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Number of groups
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of rows in the indexed table
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.row_group.len()
    }

    #[must_use]
    pub fn order(&self) -> GroupOrder {
        self.order
    }

    /// Key of group `id`
    ///
    /// # Errors
    /// Returns error if `id` is out of range
    pub fn key(&self, id: usize) -> DataResult<&GroupKey> {
        self.group(id).map(|g| &g.key)
    }

    /// Row positions of group `id`
    ///
    /// # Errors
    /// Returns error if `id` is out of range
    pub fn rows(&self, id: usize) -> DataResult<&[usize]> {
        self.group(id).map(|g| g.rows.as_slice())
    }

    /// Group id of every source row
    #[must_use]
    pub fn group_indices(&self) -> &[usize] {
        &self.row_group
    }

    /// Find the group whose key equals `values`, given in key column order
    ///
    /// Nulls match nulls. An integer matches a float key column when the
    /// values are numerically equal.
    ///
    /// # Errors
    /// Returns error if the number of values differs from the number of key
    /// columns or a value cannot be a key
    pub fn find(&self, values: &[Value]) -> DataResult<Option<usize>> {
        if values.len() != self.key_columns.len() {
            return Err(DataError::Grouping(format!(
                "expected {} key values for {:?}, got {}",
                self.key_columns.len(),
                self.key_columns,
                values.len()
            )));
        }
        let tuple = values
            .iter()
            .zip(&self.key_types)
            .map(|(value, dtype)| KeyPart::from_value(value, dtype))
            .collect::<DataResult<KeyTuple>>()?;
        Ok(self.lookup.get(&tuple).copied())
    }

    fn group(&self, id: usize) -> DataResult<&Group> {
        self.groups.get(id).ok_or(DataError::OutOfBounds {
            index: id,
            length: self.groups.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;

    fn sample() -> DataFrame {
        DataFrame::from_series(vec![
            Series::from_optional_strings(
                "region",
                vec![Some("North"), Some("South"), None, Some("North"), None, Some("East")],
            ),
            Series::from_ints("amount", vec![100, 200, 150, 250, 175, 50]),
        ])
        .unwrap()
    }

    #[test]
    fn test_first_appearance_order() {
        let index = GroupIndex::build(&sample(), &"region".into(), GroupOrder::FirstAppearance)
            .unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.key(0).unwrap().values(), [Value::string("North")]);
        assert_eq!(index.key(2).unwrap().values(), [Value::Null]);
        assert_eq!(index.rows(0).unwrap(), [0, 3]);
        assert_eq!(index.rows(2).unwrap(), [2, 4]);
        assert_eq!(index.group_indices(), [0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_sorted_order_nulls_last() {
        let index = GroupIndex::build(&sample(), &"region".into(), GroupOrder::Sorted).unwrap();
        let keys: Vec<Value> = (0..index.len())
            .map(|i| index.key(i).unwrap().values()[0].clone())
            .collect();
        assert_eq!(
            keys,
            vec![
                Value::string("East"),
                Value::string("North"),
                Value::string("South"),
                Value::Null
            ]
        );
        assert_eq!(index.find(&[Value::Null]).unwrap(), Some(3));
        assert_eq!(index.group_indices()[5], 0);
    }

    #[test]
    fn test_no_keys_single_group() {
        let df = sample();
        let index = GroupIndex::build(&df, &ColumnSelector::List(vec![]), GroupOrder::default())
            .unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.rows(0).unwrap().len(), df.num_rows());
        assert!(index.key(0).unwrap().is_empty());
        assert_eq!(index.find(&[]).unwrap(), Some(0));

        let empty = df.take(&[]).unwrap();
        let index = GroupIndex::build(&empty, &ColumnSelector::List(vec![]), GroupOrder::default())
            .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_find_arity_and_missing() {
        let index = GroupIndex::build(&sample(), &"region".into(), GroupOrder::default()).unwrap();
        assert_eq!(index.find(&[Value::string("South")]).unwrap(), Some(1));
        assert_eq!(index.find(&[Value::string("West")]).unwrap(), None);
        assert!(matches!(
            index.find(&[Value::Null, Value::Int(1)]),
            Err(DataError::Grouping(_))
        ));
    }

    #[test]
    fn test_multi_column_keys() {
        let df = DataFrame::from_series(vec![
            Series::from_ints("a", vec![1, 1, 2, 1]),
            Series::from_floats("b", vec![0.5, 1.5, 0.5, 0.5]),
        ])
        .unwrap();
        let index = GroupIndex::build(&df, &["a", "b"].into(), GroupOrder::default()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.rows(0).unwrap(), [0, 3]);
        assert_eq!(
            index.find(&[Value::Int(2), Value::Float(0.5)]).unwrap(),
            Some(2)
        );
        assert_eq!(index.key_columns(), ["a", "b"]);
    }

    #[test]
    fn test_out_of_range_group() {
        let index = GroupIndex::build(&sample(), &"region".into(), GroupOrder::default()).unwrap();
        assert!(matches!(
            index.rows(10),
            Err(DataError::OutOfBounds { index: 10, length: 4 })
        ));
    }
}
