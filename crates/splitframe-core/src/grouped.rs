//! Grouped DataFrame: a source table paired with a group index

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::dataframe::DataFrame;
use crate::error::{DataError, DataResult};
use crate::index::GroupIndex;
use crate::key::GroupKey;
use crate::options::GroupOptions;
use crate::selector::ColumnSelector;
use crate::series::Series;
use crate::value::Value;

/// Zero-copy view of one group's rows in the source table
#[derive(Clone, Copy)]
pub struct GroupView<'a> {
    source: &'a DataFrame,
    rows: &'a [usize],
    key: &'a GroupKey,
}

impl<'a> GroupView<'a> {
    /// Key of this group
    #[must_use]
    pub fn key(&self) -> &'a GroupKey {
        self.key
    }

    /// Positions of this group's rows in the source table
    #[must_use]
    pub fn rows(&self) -> &'a [usize] {
        self.rows
    }

    /// Number of rows in the group
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Column names (every source column, keys included)
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.source.columns()
    }

    /// The group's slice of a column
    ///
    /// # Errors
    /// Returns error if the column doesn't exist
    pub fn column(&self, name: &str) -> DataResult<Series> {
        self.source.column(name)?.take(self.rows)
    }

    /// Value at row `row` of the group
    ///
    /// # Errors
    /// Returns error if the column doesn't exist or `row` is out of range
    pub fn get(&self, column: &str, row: usize) -> DataResult<Value> {
        let &position = self.rows.get(row).ok_or(DataError::OutOfBounds {
            index: row,
            length: self.rows.len(),
        })?;
        self.source.column(column)?.get(position)
    }

    /// Materialize the group as its own DataFrame
    ///
    /// # Errors
    /// Returns error if the rows cannot be gathered
    pub fn to_dataframe(&self) -> DataResult<DataFrame> {
        self.source.take(self.rows)
    }
}

impl fmt::Debug for GroupView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupView")
            .field("key", &self.key.to_string())
            .field("rows", &self.rows.len())
            .finish()
    }
}

/// Reference to a group by position in the view or by key values
#[derive(Debug, Clone, PartialEq)]
pub enum GroupRef {
    Position(usize),
    Key(Vec<Value>),
}

impl From<usize> for GroupRef {
    fn from(position: usize) -> Self {
        GroupRef::Position(position)
    }
}

impl From<Vec<Value>> for GroupRef {
    fn from(key: Vec<Value>) -> Self {
        GroupRef::Key(key)
    }
}

/// A grouped DataFrame - the result of calling group_by on a DataFrame
///
/// Restricted views produced by `lookup`, `select_groups` and
/// `filter_groups` share the source table and the index.
#[derive(Clone)]
pub struct GroupedDataFrame {
    /// The underlying DataFrame
    source: Arc<DataFrame>,
    index: Arc<GroupIndex>,
    /// Group ids visible through this view, in view order (None = all groups)
    subset: Option<Arc<[usize]>>,
}

impl GroupedDataFrame {
    /// Group `source` by the columns `keys` selects, in first-appearance order
    ///
    /// # Errors
    /// Returns error if the key columns don't resolve or can't be hashed
    pub fn new(source: Arc<DataFrame>, keys: impl Into<ColumnSelector>) -> DataResult<Self> {
        Self::with_options(source, keys, GroupOptions::default())
    }

    /// Group with explicit options
    ///
    /// # Errors
    /// Returns error if the key columns don't resolve or can't be hashed
    pub fn with_options(
        source: Arc<DataFrame>,
        keys: impl Into<ColumnSelector>,
        options: GroupOptions,
    ) -> DataResult<Self> {
        let index = GroupIndex::build(&source, &keys.into(), options.order)?;
        Ok(Self {
            source,
            index: Arc::new(index),
            subset: None,
        })
    }

    /// The table this view was built on
    #[must_use]
    pub fn parent(&self) -> &Arc<DataFrame> {
        &self.source
    }

    /// The shared group index
    #[must_use]
    pub fn index(&self) -> &GroupIndex {
        &self.index
    }

    /// Names of the grouping columns
    #[must_use]
    pub fn key_columns(&self) -> &[String] {
        self.index.key_columns()
    }

    /// Source columns that are not grouping columns, in table order
    #[must_use]
    pub fn value_columns(&self) -> Vec<String> {
        let keys = self.key_columns();
        self.source
            .columns()
            .into_iter()
            .filter(|c| !keys.contains(c))
            .collect()
    }

    /// Number of groups visible through this view
    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.subset
            .as_ref()
            .map_or_else(|| self.index.len(), |ids| ids.len())
    }

    /// Whether this view exposes every group of the index
    #[must_use]
    pub fn covers_all_rows(&self) -> bool {
        self.subset
            .as_ref()
            .map_or(true, |ids| ids.len() == self.index.len())
    }

    /// Key of the group at view position `i`
    ///
    /// # Errors
    /// Returns error if `i` is out of range
    pub fn group_key(&self, i: usize) -> DataResult<&GroupKey> {
        self.index.key(self.group_id(i)?)
    }

    /// Source row positions of the group at view position `i`
    ///
    /// # Errors
    /// Returns error if `i` is out of range
    pub fn group_rows(&self, i: usize) -> DataResult<&[usize]> {
        self.index.rows(self.group_id(i)?)
    }

    /// Zero-copy view of the group at view position `i`
    ///
    /// # Errors
    /// Returns error if `i` is out of range
    pub fn group(&self, i: usize) -> DataResult<GroupView<'_>> {
        let id = self.group_id(i)?;
        Ok(GroupView {
            source: &self.source,
            rows: self.index.rows(id)?,
            key: self.index.key(id)?,
        })
    }

    /// Iterate over the visible groups in view order
    pub fn iter(&self) -> impl Iterator<Item = GroupView<'_>> + '_ {
        (0..self.num_groups()).filter_map(move |i| self.group(i).ok())
    }

    /// View position of the group with the given key values
    ///
    /// # Errors
    /// Returns error if the number of values differs from the number of key columns
    pub fn find_group(&self, key: &[Value]) -> DataResult<Option<usize>> {
        let Some(id) = self.index.find(key)? else {
            return Ok(None);
        };
        Ok(match &self.subset {
            None => Some(id),
            Some(ids) => ids.iter().position(|&g| g == id),
        })
    }

    /// View position of the group with the given named key fields, in any order
    ///
    /// # Errors
    /// Returns error for unknown, repeated or missing key fields
    pub fn find_group_by_fields(&self, fields: &[(&str, Value)]) -> DataResult<Option<usize>> {
        let keys = self.key_columns();
        if fields.len() != keys.len() {
            return Err(DataError::Grouping(format!(
                "expected fields {keys:?}, got {} fields",
                fields.len()
            )));
        }
        let mut values = vec![None; keys.len()];
        for (name, value) in fields {
            let pos = keys.iter().position(|k| k == name).ok_or_else(|| {
                DataError::Grouping(format!("'{name}' is not a grouping column"))
            })?;
            if values[pos].replace(value.clone()).is_some() {
                return Err(DataError::Grouping(format!("key field '{name}' given twice")));
            }
        }
        let values: Vec<Value> = values.into_iter().map(Option::unwrap_or_default).collect();
        self.find_group(&values)
    }

    /// View restricted to the single group with the given key
    ///
    /// # Errors
    /// Returns error if no group has this key
    pub fn lookup(&self, key: &[Value]) -> DataResult<Self> {
        self.select_groups(&[GroupRef::Key(key.to_vec())])
    }

    /// View restricted to, and ordered by, the given keys
    ///
    /// # Errors
    /// Returns error if a key is not found or repeated
    pub fn lookup_many(&self, keys: &[Vec<Value>]) -> DataResult<Self> {
        let refs: Vec<GroupRef> = keys.iter().cloned().map(GroupRef::Key).collect();
        self.select_groups(&refs)
    }

    /// View restricted to, and ordered by, the given groups
    ///
    /// # Errors
    /// Returns error if a position is out of range, a key is not found, or a
    /// group is selected twice
    pub fn select_groups(&self, groups: &[GroupRef]) -> DataResult<Self> {
        let mut ids = Vec::with_capacity(groups.len());
        let mut seen = HashSet::with_capacity(groups.len());
        for group in groups {
            let id = match group {
                GroupRef::Position(i) => self.group_id(*i)?,
                GroupRef::Key(key) => {
                    let pos = self.find_group(key)?.ok_or_else(|| {
                        DataError::Grouping(format!("no group with key {}", render_key(key)))
                    })?;
                    self.group_id(pos)?
                }
            };
            if !seen.insert(id) {
                return Err(DataError::Grouping(format!(
                    "group {} selected more than once",
                    self.index.key(id)?
                )));
            }
            ids.push(id);
        }
        Ok(self.restricted(ids))
    }

    /// View keeping the groups for which `predicate` holds, in view order
    #[must_use]
    pub fn filter_groups(&self, mut predicate: impl FnMut(&GroupView<'_>) -> bool) -> Self {
        let ids = self
            .iter()
            .zip(self.group_ids())
            .filter(|(view, _)| predicate(view))
            .map(|(_, id)| id)
            .collect();
        self.restricted(ids)
    }

    /// One row per visible group holding its key values, with source column types
    ///
    /// # Errors
    /// Returns error if the key columns cannot be gathered
    pub fn keys(&self) -> DataResult<DataFrame> {
        let first_rows = (0..self.num_groups())
            .map(|i| self.group_rows(i).map(|rows| rows[0]))
            .collect::<DataResult<Vec<_>>>()?;
        let columns = self
            .key_columns()
            .iter()
            .map(|name| self.source.column(name)?.take(&first_rows))
            .collect::<DataResult<Vec<_>>>()?;
        if columns.is_empty() {
            return DataFrame::zero_columns(first_rows.len());
        }
        DataFrame::from_series(columns)
    }

    /// Source rows of the visible groups, concatenated in view order
    ///
    /// # Errors
    /// Returns error if the rows cannot be gathered
    pub fn to_dataframe(&self) -> DataResult<DataFrame> {
        let mut rows = Vec::new();
        for i in 0..self.num_groups() {
            rows.extend_from_slice(self.group_rows(i)?);
        }
        self.source.take(&rows)
    }

    /// Ids of the visible groups in view order
    pub(crate) fn group_ids(&self) -> Vec<usize> {
        match &self.subset {
            None => (0..self.index.len()).collect(),
            Some(ids) => ids.to_vec(),
        }
    }

    fn group_id(&self, i: usize) -> DataResult<usize> {
        let out_of_bounds = || DataError::OutOfBounds {
            index: i,
            length: self.num_groups(),
        };
        match &self.subset {
            None if i < self.index.len() => Ok(i),
            None => Err(out_of_bounds()),
            Some(ids) => ids.get(i).copied().ok_or_else(out_of_bounds),
        }
    }

    fn restricted(&self, ids: Vec<usize>) -> Self {
        Self {
            source: self.source.clone(),
            index: self.index.clone(),
            subset: Some(Arc::from(ids)),
        }
    }
}

fn render_key(values: &[Value]) -> String {
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

impl fmt::Debug for GroupedDataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupedDataFrame")
            .field("key_columns", &self.key_columns())
            .field("num_groups", &self.num_groups())
            .field("source_rows", &self.source.num_rows())
            .finish()
    }
}
