//! Column selectors: declarative column selections resolved against a schema

use std::fmt;

use regex::Regex;

use crate::error::{DataError, DataResult};

/// A declarative selection of columns
///
/// Resolution yields an ordered, duplicate-free list of names. Lists keep the
/// order they were written in; `All`, `Not` and `Regex` keep table order.
#[derive(Debug, Clone)]
pub enum ColumnSelector {
    /// A single column by name
    Name(String),
    /// A single column by 0-based position
    Index(usize),
    /// Several selectors, resolved in order; repeated columns keep their first position
    List(Vec<ColumnSelector>),
    /// Every column
    All,
    /// Every column not matched by the inner selector
    Not(Box<ColumnSelector>),
    /// The inclusive range between two single-column bounds
    Between(Box<ColumnSelector>, Box<ColumnSelector>),
    /// Columns whose name matches the pattern
    Regex(Regex),
}

impl ColumnSelector {
    /// Select columns by regular expression
    ///
    /// # Errors
    /// Returns error if the pattern does not compile
    pub fn regex(pattern: &str) -> DataResult<Self> {
        Regex::new(pattern)
            .map(ColumnSelector::Regex)
            .map_err(|e| DataError::Selector(format!("invalid pattern {pattern:?}: {e}")))
    }

    /// Select every column not matched by `inner`
    #[must_use]
    pub fn not(inner: impl Into<ColumnSelector>) -> Self {
        ColumnSelector::Not(Box::new(inner.into()))
    }

    /// Select the inclusive range of columns between two bounds
    #[must_use]
    pub fn between(from: impl Into<ColumnSelector>, to: impl Into<ColumnSelector>) -> Self {
        ColumnSelector::Between(Box::new(from.into()), Box::new(to.into()))
    }

    /// Resolve against an ordered list of column names
    ///
    /// A pattern that matches nothing resolves to an empty list.
    ///
    /// # Errors
    /// Returns error for unknown names or out-of-range positions
    pub fn resolve(&self, columns: &[String]) -> DataResult<Vec<String>> {
        let mut out = Vec::new();
        self.resolve_into(columns, &mut out)?;
        Ok(out)
    }

    /// Resolve, requiring at least one column
    ///
    /// # Errors
    /// Returns error if resolution fails or selects nothing
    pub fn resolve_required(&self, columns: &[String]) -> DataResult<Vec<String>> {
        let resolved = self.resolve(columns)?;
        if resolved.is_empty() {
            return Err(DataError::Selector(format!(
                "selector {self} matched no columns"
            )));
        }
        Ok(resolved)
    }

    /// Resolve to exactly one column
    ///
    /// # Errors
    /// Returns error if the selector does not name exactly one column
    pub fn resolve_single(&self, columns: &[String]) -> DataResult<String> {
        let mut resolved = self.resolve(columns)?;
        if resolved.len() != 1 {
            return Err(DataError::Selector(format!(
                "selector {self} must select exactly one column, got {}",
                resolved.len()
            )));
        }
        Ok(resolved.remove(0))
    }

    fn resolve_into(&self, columns: &[String], out: &mut Vec<String>) -> DataResult<()> {
        match self {
            ColumnSelector::Name(name) => {
                if !columns.contains(name) {
                    return Err(DataError::Selector(format!("column '{name}' not found")));
                }
                push_unique(out, name);
            }
            ColumnSelector::Index(idx) => {
                let name = columns.get(*idx).ok_or_else(|| {
                    DataError::Selector(format!(
                        "column position {idx} out of range for {} columns",
                        columns.len()
                    ))
                })?;
                push_unique(out, name);
            }
            ColumnSelector::List(items) => {
                for item in items {
                    item.resolve_into(columns, out)?;
                }
            }
            ColumnSelector::All => {
                for name in columns {
                    push_unique(out, name);
                }
            }
            ColumnSelector::Not(inner) => {
                let excluded = inner.resolve(columns)?;
                for name in columns.iter().filter(|c| !excluded.contains(c)) {
                    push_unique(out, name);
                }
            }
            ColumnSelector::Between(from, to) => {
                let start = position_of(from, columns)?;
                let end = position_of(to, columns)?;
                if start > end {
                    return Err(DataError::Selector(format!(
                        "range start {from} comes after range end {to}"
                    )));
                }
                for name in &columns[start..=end] {
                    push_unique(out, name);
                }
            }
            ColumnSelector::Regex(re) => {
                for name in columns.iter().filter(|c| re.is_match(c)) {
                    push_unique(out, name);
                }
            }
        }
        Ok(())
    }
}

/// Position of a range bound; bounds must be a single name or position
fn position_of(bound: &ColumnSelector, columns: &[String]) -> DataResult<usize> {
    match bound {
        ColumnSelector::Name(name) => columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DataError::Selector(format!("column '{name}' not found"))),
        ColumnSelector::Index(idx) if *idx < columns.len() => Ok(*idx),
        ColumnSelector::Index(idx) => Err(DataError::Selector(format!(
            "column position {idx} out of range for {} columns",
            columns.len()
        ))),
        other => Err(DataError::Selector(format!(
            "range bound must be a column name or position, got {other}"
        ))),
    }
}

fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|existing| existing == name) {
        out.push(name.to_string());
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSelector::Name(name) => write!(f, "'{name}'"),
            ColumnSelector::Index(idx) => write!(f, "#{idx}"),
            ColumnSelector::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ColumnSelector::All => write!(f, "all"),
            ColumnSelector::Not(inner) => write!(f, "not({inner})"),
            ColumnSelector::Between(from, to) => write!(f, "between({from}, {to})"),
            ColumnSelector::Regex(re) => write!(f, "r{:?}", re.as_str()),
        }
    }
}

impl From<&str> for ColumnSelector {
    fn from(name: &str) -> Self {
        ColumnSelector::Name(name.to_string())
    }
}

impl From<String> for ColumnSelector {
    fn from(name: String) -> Self {
        ColumnSelector::Name(name)
    }
}

impl From<&String> for ColumnSelector {
    fn from(name: &String) -> Self {
        ColumnSelector::Name(name.clone())
    }
}

impl From<usize> for ColumnSelector {
    fn from(idx: usize) -> Self {
        ColumnSelector::Index(idx)
    }
}

impl From<Regex> for ColumnSelector {
    fn from(re: Regex) -> Self {
        ColumnSelector::Regex(re)
    }
}

impl<T: Into<ColumnSelector>> From<Vec<T>> for ColumnSelector {
    fn from(items: Vec<T>) -> Self {
        ColumnSelector::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ColumnSelector>, const N: usize> From<[T; N]> for ColumnSelector {
    fn from(items: [T; N]) -> Self {
        ColumnSelector::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<&[&str]> for ColumnSelector {
    fn from(items: &[&str]) -> Self {
        ColumnSelector::List(items.iter().map(|&name| name.into()).collect())
    }
}
