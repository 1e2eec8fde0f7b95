//! Spec terms and their normalization into function specs
//!
//! A [`SpecTerm`] is what callers write: a bare selector, `cols => fn`,
//! `cols => fn => target`, a rename, `nrow`, an `AsTable` term or a
//! whole-group callable. Normalization resolves selectors against the source
//! schema and turns each term into one or more [`FunctionSpec`]s, which is all
//! the executor and assembler ever see.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dataframe::DataFrame;
use crate::error::{DataError, DataResult};
use crate::grouped::GroupView;
use crate::output::Output;
use crate::selector::ColumnSelector;
use crate::series::Series;

/// Name given to callables created without one
pub const ANONYMOUS: &str = "function";

macro_rules! named_callable {
    ($(#[$meta:meta])* $name:ident, $arg:ty) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            name: Arc<str>,
            func: Arc<dyn Fn($arg) -> anyhow::Result<Output> + Send + Sync>,
        }

        impl $name {
            /// Wrap a callable under `name`, which is used for derived output names
            pub fn new<F>(name: &str, func: F) -> Self
            where
                F: Fn($arg) -> anyhow::Result<Output> + Send + Sync + 'static,
            {
                Self {
                    name: Arc::from(name),
                    func: Arc::new(func),
                }
            }

            /// Wrap a callable under the name `function`
            pub fn anonymous<F>(func: F) -> Self
            where
                F: Fn($arg) -> anyhow::Result<Output> + Send + Sync + 'static,
            {
                Self::new(ANONYMOUS, func)
            }

            #[must_use]
            pub fn name(&self) -> &str {
                &self.name
            }

            pub(crate) fn call(&self, arg: $arg) -> anyhow::Result<Output> {
                (self.func)(arg)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.name)
            }
        }
    };
}

named_callable!(
    /// Callable receiving the selected columns as positional arguments
    ColumnFn,
    &[Series]
);

named_callable!(
    /// Callable receiving the selected columns as one table
    TableFn,
    &DataFrame
);

named_callable!(
    /// Callable receiving the whole group
    GroupFn,
    &GroupView<'_>
);

/// Output name(s) for a term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Name(String),
    Names(Vec<String>),
}

impl Target {
    fn into_names(self) -> Vec<String> {
        match self {
            Target::Name(name) => vec![name],
            Target::Names(names) => names,
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Name(name)
    }
}

impl From<Vec<&str>> for Target {
    fn from(names: Vec<&str>) -> Self {
        Target::Names(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Target {
    fn from(names: Vec<String>) -> Self {
        Target::Names(names)
    }
}

impl<const N: usize> From<[&str; N]> for Target {
    fn from(names: [&str; N]) -> Self {
        Target::Names(names.iter().map(|s| (*s).to_string()).collect())
    }
}

/// One term of a `combine`/`select`/`transform` call
#[derive(Debug, Clone)]
pub enum SpecTerm {
    /// Keep the selected columns unchanged
    Select(ColumnSelector),
    /// Keep the selected columns under new names
    Rename {
        columns: ColumnSelector,
        target: Target,
    },
    /// `cols => fn [=> target]`
    Apply {
        columns: ColumnSelector,
        func: ColumnFn,
        target: Option<Target>,
    },
    /// `AsTable(cols) => fn [=> target]`
    AsTable {
        columns: ColumnSelector,
        func: TableFn,
        target: Option<Target>,
    },
    /// Row count of each group
    Nrow { target: Option<Target> },
    /// Whole-group callable
    Group {
        func: GroupFn,
        target: Option<Target>,
    },
}

impl SpecTerm {
    #[must_use]
    pub fn cols(columns: impl Into<ColumnSelector>) -> Self {
        SpecTerm::Select(columns.into())
    }

    #[must_use]
    pub fn apply(columns: impl Into<ColumnSelector>, func: ColumnFn) -> Self {
        SpecTerm::Apply {
            columns: columns.into(),
            func,
            target: None,
        }
    }

    #[must_use]
    pub fn as_table(columns: impl Into<ColumnSelector>, func: TableFn) -> Self {
        SpecTerm::AsTable {
            columns: columns.into(),
            func,
            target: None,
        }
    }

    #[must_use]
    pub fn rename(columns: impl Into<ColumnSelector>, target: impl Into<Target>) -> Self {
        SpecTerm::Rename {
            columns: columns.into(),
            target: target.into(),
        }
    }

    #[must_use]
    pub fn nrow() -> Self {
        SpecTerm::Nrow { target: None }
    }

    #[must_use]
    pub fn group(func: GroupFn) -> Self {
        SpecTerm::Group { func, target: None }
    }

    /// Give the term a single output name; a bare selector becomes a rename
    #[must_use]
    pub fn named(self, name: impl Into<String>) -> Self {
        self.with_target(Target::Name(name.into()))
    }

    /// Give the term several output names, for multi-column results
    #[must_use]
    pub fn names<S: Into<String>>(self, names: impl IntoIterator<Item = S>) -> Self {
        self.with_target(Target::Names(names.into_iter().map(Into::into).collect()))
    }

    fn with_target(self, new: Target) -> Self {
        match self {
            SpecTerm::Select(columns) | SpecTerm::Rename { columns, .. } => SpecTerm::Rename {
                columns,
                target: new,
            },
            SpecTerm::Apply { columns, func, .. } => SpecTerm::Apply {
                columns,
                func,
                target: Some(new),
            },
            SpecTerm::AsTable { columns, func, .. } => SpecTerm::AsTable {
                columns,
                func,
                target: Some(new),
            },
            SpecTerm::Nrow { .. } => SpecTerm::Nrow { target: Some(new) },
            SpecTerm::Group { func, .. } => SpecTerm::Group {
                func,
                target: Some(new),
            },
        }
    }
}

impl From<&str> for SpecTerm {
    fn from(name: &str) -> Self {
        SpecTerm::Select(name.into())
    }
}

impl From<ColumnSelector> for SpecTerm {
    fn from(selector: ColumnSelector) -> Self {
        SpecTerm::Select(selector)
    }
}

/// How a function spec materializes its input for each group
#[derive(Debug, Clone)]
pub(crate) enum Input {
    Columns {
        columns: Vec<String>,
        func: ColumnFn,
    },
    Table {
        columns: Vec<String>,
        func: TableFn,
    },
    RowCount,
    Group(GroupFn),
}

/// Output naming policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutputNames {
    /// Names given by the caller
    Explicit(Vec<String>),
    /// Default name for one-column results; row and table results keep
    /// their own field names
    Derived(String),
}

/// A canonical (input, callable, naming) triple
#[derive(Debug, Clone)]
pub(crate) struct FunctionSpec {
    /// Position of the originating term
    pub(crate) term: usize,
    pub(crate) input: Input,
    pub(crate) names: OutputNames,
}

impl FunctionSpec {
    pub(crate) fn callable_name(&self) -> &str {
        match &self.input {
            Input::Columns { func, .. } => func.name(),
            Input::Table { func, .. } => func.name(),
            Input::RowCount => "nrow",
            Input::Group(func) => func.name(),
        }
    }

    /// Output names known before execution
    pub(crate) fn static_names(&self) -> &[String] {
        match &self.names {
            OutputNames::Explicit(names) => names,
            OutputNames::Derived(name) => std::slice::from_ref(name),
        }
    }
}

/// Resolve spec terms against the source columns
///
/// # Errors
/// Returns `Selector` errors for unresolvable selectors and `SpecParse`
/// errors for malformed targets or colliding output names
pub(crate) fn normalize(
    terms: &[SpecTerm],
    columns: &[String],
    rename_cols: bool,
) -> DataResult<Vec<FunctionSpec>> {
    let mut specs = Vec::new();
    let mut group_fns = 0;

    for (term, spec_term) in terms.iter().enumerate() {
        match spec_term {
            SpecTerm::Select(selector) => {
                for column in selector.resolve(columns)? {
                    specs.push(identity_spec(term, column.clone(), column));
                }
            }
            SpecTerm::Rename {
                columns: selector,
                target,
            } => {
                let sources = selector.resolve_required(columns)?;
                let targets = target_names(term, target.clone())?;
                if targets.len() != sources.len() {
                    return Err(DataError::spec(
                        term,
                        format!(
                            "cannot rename {} columns to {} names",
                            sources.len(),
                            targets.len()
                        ),
                    ));
                }
                for (source, target) in sources.into_iter().zip(targets) {
                    specs.push(identity_spec(term, source, target));
                }
            }
            SpecTerm::Apply {
                columns: selector,
                func,
                target,
            } => {
                let inputs = selector.resolve_required(columns)?;
                let names = output_names(term, target, &inputs, func.name(), rename_cols)?;
                specs.push(FunctionSpec {
                    term,
                    input: Input::Columns {
                        columns: inputs,
                        func: func.clone(),
                    },
                    names,
                });
            }
            SpecTerm::AsTable {
                columns: selector,
                func,
                target,
            } => {
                let inputs = selector.resolve_required(columns)?;
                let names = output_names(term, target, &inputs, func.name(), rename_cols)?;
                specs.push(FunctionSpec {
                    term,
                    input: Input::Table {
                        columns: inputs,
                        func: func.clone(),
                    },
                    names,
                });
            }
            SpecTerm::Nrow { target } => {
                let names = match target {
                    Some(target) => {
                        let names = target_names(term, target.clone())?;
                        if names.len() != 1 {
                            return Err(DataError::spec(term, "nrow produces a single column"));
                        }
                        OutputNames::Explicit(names)
                    }
                    None => OutputNames::Derived("nrow".to_string()),
                };
                specs.push(FunctionSpec {
                    term,
                    input: Input::RowCount,
                    names,
                });
            }
            SpecTerm::Group { func, target } => {
                let names = match target {
                    Some(target) => OutputNames::Explicit(target_names(term, target.clone())?),
                    None => {
                        group_fns += 1;
                        OutputNames::Derived(format!("x{group_fns}"))
                    }
                };
                specs.push(FunctionSpec {
                    term,
                    input: Input::Group(func.clone()),
                    names,
                });
            }
        }
    }

    check_collisions(&specs)?;
    Ok(specs)
}

fn identity_spec(term: usize, source: String, target: String) -> FunctionSpec {
    FunctionSpec {
        term,
        input: Input::Columns {
            columns: vec![source],
            func: crate::functions::identity(),
        },
        names: OutputNames::Explicit(vec![target]),
    }
}

fn output_names(
    term: usize,
    target: &Option<Target>,
    inputs: &[String],
    func_name: &str,
    rename_cols: bool,
) -> DataResult<OutputNames> {
    if let Some(target) = target {
        return Ok(OutputNames::Explicit(target_names(term, target.clone())?));
    }
    let joined = inputs.join("_");
    Ok(OutputNames::Derived(if rename_cols {
        format!("{joined}_{func_name}")
    } else {
        joined
    }))
}

fn target_names(term: usize, target: Target) -> DataResult<Vec<String>> {
    let names = target.into_names();
    if names.is_empty() {
        return Err(DataError::spec(term, "target must name at least one column"));
    }
    if names.iter().any(String::is_empty) {
        return Err(DataError::spec(term, "output names must not be empty"));
    }
    Ok(names)
}

fn check_collisions(specs: &[FunctionSpec]) -> DataResult<()> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for spec in specs {
        for name in spec.static_names() {
            if let Some(first) = seen.insert(name.as_str(), spec.term) {
                return Err(DataError::spec(
                    spec.term,
                    format!("output column '{name}' is already produced by term {first}"),
                ));
            }
        }
    }
    Ok(())
}
