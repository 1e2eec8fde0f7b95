//! Per-group execution of function specs

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::trace;

use crate::dataframe::DataFrame;
use crate::error::{DataError, DataResult};
use crate::grouped::{GroupView, GroupedDataFrame};
use crate::output::{ApplyResult, Output};
use crate::series::Series;
use crate::spec::{FunctionSpec, Input};
use crate::value::Value;

/// Results of every spec for one group, in spec order
pub(crate) type GroupResults = Vec<ApplyResult>;

/// Run every spec over every visible group
///
/// The returned vector is indexed by view position regardless of the order in
/// which groups complete. The first failure aborts the remaining work.
pub(crate) fn execute(
    gd: &GroupedDataFrame,
    specs: &[FunctionSpec],
    parallel: bool,
) -> DataResult<Vec<GroupResults>> {
    let inputs = input_columns(gd.parent(), specs)?;
    let run = |i: usize| -> DataResult<GroupResults> {
        let group = gd.group(i)?;
        specs
            .iter()
            .map(|spec| run_spec(spec, &group, &inputs))
            .collect()
    };

    if parallel {
        (0..gd.num_groups()).into_par_iter().map(run).collect()
    } else {
        (0..gd.num_groups()).map(run).collect()
    }
}

/// Fetch each input column once, shared by all groups
fn input_columns(source: &DataFrame, specs: &[FunctionSpec]) -> DataResult<HashMap<String, Series>> {
    let mut fetched = HashMap::new();
    for spec in specs {
        let names: &[String] = match &spec.input {
            Input::Columns { columns, .. } | Input::Table { columns, .. } => columns,
            Input::RowCount | Input::Group(_) => &[],
        };
        for name in names {
            if !fetched.contains_key(name) {
                fetched.insert(name.clone(), source.column(name)?);
            }
        }
    }
    Ok(fetched)
}

fn slice(inputs: &HashMap<String, Series>, names: &[String], rows: &[usize]) -> DataResult<Vec<Series>> {
    names
        .iter()
        .map(|name| {
            inputs
                .get(name)
                .ok_or_else(|| DataError::ColumnNotFound(name.clone()))?
                .take(rows)
        })
        .collect()
}

fn run_spec(
    spec: &FunctionSpec,
    group: &GroupView<'_>,
    inputs: &HashMap<String, Series>,
) -> DataResult<ApplyResult> {
    let output = match &spec.input {
        Input::RowCount => {
            let rows = i64::try_from(group.num_rows())
                .map_err(|e| DataError::InvalidOperation(format!("group too large: {e}")))?;
            Ok(Output::Value(Value::Int(rows)))
        }
        Input::Columns { columns, func } => {
            let args = slice(inputs, columns, group.rows())?;
            func.call(&args)
        }
        Input::Table { columns, func } => {
            let table = DataFrame::from_series(slice(inputs, columns, group.rows())?)?;
            func.call(&table)
        }
        Input::Group(func) => func.call(group),
    };

    let output = output.map_err(|err| DataError::Callable {
        spec: spec.term,
        callable: spec.callable_name().to_string(),
        group: group.key().to_string(),
        source: err.into(),
    })?;

    let result = ApplyResult::classify(output).map_err(|err| match err {
        DataError::ShapeMismatch { context, message } => DataError::shape(
            format!("{context} of spec {} for group {}", spec.term, group.key()),
            message,
        ),
        other => other,
    })?;
    trace!(
        spec = spec.term,
        group = %group.key(),
        shape = %result.kind(),
        "classified group result"
    );
    Ok(result)
}
