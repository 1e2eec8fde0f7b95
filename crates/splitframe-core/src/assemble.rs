//! Shape inference and assembly of per-group results into one table

use std::collections::HashMap;

use crate::dataframe::DataFrame;
use crate::error::{DataError, DataResult};
use crate::exec::GroupResults;
use crate::grouped::GroupedDataFrame;
use crate::output::ResultKind;
use crate::series::Series;
use crate::spec::{FunctionSpec, OutputNames};
use crate::value::Value;

/// Row-count discipline of an apply call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Discipline {
    /// Row count follows the callables' outputs
    Combine,
    /// Row-aligned with the source; only keys and new columns
    Select,
    /// Row-aligned with the source; all source columns plus new ones
    Transform,
}

/// Build the output table from results indexed by view position, then spec
pub(crate) fn assemble(
    gd: &GroupedDataFrame,
    specs: &[FunctionSpec],
    results: &[GroupResults],
    discipline: Discipline,
    keep_keys: bool,
) -> DataResult<DataFrame> {
    let layouts = layouts(gd, specs, results)?;
    check_runtime_collisions(specs, &layouts)?;

    let row_counts = match discipline {
        Discipline::Combine => combine_row_counts(gd, specs, results)?,
        Discipline::Select | Discipline::Transform => group_sizes(gd, specs, &layouts, results)?,
    };
    let keys_present = discipline == Discipline::Transform || keep_keys;
    let key_columns = gd.key_columns();

    let mut outputs = Vec::new();
    for (s, names) in layouts.iter().enumerate() {
        for (j, name) in names.iter().enumerate() {
            if keys_present && key_columns.contains(name) {
                check_key_column(gd, results, (s, j), name, &row_counts)?;
                continue;
            }
            let values = match discipline {
                Discipline::Combine => stack_values(results, (s, j), &row_counts),
                Discipline::Select | Discipline::Transform => scatter_values(gd, results, (s, j))?,
            };
            let series = Series::from_values(name.clone(), &values).map_err(|e| {
                DataError::shape(
                    format!("column '{name}'"),
                    format!("groups returned incompatible types: {e}"),
                )
            })?;
            outputs.push(series);
        }
    }

    let source = gd.parent();
    match discipline {
        Discipline::Combine => {
            let mut columns = if keep_keys {
                repeated_keys(gd, &row_counts)?
            } else {
                Vec::new()
            };
            columns.extend(outputs);
            frame(columns, row_counts.iter().sum())
        }
        Discipline::Select => {
            let mut columns = Vec::new();
            if keep_keys {
                for key in key_columns {
                    columns.push(source.column(key)?);
                }
            }
            columns.extend(outputs);
            frame(columns, source.num_rows())
        }
        Discipline::Transform => {
            let mut df = source.as_ref().clone();
            for series in outputs {
                df = df.with_column(series)?;
            }
            Ok(df)
        }
    }
}

/// Output column names of each spec, after checking results agree across groups
fn layouts(
    gd: &GroupedDataFrame,
    specs: &[FunctionSpec],
    results: &[GroupResults],
) -> DataResult<Vec<Vec<String>>> {
    let Some(first) = results.first() else {
        return Ok(specs.iter().map(|s| s.static_names().to_vec()).collect());
    };

    let mut layouts = Vec::with_capacity(specs.len());
    for (s, spec) in specs.iter().enumerate() {
        let reference = &first[s];
        for (g, group) in results.iter().enumerate().skip(1) {
            let result = &group[s];
            if result.kind() != reference.kind() {
                return Err(DataError::shape(
                    format!("spec {}", spec.term),
                    format!(
                        "group {} returned {} but group {} returned {}",
                        gd.group_key(0)?,
                        reference.kind(),
                        gd.group_key(g)?,
                        result.kind()
                    ),
                ));
            }
            if result.field_names() != reference.field_names() {
                return Err(DataError::shape(
                    format!("spec {}", spec.term),
                    format!(
                        "group {} returned fields {:?} but group {} returned fields {:?}",
                        gd.group_key(0)?,
                        reference.field_names().unwrap_or_default(),
                        gd.group_key(g)?,
                        result.field_names().unwrap_or_default()
                    ),
                ));
            }
        }

        if reference.kind() == ResultKind::Row && specs.len() > 1 {
            return Err(DataError::shape(
                format!("spec {}", spec.term),
                "a row result is only allowed when a single spec is applied",
            ));
        }

        let names = match (reference.field_names(), &spec.names) {
            (None, OutputNames::Explicit(names)) if names.len() != 1 => {
                return Err(DataError::shape(
                    format!("spec {}", spec.term),
                    format!(
                        "{} produces one column but {} names were given",
                        reference.kind(),
                        names.len()
                    ),
                ))
            }
            (Some(fields), OutputNames::Explicit(names)) if names.len() != fields.len() => {
                return Err(DataError::shape(
                    format!("spec {}", spec.term),
                    format!(
                        "{} has {} fields but {} names were given",
                        reference.kind(),
                        fields.len(),
                        names.len()
                    ),
                ))
            }
            (_, OutputNames::Explicit(names)) => names.clone(),
            (None, OutputNames::Derived(name)) => vec![name.clone()],
            (Some(fields), OutputNames::Derived(_)) => fields.to_vec(),
        };
        layouts.push(names);
    }
    Ok(layouts)
}

fn check_runtime_collisions(specs: &[FunctionSpec], layouts: &[Vec<String>]) -> DataResult<()> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (spec, names) in specs.iter().zip(layouts) {
        for name in names {
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

/// Rows each group contributes under `combine`
///
/// Results whose length is not 1 must agree; broadcasting results fill the
/// rest. A group with only broadcasting results contributes one row.
fn combine_row_counts(
    gd: &GroupedDataFrame,
    specs: &[FunctionSpec],
    results: &[GroupResults],
) -> DataResult<Vec<usize>> {
    let mut counts = Vec::with_capacity(results.len());
    for (g, group) in results.iter().enumerate() {
        let mut rows: Option<(usize, usize)> = None;
        for (s, result) in group.iter().enumerate() {
            if result.broadcasts() {
                continue;
            }
            let Some(len) = result.num_rows() else {
                continue;
            };
            match rows {
                None => rows = Some((s, len)),
                Some((first, expected)) if expected != len => {
                    return Err(DataError::shape(
                        format!("group {}", gd.group_key(g)?),
                        format!(
                            "spec {} produced {expected} rows but spec {} produced {len}",
                            specs[first].term, specs[s].term
                        ),
                    ))
                }
                Some(_) => {}
            }
        }
        counts.push(rows.map_or(1, |(_, len)| len));
    }
    Ok(counts)
}

/// Group sizes under `select`/`transform`; results that don't broadcast must match them
fn group_sizes(
    gd: &GroupedDataFrame,
    specs: &[FunctionSpec],
    layouts: &[Vec<String>],
    results: &[GroupResults],
) -> DataResult<Vec<usize>> {
    let mut sizes = Vec::with_capacity(results.len());
    for (g, group) in results.iter().enumerate() {
        let size = gd.group_rows(g)?.len();
        for (s, result) in group.iter().enumerate() {
            match result.num_rows() {
                Some(found) if found != size && !result.broadcasts() => {
                    return Err(DataError::Broadcast {
                        spec: specs[s].term,
                        column: layouts[s].first().cloned().unwrap_or_default(),
                        group: gd.group_key(g)?.to_string(),
                        expected: size,
                        found,
                    })
                }
                _ => {}
            }
        }
        sizes.push(size);
    }
    Ok(sizes)
}

/// Output column `(s, j)` with groups stacked in view order
fn stack_values(results: &[GroupResults], (s, j): (usize, usize), row_counts: &[usize]) -> Vec<Value> {
    let mut values = Vec::with_capacity(row_counts.iter().sum());
    for (group, &rows) in results.iter().zip(row_counts) {
        values.extend((0..rows).map(|row| group[s].value_at(j, row).clone()));
    }
    values
}

/// Output column `(s, j)` spread back to each group's source row positions
fn scatter_values(
    gd: &GroupedDataFrame,
    results: &[GroupResults],
    (s, j): (usize, usize),
) -> DataResult<Vec<Value>> {
    let mut values = vec![Value::Null; gd.parent().num_rows()];
    for (g, group) in results.iter().enumerate() {
        for (row, &position) in gd.group_rows(g)?.iter().enumerate() {
            values[position] = group[s].value_at(j, row).clone();
        }
    }
    Ok(values)
}

/// An output named like a grouping column must reproduce the key values
fn check_key_column(
    gd: &GroupedDataFrame,
    results: &[GroupResults],
    (s, j): (usize, usize),
    name: &str,
    row_counts: &[usize],
) -> DataResult<()> {
    for (g, (group, &rows)) in results.iter().zip(row_counts).enumerate() {
        let key = gd.group_key(g)?;
        let expected = key
            .get(name)
            .ok_or_else(|| DataError::ColumnNotFound(name.to_string()))?;
        if (0..rows).any(|row| !same_key_value(group[s].value_at(j, row), expected)) {
            return Err(DataError::shape(
                format!("column '{name}'"),
                format!("output replaces a grouping column but differs from the key in group {key}"),
            ));
        }
    }
    Ok(())
}

fn same_key_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => a == b,
    }
}

/// Key columns with each group's key repeated once per output row
fn repeated_keys(gd: &GroupedDataFrame, row_counts: &[usize]) -> DataResult<Vec<Series>> {
    let mut rows = Vec::with_capacity(row_counts.iter().sum());
    for (g, &count) in row_counts.iter().enumerate() {
        let first = gd.group_rows(g)?[0];
        rows.extend(std::iter::repeat(first).take(count));
    }
    gd.key_columns()
        .iter()
        .map(|key| gd.parent().column(key)?.take(&rows))
        .collect()
}

fn frame(columns: Vec<Series>, num_rows: usize) -> DataResult<DataFrame> {
    if columns.is_empty() {
        DataFrame::zero_columns(num_rows)
    } else {
        DataFrame::from_series(columns)
    }
}
