//! Entry points: `group_by`, `combine`, `select`, `transform`
//!
//! Every apply call normalizes its spec terms, runs them over each group and
//! assembles the results. Nothing is returned or published unless every group
//! succeeded.

use std::sync::Arc;

use tracing::debug;

use crate::assemble::{assemble, Discipline};
use crate::dataframe::DataFrame;
use crate::error::{DataError, DataResult};
use crate::exec::execute;
use crate::grouped::GroupedDataFrame;
use crate::options::{ApplyOptions, GroupOptions};
use crate::selector::ColumnSelector;
use crate::spec::{normalize, SpecTerm};

/// Group `source` by the selected key columns, in first-appearance order
///
/// # Errors
/// Returns error if the key columns don't resolve or can't be hashed
pub fn group_by(
    source: &Arc<DataFrame>,
    keys: impl Into<ColumnSelector>,
) -> DataResult<GroupedDataFrame> {
    GroupedDataFrame::new(source.clone(), keys)
}

/// Group with explicit options
///
/// # Errors
/// Returns error if the key columns don't resolve or can't be hashed
pub fn group_by_with(
    source: &Arc<DataFrame>,
    keys: impl Into<ColumnSelector>,
    options: GroupOptions,
) -> DataResult<GroupedDataFrame> {
    GroupedDataFrame::with_options(source.clone(), keys, options)
}

/// Apply specs per group; the row count follows the results
///
/// # Errors
/// Returns error if a spec is invalid, a callable fails, or results have
/// inconsistent shapes
pub fn combine(gd: &GroupedDataFrame, specs: &[SpecTerm]) -> DataResult<DataFrame> {
    combine_with(gd, specs, &ApplyOptions::default())
}

/// [`combine`] with explicit options
///
/// # Errors
/// Returns error if a spec is invalid, a callable fails, or results have
/// inconsistent shapes
pub fn combine_with(
    gd: &GroupedDataFrame,
    specs: &[SpecTerm],
    options: &ApplyOptions,
) -> DataResult<DataFrame> {
    run(gd, specs, Discipline::Combine, options)
}

/// Apply specs per group, row-aligned with the source; keeps keys and new columns
///
/// # Errors
/// Returns error if the view doesn't cover every group, a spec is invalid, a
/// callable fails, or a result cannot be broadcast to its group
pub fn select(gd: &GroupedDataFrame, specs: &[SpecTerm]) -> DataResult<DataFrame> {
    select_with(gd, specs, &ApplyOptions::default())
}

/// [`select`] with explicit options
///
/// # Errors
/// See [`select`]
pub fn select_with(
    gd: &GroupedDataFrame,
    specs: &[SpecTerm],
    options: &ApplyOptions,
) -> DataResult<DataFrame> {
    run(gd, specs, Discipline::Select, options)
}

/// Apply specs per group, row-aligned with the source; keeps every source column
///
/// # Errors
/// See [`select`]
pub fn transform(gd: &GroupedDataFrame, specs: &[SpecTerm]) -> DataResult<DataFrame> {
    transform_with(gd, specs, &ApplyOptions::default())
}

/// [`transform`] with explicit options
///
/// # Errors
/// See [`select`]
pub fn transform_with(
    gd: &GroupedDataFrame,
    specs: &[SpecTerm],
    options: &ApplyOptions,
) -> DataResult<DataFrame> {
    run(gd, specs, Discipline::Transform, options)
}

/// Replace `table` with the result of [`select`]
///
/// `table` must be the table `gd` was built on. On error it is left untouched.
///
/// # Errors
/// Returns error if `gd` belongs to another table, or as [`select`]
pub fn select_in_place(
    table: &mut Arc<DataFrame>,
    gd: &GroupedDataFrame,
    specs: &[SpecTerm],
) -> DataResult<()> {
    replace(table, gd, specs, Discipline::Select, &ApplyOptions::default())
}

/// [`select_in_place`] with explicit options
///
/// # Errors
/// See [`select_in_place`]
pub fn select_in_place_with(
    table: &mut Arc<DataFrame>,
    gd: &GroupedDataFrame,
    specs: &[SpecTerm],
    options: &ApplyOptions,
) -> DataResult<()> {
    replace(table, gd, specs, Discipline::Select, options)
}

/// Replace `table` with the result of [`transform`]
///
/// `table` must be the table `gd` was built on. On error it is left untouched.
///
/// # Errors
/// Returns error if `gd` belongs to another table, or as [`transform`]
pub fn transform_in_place(
    table: &mut Arc<DataFrame>,
    gd: &GroupedDataFrame,
    specs: &[SpecTerm],
) -> DataResult<()> {
    replace(table, gd, specs, Discipline::Transform, &ApplyOptions::default())
}

/// [`transform_in_place`] with explicit options
///
/// # Errors
/// See [`transform_in_place`]
pub fn transform_in_place_with(
    table: &mut Arc<DataFrame>,
    gd: &GroupedDataFrame,
    specs: &[SpecTerm],
    options: &ApplyOptions,
) -> DataResult<()> {
    replace(table, gd, specs, Discipline::Transform, options)
}

fn run(
    gd: &GroupedDataFrame,
    specs: &[SpecTerm],
    discipline: Discipline,
    options: &ApplyOptions,
) -> DataResult<DataFrame> {
    if discipline != Discipline::Combine && !gd.covers_all_rows() {
        return Err(DataError::Grouping(format!(
            "{discipline:?} needs a view over every group, this one exposes {} of {}",
            gd.num_groups(),
            gd.index().len()
        )));
    }

    let source = gd.parent();
    let plan = normalize(specs, &source.columns(), options.rename_cols)?;
    let parallel = options.should_parallelize(source.num_rows());
    debug!(
        operation = ?discipline,
        specs = plan.len(),
        groups = gd.num_groups(),
        parallel,
        "applying specs to groups"
    );

    let results = execute(gd, &plan, parallel)?;
    let output = assemble(gd, &plan, &results, discipline, options.keep_keys)?;
    debug!(
        operation = ?discipline,
        rows = output.num_rows(),
        columns = output.num_columns(),
        "apply finished"
    );
    Ok(output)
}

fn replace(
    table: &mut Arc<DataFrame>,
    gd: &GroupedDataFrame,
    specs: &[SpecTerm],
    discipline: Discipline,
    options: &ApplyOptions,
) -> DataResult<()> {
    if !Arc::ptr_eq(table, gd.parent()) {
        return Err(DataError::Grouping(
            "grouped view was not built on this table".to_string(),
        ));
    }
    let replacement = run(gd, specs, discipline, options)?;
    *table = Arc::new(replacement);
    Ok(())
}

impl GroupedDataFrame {
    /// See [`combine`]
    ///
    /// # Errors
    /// See [`combine`]
    pub fn combine(&self, specs: &[SpecTerm]) -> DataResult<DataFrame> {
        combine(self, specs)
    }

    /// See [`combine_with`]
    ///
    /// # Errors
    /// See [`combine`]
    pub fn combine_with(&self, specs: &[SpecTerm], options: &ApplyOptions) -> DataResult<DataFrame> {
        combine_with(self, specs, options)
    }

    /// See [`select`]
    ///
    /// # Errors
    /// See [`select`]
    pub fn select(&self, specs: &[SpecTerm]) -> DataResult<DataFrame> {
        select(self, specs)
    }

    /// See [`select_with`]
    ///
    /// # Errors
    /// See [`select`]
    pub fn select_with(&self, specs: &[SpecTerm], options: &ApplyOptions) -> DataResult<DataFrame> {
        select_with(self, specs, options)
    }

    /// See [`transform`]
    ///
    /// # Errors
    /// See [`select`]
    pub fn transform(&self, specs: &[SpecTerm]) -> DataResult<DataFrame> {
        transform(self, specs)
    }

    /// See [`transform_with`]
    ///
    /// # Errors
    /// See [`select`]
    pub fn transform_with(
        &self,
        specs: &[SpecTerm],
        options: &ApplyOptions,
    ) -> DataResult<DataFrame> {
        transform_with(self, specs, options)
    }
}
