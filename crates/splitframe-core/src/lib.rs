//! Splitframe Core - split-apply-combine over Arrow-backed tables
//!
//! This crate provides:
//! - DataFrame / Series: Apache Arrow-backed columnar tables
//! - ColumnSelector: declarative column selections
//! - GroupedDataFrame: a table partitioned by key columns, with keyed lookup
//! - SpecTerm: apply terms (`cols => fn => target`, `nrow`, `AsTable`, ...)
//! - combine / select / transform: apply specs per group and reassemble
//!
//! ```ignore
//! use std::sync::Arc;
//! use splitframe_core::{functions, group_by, DataFrame, Series, SpecTerm};
//!
//! let df = Arc::new(DataFrame::from_series(vec![
//!     Series::from_ints("g", vec![1, 1, 2]),
//!     Series::from_ints("x", vec![10, 20, 5]),
//! ])?);
//! let gd = group_by(&df, "g")?;
//! let totals = gd.combine(&[SpecTerm::nrow(), SpecTerm::apply("x", functions::sum())])?;
//! ```

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod apply;
mod assemble;
mod dataframe;
mod error;
mod exec;
/// Built-in column callables
pub mod functions;
mod grouped;
mod index;
mod key;
mod options;
mod output;
mod parallel;
mod selector;
mod series;
mod spec;
mod value;

pub use apply::{
    combine, combine_with, group_by, group_by_with, select, select_in_place, select_in_place_with,
    select_with, transform, transform_in_place, transform_in_place_with, transform_with,
};
pub use dataframe::DataFrame;
pub use error::{CallableFailure, DataError, DataResult};
pub use grouped::{GroupRef, GroupView, GroupedDataFrame};
pub use index::GroupIndex;
pub use key::GroupKey;
pub use options::{ApplyOptions, GroupOptions, GroupOrder};
pub use output::Output;
pub use parallel::{
    parallel_threshold, set_parallel_threshold, ParallelConfig, DEFAULT_PARALLEL_THRESHOLD,
};
pub use selector::ColumnSelector;
pub use series::Series;
pub use spec::{ColumnFn, GroupFn, SpecTerm, TableFn, Target, ANONYMOUS};
pub use value::Value;
