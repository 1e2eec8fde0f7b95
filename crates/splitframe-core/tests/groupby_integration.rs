//! Integration tests for grouping and split-apply-combine

use std::sync::Arc;

use splitframe_core::{
    combine, functions, group_by, group_by_with, select, transform, transform_in_place,
    ApplyOptions, ColumnFn, ColumnSelector, DataError, DataFrame, GroupFn, GroupOptions,
    GroupOrder, Output, Series, SpecTerm, TableFn, Value,
};

fn scenario() -> Arc<DataFrame> {
    Arc::new(
        DataFrame::from_series(vec![
            Series::from_ints("g", vec![1, 1, 2]),
            Series::from_ints("x", vec![10, 20, 5]),
        ])
        .unwrap(),
    )
}

fn sales() -> Arc<DataFrame> {
    Arc::new(
        DataFrame::from_series(vec![
            Series::from_optional_strings(
                "region",
                vec![
                    Some("North"),
                    Some("South"),
                    None,
                    Some("North"),
                    Some("South"),
                    None,
                ],
            ),
            Series::from_strings("product", vec!["a", "b", "a", "a", "b", "b"]),
            Series::from_ints("amount", vec![100, 200, 150, 250, 50, 75]),
            Series::from_floats("price", vec![1.0, 2.5, 3.0, 4.5, 5.0, 6.0]),
        ])
        .unwrap(),
    )
}

fn values(df: &DataFrame, column: &str) -> Vec<Value> {
    df.column(column).unwrap().to_values().unwrap()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|&v| Value::Int(v)).collect()
}

#[test]
fn test_scenario_end_to_end() {
    let df = scenario();
    let gd = group_by(&df, "g").unwrap();
    assert_eq!(gd.num_groups(), 2);
    assert_eq!(gd.group_rows(0).unwrap(), [0, 1]);
    assert_eq!(gd.group_rows(1).unwrap(), [2]);

    let counts = combine(&gd, &[SpecTerm::nrow()]).unwrap();
    assert_eq!(counts.columns(), ["g", "nrow"]);
    assert_eq!(values(&counts, "g"), ints(&[1, 2]));
    assert_eq!(values(&counts, "nrow"), ints(&[2, 1]));

    let sums = combine(&gd, &[SpecTerm::apply("x", functions::sum())]).unwrap();
    assert_eq!(sums.columns(), ["g", "x_sum"]);
    assert_eq!(values(&sums, "x_sum"), ints(&[30, 5]));

    let selected = select(&gd, &[SpecTerm::apply("x", functions::sum())]).unwrap();
    assert_eq!(selected.num_rows(), 3);
    assert_eq!(values(&selected, "g"), ints(&[1, 1, 2]));
    assert_eq!(values(&selected, "x_sum"), ints(&[30, 30, 5]));
}

#[test]
fn test_null_keys_form_their_own_group() {
    let gd = group_by(&sales(), "region").unwrap();
    assert_eq!(gd.num_groups(), 3);
    assert_eq!(gd.group_key(2).unwrap().values(), [Value::Null]);
    assert_eq!(gd.group_rows(2).unwrap(), [2, 5]);

    let null_group = gd.lookup(&[Value::Null]).unwrap();
    assert_eq!(null_group.group_rows(0).unwrap(), [2, 5]);
}

#[test]
fn test_sorted_multi_key_order() {
    let gd = group_by_with(&sales(), ["region", "product"], GroupOptions::new().sorted()).unwrap();
    let keys = gd.keys().unwrap();
    assert_eq!(
        values(&keys, "region"),
        vec![
            Value::string("North"),
            Value::string("South"),
            Value::Null,
            Value::Null
        ]
    );
    assert_eq!(
        values(&keys, "product"),
        vec![
            Value::string("a"),
            Value::string("b"),
            Value::string("a"),
            Value::string("b")
        ]
    );
    assert_eq!(gd.index().order(), GroupOrder::Sorted);
}

#[test]
fn test_select_row_rule_keeps_source_keys() {
    let df = sales();
    let gd = group_by(&df, "region").unwrap();
    let out = select(
        &gd,
        &[
            SpecTerm::apply("amount", functions::mean()),
            SpecTerm::cols("price"),
        ],
    )
    .unwrap();
    assert_eq!(out.num_rows(), df.num_rows());
    assert_eq!(out.columns(), ["region", "amount_mean", "price"]);
    assert_eq!(values(&out, "region"), values(&df, "region"));
    assert_eq!(values(&out, "price"), values(&df, "price"));
    assert_eq!(values(&out, "amount_mean")[1], Value::Float(125.0));
}

#[test]
fn test_select_only_key_is_idempotent() {
    let df = sales();
    let gd = group_by(&df, "region").unwrap();
    let out = select(&gd, &[SpecTerm::cols("region")]).unwrap();
    assert_eq!(out.columns(), ["region"]);
    assert_eq!(values(&out, "region"), values(&df, "region"));
}

#[test]
fn test_transform_keeps_order_and_appends() {
    let df = sales();
    let gd = group_by(&df, "product").unwrap();
    let demean = ColumnFn::new("demean", |cols| {
        let col = &cols[0];
        let mean = col.mean()?.as_f64().unwrap_or(0.0);
        let values = col
            .to_f64_values()?
            .into_iter()
            .map(|v| Value::Float(v - mean))
            .collect();
        Ok(Output::Values(values))
    });
    let out = transform(
        &gd,
        &[
            SpecTerm::apply("price", demean),
            SpecTerm::apply("amount", functions::sum()).named("amount"),
        ],
    )
    .unwrap();
    assert_eq!(out.columns(), ["region", "product", "amount", "price", "price_demean"]);
    assert_eq!(values(&out, "amount"), ints(&[500, 325, 500, 500, 325, 325]));
    let demeaned = values(&out, "price_demean");
    assert_eq!(demeaned[0], Value::Float(1.0 - 8.5 / 3.0));
}

#[test]
fn test_broadcast_law() {
    let gd = group_by(&scenario(), "g").unwrap();
    let out = combine(
        &gd,
        &[
            SpecTerm::apply("x", functions::identity()).named("xs"),
            SpecTerm::nrow(),
        ],
    )
    .unwrap();
    assert_eq!(values(&out, "xs"), ints(&[10, 20, 5]));
    assert_eq!(values(&out, "nrow"), ints(&[2, 2, 1]));

    // group 2 has one row, so its identity vector repeats next to `pair`
    let pair = ColumnFn::new("pair", |_| Ok(Output::Values(vec![Value::Int(0), Value::Int(1)])));
    let out = combine(
        &gd,
        &[SpecTerm::apply("x", functions::identity()), SpecTerm::apply("x", pair)],
    )
    .unwrap();
    assert_eq!(values(&out, "g"), ints(&[1, 1, 2, 2]));
    assert_eq!(values(&out, "x_identity"), ints(&[10, 20, 5, 5]));
    assert_eq!(values(&out, "x_pair"), ints(&[0, 1, 0, 1]));

    let triple = ColumnFn::new("triple", |_| Ok(Output::Values(vec![Value::Int(0); 3])));
    let err = combine(
        &gd,
        &[SpecTerm::apply("x", functions::identity()), SpecTerm::apply("x", triple)],
    )
    .unwrap_err();
    assert!(matches!(err, DataError::ShapeMismatch { .. }), "{err}");
}

#[test]
fn test_single_row_results_broadcast_in_select_and_transform() {
    let gd = group_by(&scenario(), "g").unwrap();
    let head = ColumnFn::new("head", |cols| Ok(cols[0].take(&[0])?.into()));
    let out = select(&gd, &[SpecTerm::apply("x", head.clone())]).unwrap();
    assert_eq!(out.columns(), vec!["g", "x_head"]);
    assert_eq!(values(&out, "x_head"), ints(&[10, 10, 5]));

    let out = transform(&gd, &[SpecTerm::apply("x", head).named("first_x")]).unwrap();
    assert_eq!(values(&out, "first_x"), ints(&[10, 10, 5]));

    let pair = ColumnFn::new("pair", |_| Ok(Output::Values(vec![Value::Int(0), Value::Int(1)])));
    let err = transform(&gd, &[SpecTerm::apply("x", pair)]).unwrap_err();
    assert!(
        matches!(err, DataError::Broadcast { expected: 1, found: 2, .. }),
        "{err}"
    );
}

#[test]
fn test_cell_keeps_vector_in_one_row() {
    let gd = group_by(&scenario(), "g").unwrap();
    let collect = ColumnFn::new("collect", |cols| Ok(Output::cell(cols[0].clone())));
    let out = combine(&gd, &[SpecTerm::apply("x", collect)]).unwrap();
    assert_eq!(out.num_rows(), 2);
    assert_eq!(
        values(&out, "x_collect"),
        vec![
            Value::list(vec![Value::Int(10), Value::Int(20)]),
            Value::list(vec![Value::Int(5)])
        ]
    );
}

#[test]
fn test_as_table_and_whole_group_callables() {
    let gd = group_by(&sales(), "product").unwrap();
    let revenue = TableFn::new("revenue", |t| {
        let amounts = t.column("amount")?.to_f64_values()?;
        let prices = t.column("price")?.to_f64_values()?;
        Ok(Output::from(amounts.iter().zip(&prices).map(|(a, p)| a * p).sum::<f64>()))
    });
    let size = GroupFn::anonymous(|g| Ok(Output::from(g.num_rows() as i64)));
    let out = combine(
        &gd,
        &[
            SpecTerm::as_table(["amount", "price"], revenue),
            SpecTerm::group(size),
        ],
    )
    .unwrap();
    assert_eq!(out.columns(), ["product", "amount_price_revenue", "x1"]);
    assert_eq!(
        values(&out, "amount_price_revenue")[0],
        Value::Float(100.0 + 450.0 + 1125.0)
    );
    assert_eq!(values(&out, "x1"), ints(&[3, 3]));
}

#[test]
fn test_table_result_in_combine() {
    let gd = group_by(&scenario(), "g").unwrap();
    let top = GroupFn::new("top", |g| {
        let x = g.column("x")?;
        Ok(Output::columns([
            ("x", x.to_values()?),
            ("rank", (1..=x.len() as i64).map(Value::Int).collect()),
        ]))
    });
    let out = combine(&gd, &[SpecTerm::group(top)]).unwrap();
    assert_eq!(out.columns(), ["g", "x", "rank"]);
    assert_eq!(values(&out, "rank"), ints(&[1, 2, 1]));

    let renamed = combine(
        &gd,
        &[SpecTerm::group(GroupFn::new("m", |_| {
            Ok(Output::Matrix(vec![vec![Value::Int(1), Value::Int(2)]]))
        }))
        .names(["a", "b"])],
    )
    .unwrap();
    assert_eq!(renamed.columns(), ["g", "a", "b"]);
}

#[test]
fn test_runtime_name_collision() {
    let gd = group_by(&scenario(), "g").unwrap();
    let row = GroupFn::new("row", |_| Ok(Output::record([("x_sum", 1)])));
    let err = combine(
        &gd,
        &[SpecTerm::group(row), SpecTerm::apply("x", functions::sum())],
    )
    .unwrap_err();
    // rows with other specs are rejected before names are compared
    assert!(matches!(err, DataError::ShapeMismatch { .. }));

    let table = GroupFn::new("t", |_| Ok(Output::columns([("x_sum", vec![Value::Int(1)])])));
    let err = combine(
        &gd,
        &[SpecTerm::group(table), SpecTerm::apply("x", functions::sum())],
    )
    .unwrap_err();
    assert!(matches!(err, DataError::SpecParse { term: 1, .. }), "{err}");
}

#[test]
fn test_callable_error_carries_group_and_spec() {
    let gd = group_by(&scenario(), "g").unwrap();
    let picky = ColumnFn::new("picky", |cols| {
        let total = cols[0].sum()?;
        if total == Value::Int(5) {
            anyhow::bail!("refusing five");
        }
        Ok(Output::from(total))
    });
    let err = combine(&gd, &[SpecTerm::nrow(), SpecTerm::apply("x", picky)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "callable 'picky' (spec 1) failed for group (g = 2): refusing five"
    );
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_selector_forms_in_specs() {
    let df = sales();
    let gd = group_by(&df, "product").unwrap();
    let out = select(
        &gd,
        &[SpecTerm::cols(ColumnSelector::not(["product", "region"]))],
    )
    .unwrap();
    assert_eq!(out.columns(), ["product", "amount", "price"]);

    let out = combine(
        &gd,
        &[SpecTerm::apply(ColumnSelector::regex("^am").unwrap(), functions::max())],
    )
    .unwrap();
    assert_eq!(out.columns(), ["product", "amount_max"]);

    let err = combine(&gd, &[SpecTerm::apply("missing", functions::sum())]).unwrap_err();
    assert!(matches!(err, DataError::Selector(_)));
}

#[test]
fn test_rename_cols_and_keep_keys_options() {
    let gd = group_by(&scenario(), "g").unwrap();
    let opts = ApplyOptions::new().with_rename_cols(false).with_keep_keys(false);
    let out = splitframe_core::combine_with(&gd, &[SpecTerm::apply("x", functions::sum())], &opts)
        .unwrap();
    assert_eq!(out.columns(), ["x"]);
    assert_eq!(values(&out, "x"), ints(&[30, 5]));
}

#[test]
fn test_transform_in_place_swaps_table() {
    let mut df = sales();
    let gd = group_by(&df, "region").unwrap();
    transform_in_place(
        &mut df,
        &gd,
        &[SpecTerm::apply("amount", functions::count()).named("n_amount")],
    )
    .unwrap();
    assert_eq!(df.num_columns(), 5);
    assert_eq!(values(&df, "n_amount"), ints(&[2, 2, 2, 2, 2, 2]));
    assert_eq!(gd.parent().num_columns(), 4);
}

#[test]
fn test_group_by_no_columns() {
    let gd = group_by(&scenario(), ColumnSelector::List(vec![])).unwrap();
    assert_eq!(gd.num_groups(), 1);
    let out = combine(&gd, &[SpecTerm::apply("x", functions::sum())]).unwrap();
    assert_eq!(out.columns(), ["x_sum"]);
    assert_eq!(values(&out, "x_sum"), ints(&[35]));
}

#[test]
fn test_list_keys_rejected() {
    let df = Arc::new(
        DataFrame::from_series(vec![Series::from_values(
            "cells",
            &[Value::list(vec![Value::Int(1)]), Value::list(vec![])],
        )
        .unwrap()])
        .unwrap(),
    );
    assert!(matches!(group_by(&df, "cells"), Err(DataError::Grouping(_))));
}
