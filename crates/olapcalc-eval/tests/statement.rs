//! Query execution against the sales cube

mod common;

use common::{Fixture, axis_names, int, items, names, num, one_axis, shops, statement};
use olapcalc_ast::{Axis, Exp, Query};
use olapcalc_eval::{EngineConfig, EvalError};
use olapcalc_types::Value;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn beer_and_wine() -> Exp {
    Exp::braces(vec![Exp::id("[Product].[Beer]"), Exp::id("[Product].[Wine]")])
}

#[test]
fn test_cells_follow_axes() {
    let query = Query::new(vec![Axis::new(shops()), Axis::new(beer_and_wine())]);
    let result = statement().execute(&query).unwrap();

    assert_eq!(names(&result.axes[0]), vec!["A", "B", "C"]);
    assert_eq!(names(&result.axes[1]), vec!["Beer", "Wine"]);
    assert_eq!(result.cells.len(), 6);
    // default channel is Retail
    assert_eq!(result.cell(&[0, 0]), Some(&num(3)));
    assert_eq!(result.cell(&[1, 0]), Some(&Value::Null));
    assert_eq!(result.cell(&[2, 1]), Some(&num(2)));
    assert_eq!(result.cell(&[3, 1]), None);
    assert_eq!(result.cell(&[0]), None);
}

#[test]
fn test_non_empty_axis() {
    let query = Query::new(vec![Axis::non_empty(shops()), Axis::new(beer_and_wine())]);
    let result = statement().execute(&query).unwrap();
    assert_eq!(names(&result.axes[0]), vec!["A", "C"]);
    assert_eq!(result.cells, vec![num(3), Value::Null, Value::Null, num(2)]);
}

#[test]
fn test_non_empty_rows_drop_empty_products() {
    let query = Query::new(vec![Axis::new(shops()), Axis::non_empty(items())]);
    let result = statement().execute(&query).unwrap();
    assert_eq!(names(&result.axes[1]), vec!["Beer", "Wine"]);
}

#[rstest]
#[case(Exp::id("[Channel].[Online]"), num(1))]
#[case(
    Exp::parens(vec![Exp::id("[Channel].[Online]"), Exp::id("[Measures].[Cost]")]),
    num(1)
)]
#[case(Exp::id("[Measures].[Cost]"), Value::Null)]
fn test_slicer_sets_context(#[case] slicer: Exp, #[case] expected: Value) {
    let query = Query::new(vec![Axis::new(Exp::id("[Product].[Beer]")), Axis::new(Exp::id("[Store].[B]"))])
        .with_slicer(slicer);
    let result = statement().execute(&query).unwrap();
    assert_eq!(result.cells, vec![expected]);
}

#[test]
fn test_calculated_measure_cells() {
    let query = one_axis(items()).with_slicer(Exp::id("[Measures].[Profit]"));
    let result = statement().execute(&query).unwrap();
    assert_eq!(result.cells, vec![num(2), num(1), num(-2), Value::Null]);
}

#[test]
fn test_cyclic_member_is_error_cell() {
    let query = one_axis(beer_and_wine()).with_slicer(Exp::id("[Measures].[Loop]"));
    let result = statement().execute(&query).unwrap();
    assert_eq!(result.cells.len(), 2);
    assert!(result.cells.iter().all(Value::is_error));
}

#[test]
fn test_recursion_limit_is_error_cell() {
    let fixture = Fixture::new();
    let statement = fixture.statement_with(EngineConfig::default().with_max_recursion_depth(0));
    let query = one_axis(beer_and_wine()).with_slicer(Exp::id("[Measures].[Profit]"));
    let result = statement.execute(&query).unwrap();
    assert!(result.cells.iter().all(Value::is_error));
}

#[test]
fn test_iteration_budget_aborts_statement() {
    let fixture = Fixture::new();
    let statement = fixture.statement_with(EngineConfig::default().with_max_iterations(5));
    let query = Query::new(vec![Axis::new(shops()), Axis::new(items())]);
    assert!(matches!(statement.execute(&query), Err(EvalError::Cancelled)));

    // the next execution starts with a fresh budget
    let statement = statement.with_config(EngineConfig::default());
    assert_eq!(statement.execute(&query).unwrap().cells.len(), 12);
}

#[test]
fn test_unknown_identifier_fails_preparation() {
    let err = statement()
        .execute(&one_axis(Exp::id("[Product].[Nope]")))
        .unwrap_err();
    assert!(matches!(err, EvalError::UnknownIdentifier { .. }));
    assert_eq!(err.code().to_string(), "OLAP0002");
}

#[test]
fn test_explain_renders_plan() {
    let query = one_axis(Exp::func("CrossJoin", vec![items(), shops()]))
        .with_slicer(Exp::id("[Measures].[Cost]"));
    let plan = statement().explain(&query).unwrap();
    let text = plan.render();
    assert!(text.contains("Axis 0:"));
    assert!(text.contains("CrossJoin"));
    assert!(text.contains("Slicer:"));
    assert!(plan.flags.native_cross_join);
    assert!(!text.contains("Native cross join"));
}

#[test]
fn test_explain_reports_measure_operand() {
    let set = Exp::func(
        "CrossJoin",
        vec![Exp::braces(vec![Exp::id("[Measures].[Sales]")]), shops()],
    );
    let plan = statement().explain(&one_axis(set)).unwrap();
    assert!(!plan.flags.native_cross_join);
    assert!(plan.render().contains("Native cross join: disabled"));
}

#[rstest]
#[case(Exp::func("Count", vec![items()]), int(4))]
#[case(Exp::func("Sum", vec![items()]), num(5))]
#[case(Exp::func("Sum", vec![shops(), Exp::id("[Measures].[Cost]")]), num(4))]
#[case(
    Exp::func("Count", vec![Exp::func("Distinct", vec![Exp::braces(vec![
        Exp::id("[Product].[Beer]"),
        Exp::id("[Product].[Beer]"),
        Exp::id("[Product].[Wine]"),
    ])])]),
    int(2)
)]
#[case(Exp::infix("+", Exp::integer(1), Exp::integer(2)), int(3))]
fn test_evaluate_expression(#[case] exp: Exp, #[case] expected: Value) {
    assert_eq!(statement().evaluate_expression(&exp).unwrap(), expected);
}

#[test]
fn test_navigation_sets() {
    let statement = statement();
    assert_eq!(
        axis_names(&statement, Exp::property(Exp::id("[Product].[Drink]"), "Children")),
        vec!["Beer", "Wine"]
    );
    assert_eq!(
        axis_names(&statement, Exp::property(Exp::id("[Product].[Beer]"), "Parent")),
        vec!["Drink"]
    );
    assert_eq!(
        axis_names(&statement, Exp::property(Exp::id("[Product]"), "Members")),
        vec!["All", "Drink", "Beer", "Wine", "Food", "Bread", "Cheese"]
    );
}

#[rstest]
#[case(vec![], vec!["All", "Drink", "Beer"])]
#[case(vec![Exp::id("POST")], vec!["Beer", "Drink", "All"])]
fn test_hierarchize(#[case] flag: Vec<Exp>, #[case] expected: Vec<&str>) {
    let mut args = vec![Exp::braces(vec![
        Exp::id("[Product].[Beer]"),
        Exp::id("[Product].[All]"),
        Exp::id("[Product].[Drink]"),
    ])];
    args.extend(flag);
    assert_eq!(axis_names(&statement(), Exp::func("Hierarchize", args)), expected);
}

#[test]
fn test_extract_projects_distinct_members() {
    let set = Exp::func(
        "Extract",
        vec![Exp::func("CrossJoin", vec![items(), shops()]), Exp::id("[Store]")],
    );
    assert_eq!(axis_names(&statement(), set), vec!["A", "B", "C"]);
}

#[test]
fn test_extract_rejects_missing_hierarchy() {
    let set = Exp::func("Extract", vec![shops(), Exp::id("[Product]")]);
    assert!(matches!(
        statement().execute(&one_axis(set)),
        Err(EvalError::InvalidArgument { .. })
    ));
}

#[test]
fn test_named_set_reused() {
    let exp = Exp::infix(
        "+",
        Exp::func("Count", vec![Exp::alias(items(), "Goods")]),
        Exp::func("Count", vec![Exp::id("Goods")]),
    );
    assert_eq!(statement().evaluate_expression(&exp).unwrap(), int(8));
}

#[rstest]
#[case(Exp::infix(
    "+",
    Exp::func("Count", vec![Exp::alias(items(), "Goods")]),
    Exp::func("Count", vec![Exp::id("Goods")]),
))]
#[case(Exp::func(
    "Rank",
    vec![
        Exp::parens(vec![Exp::id("[Product].[Wine]"), Exp::id("[Store].[C]")]),
        Exp::func("CrossJoin", vec![items(), shops()]),
        Exp::id("[Measures].[Sales]"),
    ],
))]
#[case(Exp::func(
    "Sum",
    vec![
        shops(),
        Exp::func(
            "Rank",
            vec![
                Exp::property(Exp::id("[Store]"), "CurrentMember"),
                shops(),
                Exp::id("[Measures].[Sales]"),
            ],
        ),
    ],
))]
fn test_expression_cache_off_gives_same_value(#[case] exp: Exp) {
    let fixture = Fixture::new();
    let cached = fixture.statement().evaluate_expression(&exp).unwrap();
    let uncached = fixture
        .statement_with(EngineConfig::default().with_expression_cache(false))
        .evaluate_expression(&exp)
        .unwrap();
    assert_eq!(uncached, cached);
}

#[test]
fn test_expression_cache_off_gives_same_grid() {
    let fixture = Fixture::new();
    let query = Query::new(vec![
        Axis::non_empty(Exp::func("CrossJoin", vec![items(), shops()])),
        Axis::new(Exp::braces(vec![Exp::id("[Measures].[Sales]"), Exp::id("[Measures].[Cost]")])),
    ]);
    let cached = fixture.statement().execute(&query).unwrap();
    let uncached = fixture
        .statement_with(EngineConfig::default().with_expression_cache(false))
        .execute(&query)
        .unwrap();
    assert_eq!(names(&uncached.axes[0]), names(&cached.axes[0]));
    assert_eq!(uncached.cells, cached.cells);
}
