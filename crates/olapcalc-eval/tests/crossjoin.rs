//! Cross joins and the non-empty optimizer

mod common;

use common::{Fixture, axis_names, int, items, members, names, one_axis, shops, statement};
use olapcalc_ast::{Axis, Exp, Query};
use olapcalc_eval::{EngineConfig, EvalError, Statement};
use olapcalc_types::TupleList;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::time::Duration;

fn cross_join(name: &str) -> Exp {
    Exp::func(name, vec![items(), shops()])
}

/// Statement whose optimizer never engages
fn unoptimized(fixture: &Fixture) -> Statement {
    fixture.statement_with(EngineConfig::default().with_crossjoin_optimizer_size(usize::MAX))
}

fn run_axis(statement: &Statement, query: &Query) -> TupleList {
    statement.execute(query).unwrap().axes.remove(0)
}

/// Gadget only has sales, so it is empty at every measure but the default
const SALES_ONLY_CUBE: &str = r#"{
    "name": "SalesOnly",
    "dimensions": [
        {"name": "Product", "hierarchies": [{
            "levels": ["Item"],
            "members": [{"name": "Beer"}, {"name": "Gadget"}]
        }]},
        {"name": "Store", "hierarchies": [{
            "levels": ["Shop"],
            "members": [{"name": "A"}, {"name": "B"}]
        }]}
    ],
    "measures": [{"name": "Sales"}, {"name": "Cost"}],
    "facts": [
        {"coordinates": {"Product": "Beer", "Store": "A"}, "measures": {"Sales": 3, "Cost": 1}},
        {"coordinates": {"Product": "Gadget", "Store": "B"}, "measures": {"Sales": 5}}
    ]
}"#;

#[test]
fn test_right_operand_varies_fastest() {
    let set = Exp::func(
        "CrossJoin",
        vec![
            Exp::braces(vec![Exp::id("[Product].[Beer]"), Exp::id("[Product].[Wine]")]),
            Exp::braces(vec![Exp::id("[Store].[A]"), Exp::id("[Store].[B]")]),
        ],
    );
    assert_eq!(
        axis_names(&statement(), set),
        vec!["Beer/A", "Beer/B", "Wine/A", "Wine/B"]
    );
}

#[test]
fn test_star_operator_joins_sets() {
    let exp = Exp::func("Count", vec![Exp::infix("*", items(), shops())]);
    assert_eq!(statement().evaluate_expression(&exp).unwrap(), int(12));
}

#[test]
fn test_three_way_join_counts_lazily() {
    let channels = members("[Channel].[Channel]");
    let exp = Exp::func(
        "Count",
        vec![Exp::func("CrossJoin", vec![items(), shops(), channels])],
    );
    assert_eq!(statement().evaluate_expression(&exp).unwrap(), int(24));
}

#[rstest]
#[case(None, vec!["Beer/A", "Wine/C"])]
#[case(Some("[Channel].[Online]"), vec!["Beer/B"])]
#[case(Some("[Measures].[Cost]"), vec!["Beer/A", "Wine/C", "Bread/A"])]
fn test_non_empty_cross_join(#[case] slicer: Option<&str>, #[case] expected: Vec<&str>) {
    let mut query = one_axis(cross_join("NonEmptyCrossJoin"));
    if let Some(slicer) = slicer {
        query = query.with_slicer(Exp::id(slicer));
    }
    assert_eq!(names(&run_axis(&statement(), &query)), expected);
}

/// Pruning must never drop a tuple the full product would show a value for
#[rstest]
#[case(None)]
#[case(Some("[Measures].[Cost]"))]
#[case(Some("[Measures].[Profit]"))]
#[case(Some("[Channel].[Online]"))]
fn test_pruning_is_sound(#[case] slicer: Option<&str>) {
    let fixture = Fixture::new();
    let mut query = Query::new(vec![Axis::non_empty(cross_join("CrossJoin"))]);
    if let Some(slicer) = slicer {
        query = query.with_slicer(Exp::id(slicer));
    }
    let optimized = run_axis(&fixture.statement(), &query);
    let full = run_axis(&unoptimized(&fixture), &query);
    assert_eq!(names(&optimized), names(&full));
}

#[test]
fn test_pruning_tries_current_measure() {
    // The query mentions Cost only as a sort key; cells are read at Sales
    let fixture = Fixture::from_json(SALES_ONLY_CUBE);
    let set = Exp::func(
        "Order",
        vec![
            cross_join("CrossJoin"),
            Exp::id("[Measures].[Cost]"),
            Exp::id("BDESC"),
        ],
    );
    let query = Query::new(vec![Axis::non_empty(set)]);
    let optimized = fixture.statement().execute(&query).unwrap();
    let full = unoptimized(&fixture).execute(&query).unwrap();
    assert_eq!(names(&optimized.axes[0]), vec!["Beer/A", "Gadget/B"]);
    assert_eq!(names(&optimized.axes[0]), names(&full.axes[0]));
    assert_eq!(optimized.cells, full.cells);
}

#[rstest]
#[case("CrossJoin")]
#[case("NonEmptyCrossJoin")]
fn test_failing_cells_do_not_abort_join(#[case] name: &str) {
    // Profit cannot be expanded at depth 0, so every cell is an error
    let fixture = Fixture::new();
    let query = Query::new(vec![Axis::non_empty(cross_join(name))])
        .with_slicer(Exp::id("[Measures].[Profit]"));
    let config = EngineConfig::default().with_max_recursion_depth(0);
    let optimized = fixture.statement_with(config.clone()).execute(&query).unwrap();
    let full = fixture
        .statement_with(config.with_crossjoin_optimizer_size(usize::MAX))
        .execute(&query)
        .unwrap();
    assert!(optimized.axes[0].is_empty());
    assert_eq!(names(&optimized.axes[0]), names(&full.axes[0]));
}

#[test]
fn test_calculated_measure_reaches_stored_measures() {
    let query = Query::new(vec![Axis::non_empty(cross_join("CrossJoin"))])
        .with_slicer(Exp::id("[Measures].[Profit]"));
    let axis = run_axis(&statement(), &query);
    // Bread has no sales, but its cost makes the profit non-empty
    assert_eq!(names(&axis), vec!["Beer/A", "Wine/C", "Bread/A"]);
}

#[test]
fn test_measures_operand() {
    let set = Exp::func(
        "NonEmptyCrossJoin",
        vec![
            Exp::braces(vec![Exp::id("[Measures].[Sales]"), Exp::id("[Measures].[Cost]")]),
            Exp::braces(vec![Exp::id("[Product].[Bread]")]),
        ],
    );
    assert_eq!(axis_names(&statement(), set), vec!["Cost/Bread"]);
}

#[test]
fn test_calculated_measure_operand() {
    let set = Exp::func(
        "CrossJoin",
        vec![
            Exp::braces(vec![Exp::id("[Measures].[Profit]")]),
            Exp::braces(vec![Exp::id("[Product].[Beer]"), Exp::id("[Product].[Cheese]")]),
        ],
    );
    let query = Query::new(vec![Axis::non_empty(set)]);
    let axis = run_axis(&statement(), &query);
    assert_eq!(names(&axis), vec!["Profit/Beer"]);
}

#[rstest]
#[case(12, 12)]
#[case(11, 0)]
fn test_optimizer_threshold(#[case] threshold: usize, #[case] expected: usize) {
    // With every cell unloaded, pruning keeps every tuple and gives up;
    // below the threshold the optimizer is skipped and the final filter
    // keeps the unloaded cells
    let fixture = Fixture::new();
    fixture.reader.set_batch_mode(true);
    let statement = fixture.statement_with(
        EngineConfig::default()
            .with_crossjoin_optimizer_size(threshold)
            .with_punt_miss_count_list_size(0),
    );
    let axis = run_axis(&statement, &one_axis(cross_join("NonEmptyCrossJoin")));
    assert_eq!(axis.len(), expected);
    assert!(fixture.reader.pending_count() > 0);
}

#[test]
fn test_batch_loading_converges() {
    let fixture = Fixture::new();
    let query = one_axis(cross_join("NonEmptyCrossJoin"));
    let expected = run_axis(&fixture.statement(), &query);

    fixture.reader.set_batch_mode(true);
    let statement = fixture.statement_with(EngineConfig::default().with_punt_miss_count_list_size(0));
    let mut axis = run_axis(&statement, &query);
    for _ in 0..10 {
        if fixture.reader.pending_count() == 0 {
            break;
        }
        fixture.reader.load_pending();
        axis = run_axis(&statement, &query);
    }
    assert_eq!(fixture.reader.pending_count(), 0);
    assert_eq!(names(&axis), names(&expected));
}

#[test]
fn test_not_ready_cells_are_kept() {
    let fixture = Fixture::new();
    fixture.reader.set_batch_mode(true);
    let axis = run_axis(&fixture.statement(), &one_axis(cross_join("NonEmptyCrossJoin")));
    assert_eq!(axis.len(), 12);
}

#[test]
fn test_iteration_budget_cancels_join() {
    let fixture = Fixture::new();
    let statement = fixture.statement_with(EngineConfig::default().with_max_iterations(10));
    let result = statement.execute(&one_axis(cross_join("NonEmptyCrossJoin")));
    assert!(matches!(result, Err(EvalError::Cancelled)));
}

#[test]
fn test_timeout_stops_join() {
    let fixture = Fixture::new();
    let statement = fixture.statement_with(EngineConfig::default().with_timeout(Duration::ZERO));
    let result = statement.execute(&one_axis(cross_join("NonEmptyCrossJoin")));
    assert!(matches!(result, Err(EvalError::Timeout { .. })));
    let query = Query::new(vec![Axis::non_empty(cross_join("CrossJoin"))]);
    assert!(matches!(statement.execute(&query), Err(EvalError::Timeout { .. })));
}

#[rstest]
#[case(5)]
#[case(3)]
fn test_result_limit(#[case] limit: usize) {
    let fixture = Fixture::new();
    let statement = fixture.statement_with(EngineConfig::default().with_result_limit(limit));
    let result = statement.execute(&one_axis(cross_join("CrossJoin")));
    assert!(matches!(
        result,
        Err(EvalError::ResultLimitExceeded { limit: l, .. }) if l == limit
    ));
}

#[test]
fn test_empty_operand_gives_empty_join() {
    let set = Exp::func(
        "CrossJoin",
        vec![items(), Exp::property(Exp::id("[Product].[Cheese]"), "Children")],
    );
    assert!(axis_names(&statement(), set).is_empty());
}
