//! Order over the sales cube (default channel Retail: A = 3, B empty, C = 2)

mod common;

use common::{axis_names, items, one_axis, shops, statement};
use olapcalc_ast::Exp;
use olapcalc_eval::EvalError;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn sales() -> Exp {
    Exp::id("[Measures].[Sales]")
}

fn order(set: Exp, keys: Vec<Exp>) -> Exp {
    let mut args = vec![set];
    args.extend(keys);
    Exp::func("Order", args)
}

#[rstest]
#[case("ASC", vec!["B", "C", "A"])]
#[case("DESC", vec!["A", "C", "B"])]
#[case("BASC", vec!["B", "C", "A"])]
#[case("bdesc", vec!["A", "C", "B"])]
fn test_flat_order(#[case] direction: &str, #[case] expected: Vec<&str>) {
    let set = order(shops(), vec![sales(), Exp::id(direction)]);
    assert_eq!(axis_names(&statement(), set), expected);
}

#[test]
fn test_default_direction_is_ascending() {
    assert_eq!(axis_names(&statement(), order(shops(), vec![sales()])), vec!["B", "C", "A"]);
}

#[test]
fn test_hierarchical_order_keeps_parents_first() {
    let set = order(
        Exp::property(Exp::id("[Product]"), "Members"),
        vec![sales(), Exp::id("ASC")],
    );
    assert_eq!(
        axis_names(&statement(), set),
        vec!["All", "Food", "Bread", "Cheese", "Drink", "Wine", "Beer"]
    );
}

#[test]
fn test_breaking_order_ignores_hierarchy() {
    let set = order(
        Exp::property(Exp::id("[Product]"), "Members"),
        vec![sales(), Exp::id("BASC")],
    );
    // equal keys keep hierarchical order
    assert_eq!(
        axis_names(&statement(), set),
        vec!["Food", "Bread", "Cheese", "Wine", "Beer", "All", "Drink"]
    );
}

#[test]
fn test_secondary_key_breaks_ties() {
    let set = order(
        items(),
        vec![sales(), Exp::id("BDESC"), Exp::id("[Measures].[Cost]"), Exp::id("BASC")],
    );
    assert_eq!(axis_names(&statement(), set), vec!["Beer", "Wine", "Cheese", "Bread"]);
}

#[test]
fn test_order_of_cross_join() {
    let set = order(
        Exp::func(
            "CrossJoin",
            vec![
                Exp::braces(vec![Exp::id("[Product].[Beer]"), Exp::id("[Product].[Wine]")]),
                shops(),
            ],
        ),
        vec![sales(), Exp::id("BDESC")],
    );
    assert_eq!(
        axis_names(&statement(), set),
        vec!["Beer/A", "Wine/C", "Beer/B", "Beer/C", "Wine/A", "Wine/B"]
    );
}

#[test]
fn test_constant_key_keeps_natural_order() {
    let set = order(shops(), vec![Exp::integer(1), Exp::id("DESC")]);
    assert_eq!(axis_names(&statement(), set), vec!["A", "B", "C"]);
}

#[test]
fn test_key_under_slicer() {
    let query = one_axis(order(shops(), vec![sales(), Exp::id("DESC")]))
        .with_slicer(Exp::id("[Channel].[Online]"));
    let result = statement().execute(&query).unwrap();
    assert_eq!(common::names(&result.axes[0]), vec!["B", "A", "C"]);
}

#[test]
fn test_tuple_key_with_constant_measure() {
    let key = Exp::parens(vec![Exp::id("[Channel].[Online]"), sales()]);
    let set = order(shops(), vec![key, Exp::id("BDESC")]);
    assert_eq!(axis_names(&statement(), set), vec!["B", "A", "C"]);
}

#[test]
fn test_unknown_direction_rejected() {
    let set = order(shops(), vec![sales(), Exp::id("SIDEWAYS")]);
    assert!(matches!(
        statement().execute(&one_axis(set)),
        Err(EvalError::InvalidArgument { .. })
    ));
}
