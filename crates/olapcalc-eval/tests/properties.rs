//! Algebraic laws of the set functions over random member subsets

mod common;

use common::{Fixture, axis_names};
use olapcalc_ast::Exp;
use olapcalc_eval::EngineConfig;
use proptest::prelude::*;

const ITEMS: [&str; 4] = ["Beer", "Wine", "Bread", "Cheese"];
const SHOPS: [&str; 3] = ["A", "B", "C"];

fn braces(dimension: &str, names: &[&str]) -> Exp {
    Exp::braces(
        names
            .iter()
            .map(|n| Exp::id(&format!("[{dimension}].[{n}]")))
            .collect(),
    )
}

fn subset(all: &'static [&'static str]) -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(all), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn cross_join_size_is_product(items in subset(&ITEMS), shops in subset(&SHOPS)) {
        let statement = Fixture::new().statement();
        let set = Exp::func("CrossJoin", vec![braces("Product", &items), braces("Store", &shops)]);
        let names = axis_names(&statement, set);
        prop_assert_eq!(names.len(), items.len() * shops.len());
        prop_assert!(names.iter().all(|n| n.split('/').count() == 2));
    }

    #[test]
    fn distinct_is_idempotent(items in subset(&ITEMS)) {
        let statement = Fixture::new().statement();
        let once = Exp::func("Distinct", vec![braces("Product", &items)]);
        let twice = Exp::func("Distinct", vec![once.clone()]);
        let once = axis_names(&statement, once);
        prop_assert_eq!(&once, &axis_names(&statement, twice));
        let mut sorted = once.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), once.len());
    }

    #[test]
    fn order_is_a_permutation(items in subset(&ITEMS), descending in any::<bool>()) {
        let statement = Fixture::new().statement();
        let direction = if descending { "BDESC" } else { "BASC" };
        let set = braces("Product", &items);
        let ordered = Exp::func(
            "Order",
            vec![set.clone(), Exp::id("[Measures].[Sales]"), Exp::id(direction)],
        );
        let mut before = axis_names(&statement, set);
        let mut after = axis_names(&statement, ordered);
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn non_empty_join_ignores_optimizer_threshold(
        items in subset(&ITEMS),
        shops in subset(&SHOPS),
        threshold in 0usize..20,
    ) {
        let fixture = Fixture::new();
        let set = Exp::func(
            "NonEmptyCrossJoin",
            vec![braces("Product", &items), braces("Store", &shops)],
        );
        let baseline = axis_names(&fixture.statement(), set.clone());
        let statement = fixture.statement_with(
            EngineConfig::default().with_crossjoin_optimizer_size(threshold),
        );
        prop_assert_eq!(baseline, axis_names(&statement, set));
    }
}
