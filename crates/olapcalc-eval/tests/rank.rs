//! Rank over the sales cube (default channel Retail: A = 3, B empty, C = 2)

mod common;

use common::{int, items, shops, statement};
use olapcalc_ast::Exp;
use olapcalc_eval::EvalError;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn rank(tuple: &str, set: Exp, key: Option<Exp>) -> Exp {
    let mut args = vec![Exp::id(tuple), set];
    args.extend(key);
    Exp::func("Rank", args)
}

fn sales() -> Option<Exp> {
    Some(Exp::id("[Measures].[Sales]"))
}

#[rstest]
#[case("[Store].[A]", None, 1)]
#[case("[Store].[C]", None, 3)]
#[case("[Store].[All]", None, 0)]
#[case("[Store].[A]", sales(), 1)]
#[case("[Store].[C]", sales(), 2)]
// empty cells rank after every value
#[case("[Store].[B]", sales(), 3)]
// outside the set, ranked where its value would be inserted
#[case("[Store].[All]", sales(), 1)]
fn test_rank(#[case] tuple: &str, #[case] key: Option<Exp>, #[case] expected: i64) {
    let value = statement().evaluate_expression(&rank(tuple, shops(), key)).unwrap();
    assert_eq!(value, int(expected));
}

#[rstest]
#[case("[Product].[Bread]")]
#[case("[Product].[Cheese]")]
fn test_empty_values_share_rank(#[case] tuple: &str) {
    let value = statement().evaluate_expression(&rank(tuple, items(), sales())).unwrap();
    assert_eq!(value, int(3));
}

#[test]
fn test_rank_in_cross_join() {
    let set = Exp::func("CrossJoin", vec![items(), shops()]);
    let tuple = Exp::parens(vec![Exp::id("[Product].[Wine]"), Exp::id("[Store].[C]")]);
    let exp = Exp::func("Rank", vec![tuple.clone(), set.clone(), sales().unwrap()]);
    assert_eq!(statement().evaluate_expression(&exp).unwrap(), int(2));
    let exp = Exp::func("Rank", vec![tuple, set]);
    // Wine is the second item, C the third shop
    assert_eq!(statement().evaluate_expression(&exp).unwrap(), int(6));
}

#[test]
fn test_subject_from_another_hierarchy() {
    let exp = rank("[Product].[Beer]", shops(), None);
    let result = statement().evaluate_expression(&exp);
    assert!(matches!(result, Err(EvalError::HierarchyMismatch { .. })));
}

#[test]
fn test_subject_arity_checked() {
    let tuple = Exp::parens(vec![Exp::id("[Product].[Wine]"), Exp::id("[Store].[C]")]);
    let exp = Exp::func("Rank", vec![tuple, shops()]);
    let result = statement().evaluate_expression(&exp);
    assert!(matches!(
        result,
        Err(EvalError::ArityMismatch { expected: 1, found: 2 })
    ));
}

#[test]
fn test_rank_under_other_channel() {
    let exp = Exp::func(
        "Rank",
        vec![
            Exp::parens(vec![Exp::id("[Store].[B]"), Exp::id("[Channel].[Online]")]),
            Exp::func(
                "CrossJoin",
                vec![shops(), Exp::braces(vec![Exp::id("[Channel].[Online]")])],
            ),
            sales().unwrap(),
        ],
    );
    assert_eq!(statement().evaluate_expression(&exp).unwrap(), int(1));
}
