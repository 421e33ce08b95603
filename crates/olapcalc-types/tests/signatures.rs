//! Signature decoding and conversion table tests

use olapcalc_types::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("fxxx", Syntax::Function, Category::Set, 2)]
#[case("ixxx", Syntax::Infix, Category::Set, 2)]
#[case("Pnn", Syntax::Prefix, Category::Numeric, 1)]
#[case("pxl", Syntax::Property, Category::Set, 1)]
#[case("pmh", Syntax::Property, Category::Member, 1)]
#[case("fitxn", Syntax::Function, Category::Integer, 3)]
#[case("rtmm", Syntax::Parentheses, Category::Tuple, 2)]
#[case("fD", Syntax::Function, Category::DateTime, 0)]
fn test_decode(
    #[case] code: &str,
    #[case] syntax: Syntax,
    #[case] ret: Category,
    #[case] arity: usize,
) {
    let sig = Signature::decode(code).unwrap();
    assert_eq!(sig.syntax, syntax);
    assert_eq!(sig.return_category, ret);
    assert_eq!(sig.params.len(), arity);
}

#[rstest]
#[case("fxxh*h", "Extract(<Set>, <Hierarchy>, [<Hierarchy>]...)")]
#[case("mxmm", "<Member>.Lead(<Member>)")]
#[case("Qxx", "<Set> Lead")]
fn test_describe(#[case] code: &str, #[case] expected: &str) {
    let name = if code == "fxxh*h" { "Extract" } else { "Lead" };
    assert_eq!(Signature::decode(code).unwrap().describe(name), expected);
}

#[rstest]
#[case(DataType::Member(None), Category::Set, Some(2))]
#[case(DataType::Member(None), Category::Tuple, Some(1))]
#[case(DataType::Member(None), Category::Numeric, Some(3))]
#[case(DataType::Tuple(Default::default()), Category::Set, Some(2))]
#[case(DataType::Level(None), Category::Set, Some(2))]
#[case(DataType::Hierarchy(None), Category::Member, Some(2))]
#[case(DataType::Dimension(None), Category::Hierarchy, Some(1))]
#[case(DataType::Integer, Category::Numeric, Some(1))]
#[case(DataType::Null, Category::Numeric, Some(1))]
#[case(DataType::Empty, Category::Set, Some(0))]
#[case(DataType::Numeric, Category::Set, None)]
#[case(DataType::String, Category::Numeric, None)]
#[case(DataType::Symbol, Category::Numeric, None)]
fn test_conversion_cost(
    #[case] from: DataType,
    #[case] to: Category,
    #[case] expected: Option<u32>,
) {
    assert_eq!(ConversionRules::new().conversion_cost(&from, to), expected);
}
