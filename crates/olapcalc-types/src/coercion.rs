//! Implicit conversion rules between expression types and signature categories
//!
//! Overload resolution asks, for each actual argument, whether its static
//! type converts to the declared parameter category. Every successful
//! non-identity conversion is recorded in a side channel together with a
//! cost, so that the compiler can insert the conversion and tooling can
//! explain the match.

use serde::Serialize;

use crate::category::{Category, DataType};

/// One implicit conversion applied to an argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversion {
    /// Position of the argument in the call
    pub ordinal: usize,
    pub from: Category,
    pub to: Category,
    pub cost: u32,
}

/// Implicit conversion rules
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionRules;

impl ConversionRules {
    pub fn new() -> Self {
        Self
    }

    /// Cost of converting `from` to `to`, or `None` if no implicit
    /// conversion exists. Identity costs 0.
    pub fn conversion_cost(&self, from: &DataType, to: Category) -> Option<u32> {
        let source = from.category();
        if source == to {
            return Some(0);
        }
        let cost = match (source, to) {
            // Unresolved expressions and empty arguments fit anywhere
            (Category::Unknown, _) | (Category::Empty, _) => 0,
            (Category::Null, t) if t.is_scalar() || t == Category::Member => 1,

            (Category::Integer, Category::Numeric) => 1,
            (s, Category::Value) if s.is_scalar() => 1,

            (Category::Member, Category::Tuple) => 1,
            (Category::Member, Category::Set) => 2,
            (Category::Tuple, Category::Set) => 2,
            (Category::Level, Category::Set) => 2,
            (Category::Hierarchy, Category::Member) => 2,
            (Category::Hierarchy, Category::Set) => 3,
            (Category::Dimension, Category::Hierarchy) => 1,
            (Category::Dimension, Category::Member) => 3,

            // Cell value at the coordinate
            (Category::Member | Category::Tuple, Category::Value | Category::Numeric) => 3,
            (Category::Member | Category::Tuple, Category::String | Category::Logical) => 4,

            (Category::Numeric | Category::Integer, Category::Logical) => 5,
            (Category::Value, Category::Numeric | Category::String | Category::Logical) => 10,
            _ => return None,
        };
        Some(cost)
    }

    /// Whether an argument of type `from` at position `ordinal` converts to
    /// `to`. Non-identity conversions are appended to `conversions`.
    pub fn can_convert(
        &self,
        ordinal: usize,
        from: &DataType,
        to: Category,
        conversions: &mut Vec<Conversion>,
    ) -> bool {
        match self.conversion_cost(from, to) {
            Some(0) => true,
            Some(cost) => {
                conversions.push(Conversion {
                    ordinal,
                    from: from.category(),
                    to,
                    cost,
                });
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::HierarchyId;

    #[test]
    fn test_identity_is_free() {
        let mut conversions = Vec::new();
        assert!(ConversionRules.can_convert(0, &DataType::Numeric, Category::Numeric, &mut conversions));
        assert!(conversions.is_empty());
    }

    #[test]
    fn test_member_widens_to_set() {
        let mut conversions = Vec::new();
        let member = DataType::Member(Some(HierarchyId(1)));
        assert!(ConversionRules.can_convert(1, &member, Category::Set, &mut conversions));
        assert_eq!(
            conversions,
            vec![Conversion {
                ordinal: 1,
                from: Category::Member,
                to: Category::Set,
                cost: 2
            }]
        );
    }

    #[test]
    fn test_set_does_not_narrow() {
        let mut conversions = Vec::new();
        let set = DataType::member_set(None);
        assert!(!ConversionRules.can_convert(0, &set, Category::Member, &mut conversions));
        assert!(!ConversionRules.can_convert(0, &set, Category::Numeric, &mut conversions));
        assert!(conversions.is_empty());
    }

    #[test]
    fn test_symbol_converts_only_to_symbol() {
        assert_eq!(ConversionRules.conversion_cost(&DataType::Symbol, Category::Value), None);
        assert_eq!(ConversionRules.conversion_cost(&DataType::Symbol, Category::Symbol), Some(0));
    }
}
