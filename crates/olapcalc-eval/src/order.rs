//! `Order(set, key [, direction] ...)`
//!
//! `ASC` and `DESC` keep the hierarchy: a member sorts after its ancestors,
//! and members are compared through their ancestors that are siblings.
//! `BASC` and `BDESC` break the hierarchy and sort on the key values alone;
//! equal keys fall back to natural hierarchical order. The direction of
//! the first key decides which of the two modes applies.

use olapcalc_types::{DataType, HierarchyId, Member, Tuple, TupleList, Value, compare_values};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::calc::{Calc, CalcRef, ResultShape};
use crate::error::EvalResult;
use crate::evaluator::Evaluator;
use crate::functions::sets::compare_tuples_hierarchically;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
    BAsc,
    BDesc,
}

impl Direction {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            "BASC" => Some(Self::BAsc),
            "BDESC" => Some(Self::BDesc),
            _ => None,
        }
    }

    pub fn is_break(self) -> bool {
        matches!(self, Self::BAsc | Self::BDesc)
    }

    pub fn is_descending(self) -> bool {
        matches!(self, Self::Desc | Self::BDesc)
    }
}

#[derive(Debug)]
pub struct OrderCalc {
    set: CalcRef,
    keys: Vec<(CalcRef, Direction)>,
    /// Key members that do not vary per element, set once before sorting
    constant: Vec<Member>,
}

impl OrderCalc {
    pub fn new(set: CalcRef, keys: Vec<(CalcRef, Direction)>, constant: Vec<Member>) -> Self {
        Self {
            set,
            keys,
            constant,
        }
    }

    fn key_values(&self, ev: &mut Evaluator<'_>, context: &[Member]) -> EvalResult<Vec<Value>> {
        ev.check()?;
        let mut ev = ev.scoped();
        ev.set_context_tuple(context);
        self.keys.iter().map(|(key, _)| key.evaluate(&mut ev)).collect()
    }

    fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        for ((x, y), (_, direction)) in a.iter().zip(b).zip(&self.keys) {
            let ordering = compare_values(x, y);
            let ordering = if direction.is_descending() {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn sort_breaking(&self, ev: &mut Evaluator<'_>, list: TupleList) -> EvalResult<TupleList> {
        let mut keyed = Vec::with_capacity(list.len());
        for tuple in &list {
            keyed.push((self.key_values(ev, tuple)?, tuple.clone()));
        }
        keyed.sort_by(|(ka, ta), (kb, tb)| {
            self.compare_keys(ka, kb)
                .then_with(|| compare_tuples_hierarchically(ta, tb, false))
        });
        Ok(TupleList::from_tuples(
            list.arity(),
            keyed.into_iter().map(|(_, t)| t).collect(),
        )?)
    }

    /// Hierarchical sort. Key values are needed for the ancestors the
    /// comparison lifts members to, so they are computed up front for every
    /// ancestor-or-self of every position, under the members before it.
    fn sort_hierarchical(&self, ev: &mut Evaluator<'_>, list: TupleList) -> EvalResult<TupleList> {
        let mut values: HashMap<Tuple, Vec<Value>> = HashMap::new();
        for tuple in &list {
            for position in 0..tuple.arity() {
                let prefix = &tuple[..position];
                let member = &tuple[position];
                for lifted in std::iter::once(member).chain(member.ancestors()) {
                    let context: Tuple = prefix.iter().chain(std::iter::once(lifted)).cloned().collect();
                    if values.contains_key(&context) {
                        continue;
                    }
                    let v = self.key_values(ev, &context)?;
                    values.insert(context, v);
                }
            }
        }

        let mut tuples = list.tuples().to_vec();
        tuples.sort_by(|a, b| {
            for position in 0..a.arity().min(b.arity()) {
                let (x, y) = (&a[position], &b[position]);
                if x == y {
                    continue;
                }
                if x.is_ancestor_of(y) {
                    return Ordering::Less;
                }
                if y.is_ancestor_of(x) {
                    return Ordering::Greater;
                }
                let (x, y) = lift_to_siblings(x, y);
                let prefix = &a[..position];
                return self
                    .compare_keys(lookup(&values, prefix, x), lookup(&values, prefix, y))
                    .then_with(|| x.ordinal().cmp(&y.ordinal()));
            }
            Ordering::Equal
        });
        Ok(TupleList::from_tuples(list.arity(), tuples)?)
    }
}

fn lookup<'v>(values: &'v HashMap<Tuple, Vec<Value>>, prefix: &[Member], member: &Member) -> &'v [Value] {
    let context: Tuple = prefix.iter().chain(std::iter::once(member)).cloned().collect();
    values.get(&context).map(Vec::as_slice).unwrap_or_default()
}

/// Ancestors-or-self of `a` and `b` that share a parent
fn lift_to_siblings<'m>(a: &'m Member, b: &'m Member) -> (&'m Member, &'m Member) {
    let depth = a.depth().min(b.depth());
    let mut x = a.ancestor_at_depth(depth).unwrap_or(a);
    let mut y = b.ancestor_at_depth(depth).unwrap_or(b);
    while x.parent() != y.parent() {
        match (x.parent(), y.parent()) {
            (Some(px), Some(py)) => {
                x = px;
                y = py;
            }
            _ => break,
        }
    }
    (x, y)
}

impl Calc for OrderCalc {
    fn name(&self) -> &str {
        "Order"
    }

    fn data_type(&self) -> &DataType {
        self.set.data_type()
    }

    fn shape(&self) -> ResultShape {
        ResultShape::MutableList
    }

    fn children(&self) -> Vec<CalcRef> {
        std::iter::once(self.set.clone())
            .chain(self.keys.iter().map(|(k, _)| k.clone()))
            .collect()
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        let list = self.set.evaluate_list(ev)?;
        let Some((_, first)) = self.keys.first() else {
            return Ok(list);
        };
        if list.len() < 2 {
            return Ok(list);
        }
        let mut ev = ev.scoped();
        ev.set_context_tuple(&self.constant);
        if first.is_break() {
            self.sort_breaking(&mut ev, list)
        } else {
            self.sort_hierarchical(&mut ev, list)
        }
    }

    /// Keys see each element in place of the set's own hierarchies
    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        self.set.depends_on(hierarchy)
            || (!self.set.data_type().uses_hierarchy(hierarchy, true)
                && self.keys.iter().any(|(k, _)| k.depends_on(hierarchy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("asc", Some(Direction::Asc))]
    #[case("BDESC", Some(Direction::BDesc))]
    #[case("Basc", Some(Direction::BAsc))]
    #[case("up", None)]
    fn test_parse_direction(#[case] text: &str, #[case] expected: Option<Direction>) {
        assert_eq!(Direction::parse(text), expected);
    }

    #[test]
    fn test_direction_flags() {
        assert!(Direction::BDesc.is_break() && Direction::BDesc.is_descending());
        assert!(!Direction::Asc.is_break() && !Direction::Asc.is_descending());
    }
}
