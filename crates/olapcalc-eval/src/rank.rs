//! `Rank(tuple, set [, numeric])`
//!
//! Without a key the rank is the 1-based position of the tuple in the set,
//! or 0 when it is absent. With a key the rank is by value, largest first:
//! ties share a rank, a value outside the set takes the rank of its
//! insertion point among the distinct values, and a null value ranks after
//! every non-null one. The sorted snapshot is computed once per evaluation
//! state and cached.

use olapcalc_types::{DataType, HierarchyId, Member, Tuple, TupleList, Value, compare_values};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{CacheDescriptor, CacheEntry, CacheKind};
use crate::calc::{Calc, CalcRef, ResultShape, value_to_tuple};
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::validator::CallId;

/// Sorted snapshot of a set used to answer rank queries
#[derive(Debug, Clone)]
pub struct Ranking {
    arity: usize,
    /// Hierarchy of each position, taken from the first tuple
    hierarchies: Option<Vec<HierarchyId>>,
    /// Rank of every tuple of the set
    ranks: HashMap<Tuple, usize>,
    /// Non-null key values, largest first, duplicates kept
    sorted: Vec<Value>,
    /// Distinct non-null key values, largest first
    unique: Vec<Value>,
    keyed: bool,
}

impl Ranking {
    /// Rank by position in `list`
    pub fn by_position(list: &TupleList) -> Self {
        let mut ranks = HashMap::with_capacity(list.len());
        for (i, tuple) in list.iter().enumerate() {
            ranks.entry(tuple.clone()).or_insert(i + 1);
        }
        Self {
            arity: list.arity(),
            hierarchies: hierarchies_of(list),
            ranks,
            sorted: Vec::new(),
            unique: Vec::new(),
            keyed: false,
        }
    }

    /// Rank by the key value of each tuple; error values count as null
    pub fn by_value(list: &TupleList, values: Vec<Value>) -> Self {
        let values: Vec<Value> = values
            .into_iter()
            .map(|v| if v.is_error() { Value::Null } else { v })
            .collect();
        let mut sorted: Vec<Value> = values.iter().filter(|v| !v.is_null()).cloned().collect();
        sorted.sort_by(|a, b| compare_values(b, a));
        let mut unique = sorted.clone();
        unique.dedup_by(|a, b| compare_values(a, b).is_eq());

        let mut ranking = Self {
            arity: list.arity(),
            hierarchies: hierarchies_of(list),
            ranks: HashMap::with_capacity(list.len()),
            sorted,
            unique,
            keyed: true,
        };
        for (tuple, value) in list.iter().zip(&values) {
            let rank = ranking.rank_of_value(value);
            ranking.ranks.entry(tuple.clone()).or_insert(rank);
        }
        ranking
    }

    pub fn is_keyed(&self) -> bool {
        self.keyed
    }

    /// Rank of a tuple of the set
    pub fn rank_of_tuple(&self, tuple: &Tuple) -> Option<usize> {
        self.ranks.get(tuple).copied()
    }

    /// Rank a key value would have in the set
    pub fn rank_of_value(&self, value: &Value) -> usize {
        if value.is_empty_cell() {
            return self.sorted.len() + 1;
        }
        match self
            .unique
            .binary_search_by(|other| compare_values(value, other))
        {
            // first occurrence among the duplicates
            Ok(_) => self.sorted.partition_point(|v| compare_values(v, value).is_gt()) + 1,
            Err(insertion) => insertion + 1,
        }
    }

    /// Check that `tuple` can be compared with the tuples of the set
    fn check_subject(&self, tuple: &Tuple) -> EvalResult<()> {
        if tuple.arity() != self.arity {
            return Err(EvalError::ArityMismatch {
                expected: self.arity,
                found: tuple.arity(),
            });
        }
        if let Some(hierarchies) = &self.hierarchies {
            for (position, (member, h)) in tuple.iter().zip(hierarchies).enumerate() {
                if member.hierarchy() != *h {
                    return Err(EvalError::hierarchy_mismatch(format!(
                        "{member} is not in the hierarchy of position {position} of the set"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn hierarchies_of(list: &TupleList) -> Option<Vec<HierarchyId>> {
    list.get(0)
        .map(|t| t.iter().map(Member::hierarchy).collect())
}

#[derive(Debug)]
pub struct RankCalc {
    id: CallId,
    tuple: CalcRef,
    set: CalcRef,
    key: Option<CalcRef>,
    /// Hierarchies the ranking snapshot depends on
    dependencies: Vec<HierarchyId>,
    data_type: DataType,
}

impl RankCalc {
    pub fn new(
        id: CallId,
        tuple: CalcRef,
        set: CalcRef,
        key: Option<CalcRef>,
        dependencies: Vec<HierarchyId>,
    ) -> Self {
        Self {
            id,
            tuple,
            set,
            key,
            dependencies,
            data_type: DataType::Integer,
        }
    }

    fn ranking(&self, ev: &mut Evaluator<'_>) -> EvalResult<Arc<Ranking>> {
        let descriptor = CacheDescriptor::new(self.id, CacheKind::Ranking, self.dependencies.clone());
        let entry = ev.get_cached_result(&descriptor, |ev| {
            let list = self.set.evaluate_list(ev)?;
            let ranking = match &self.key {
                None => Ranking::by_position(&list),
                Some(key) => {
                    let mut values = Vec::with_capacity(list.len());
                    for tuple in &list {
                        values.push(key_value(ev, key, tuple)?);
                    }
                    Ranking::by_value(&list, values)
                }
            };
            Ok(CacheEntry::Ranking(Arc::new(ranking)))
        })?;
        match entry {
            CacheEntry::Ranking(r) => Ok(r),
            other => Err(EvalError::internal(format!("rank cache holds {other:?}"))),
        }
    }
}

fn key_value(ev: &mut Evaluator<'_>, key: &CalcRef, tuple: &Tuple) -> EvalResult<Value> {
    ev.check()?;
    let mut ev = ev.scoped();
    ev.set_context_tuple(tuple);
    key.evaluate(&mut ev)
}

impl Calc for RankCalc {
    fn name(&self) -> &str {
        "Rank"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Scalar
    }

    fn children(&self) -> Vec<CalcRef> {
        let mut children = vec![self.tuple.clone(), self.set.clone()];
        children.extend(self.key.iter().cloned());
        children
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        let subject = value_to_tuple(self.tuple.evaluate(ev)?)?;
        let ranking = self.ranking(ev)?;
        let Some(subject) = subject else {
            return Ok(Value::Integer(0));
        };
        ranking.check_subject(&subject)?;

        let rank = match (ranking.rank_of_tuple(&subject), &self.key) {
            (Some(rank), _) => rank,
            (None, None) => 0,
            (None, Some(key)) => {
                let value = key_value(ev, key, &subject)?;
                ranking.rank_of_value(&value)
            }
        };
        Ok(Value::Integer(rank as i64))
    }

    /// The subject tuple and the snapshot dependencies
    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        self.tuple.depends_on(hierarchy) || self.dependencies.contains(&hierarchy)
    }
}
