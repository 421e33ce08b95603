//! Evaluation context
//!
//! The evaluator holds the current member of every hierarchy. Mutations are
//! recorded on an undo stack so that a [`Savepoint`] can unwind them in LIFO
//! order; [`Evaluator::scoped`] wraps this in a guard that restores on drop,
//! on both normal and error exit.

use log::trace;
use olapcalc_diagnostics::OLAP0102;
use olapcalc_model::{Catalog, CellValue, ModelError};
use olapcalc_types::{HierarchyId, Member, MemberId, TupleList, Value};
use std::ops::{Deref, DerefMut};

use crate::cache::{CacheDescriptor, CacheEntry, CacheKey};
use crate::calc::TupleIterable;
use crate::config::EngineConfig;
use crate::error::{EvalError, EvalResult};
use crate::scope::QueryScope;

/// Restore point returned by [`Evaluator::savepoint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(usize);

#[derive(Debug)]
enum Undo {
    /// Previous current member of a hierarchy
    Member(Member),
    NonEmpty(bool),
}

pub struct Evaluator<'q> {
    scope: &'q QueryScope,
    coordinates: Vec<Member>,
    non_empty: bool,
    undo: Vec<Undo>,
    /// Calculated members whose formula is being evaluated
    expanding: Vec<MemberId>,
}

impl<'q> Evaluator<'q> {
    /// An evaluator positioned on the default member of every hierarchy
    pub fn new(scope: &'q QueryScope) -> EvalResult<Self> {
        let catalog = scope.catalog();
        let coordinates = catalog
            .hierarchies()
            .iter()
            .map(|h| {
                catalog.default_member(h.id).ok_or_else(|| {
                    EvalError::Model(ModelError::MemberNotFound(format!(
                        "default member of {}",
                        h.unique_name
                    )))
                })
            })
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(Self {
            scope,
            coordinates,
            non_empty: false,
            undo: Vec::new(),
            expanding: Vec::new(),
        })
    }

    pub fn scope(&self) -> &'q QueryScope {
        self.scope
    }

    pub fn catalog(&self) -> &'q dyn Catalog {
        self.scope.catalog()
    }

    pub fn config(&self) -> &'q EngineConfig {
        self.scope.config()
    }

    /// Current member of every hierarchy, indexed by hierarchy id
    pub fn coordinates(&self) -> &[Member] {
        &self.coordinates
    }

    pub fn current_member(&self, hierarchy: HierarchyId) -> Option<&Member> {
        self.coordinates.get(hierarchy.index())
    }

    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.undo.len())
    }

    /// Undo every mutation made since `savepoint`
    pub fn restore(&mut self, savepoint: Savepoint) -> EvalResult<()> {
        if savepoint.0 > self.undo.len() {
            return Err(EvalError::UnbalancedSavepoint {
                token: savepoint.0,
                depth: self.undo.len(),
            });
        }
        while self.undo.len() > savepoint.0 {
            match self.undo.pop() {
                Some(Undo::Member(previous)) => {
                    let index = previous.hierarchy().index();
                    self.coordinates[index] = previous;
                }
                Some(Undo::NonEmpty(previous)) => self.non_empty = previous,
                None => break,
            }
        }
        Ok(())
    }

    /// Guard that restores the current state when dropped
    pub fn scoped(&mut self) -> ScopedEvaluator<'_, 'q> {
        let savepoint = self.savepoint();
        ScopedEvaluator {
            ev: self,
            savepoint,
        }
    }

    /// Make `member` the current member of its hierarchy
    pub fn set_context(&mut self, member: &Member) {
        let Some(slot) = self.coordinates.get_mut(member.hierarchy().index()) else {
            return;
        };
        if slot == member {
            return;
        }
        let previous = std::mem::replace(slot, member.clone());
        self.undo.push(Undo::Member(previous));
    }

    pub fn set_context_tuple(&mut self, members: &[Member]) {
        for m in members {
            self.set_context(m);
        }
    }

    pub fn is_non_empty(&self) -> bool {
        self.non_empty
    }

    pub fn set_non_empty(&mut self, non_empty: bool) {
        if self.non_empty != non_empty {
            self.undo.push(Undo::NonEmpty(self.non_empty));
            self.non_empty = non_empty;
        }
    }

    /// Cooperative cancellation check
    pub fn check(&self) -> EvalResult<()> {
        self.scope.execution().check()
    }

    /// Value of the cell at the current coordinates.
    ///
    /// The calculated member with the highest solve order is expanded by
    /// evaluating its formula. A read that is not loaded yet, directly or
    /// inside a formula, answers [`CellValue::NotReady`].
    pub fn evaluate_cell(&mut self) -> EvalResult<CellValue> {
        self.check()?;
        let calculated = self
            .coordinates
            .iter()
            .filter(|m| m.is_calculated())
            .max_by_key(|m| m.solve_order())
            .cloned();
        let Some(member) = calculated else {
            let value = self.scope.reader().get(&self.coordinates);
            trace!("cell {:?} = {:?}", self.coordinates, value);
            return Ok(value);
        };

        if self.expanding.contains(&member.id()) {
            return Ok(CellValue::Value(Value::error(
                OLAP0102,
                format!("Cyclic definition of calculated member {member}"),
            )));
        }
        let max_depth = self.config().max_recursion_depth;
        if self.expanding.len() >= max_depth {
            return Err(EvalError::RecursionLimit { depth: max_depth });
        }

        let calc = self.scope.formula_calc(&member)?;
        let misses = self.scope.reader().miss_count();
        self.expanding.push(member.id());
        let result = {
            let mut ev = self.scoped();
            calc.evaluate(&mut ev)
        };
        self.expanding.pop();
        let value = result?;
        trace!("calculated {member} = {value}");
        if self.scope.reader().miss_count() > misses {
            return Ok(CellValue::NotReady);
        }
        Ok(CellValue::Value(value))
    }

    /// Value of the cell at the current coordinates; cells that are not
    /// loaded yet read as null
    pub fn evaluate_current(&mut self) -> EvalResult<Value> {
        Ok(match self.evaluate_cell()? {
            CellValue::Value(v) => v,
            CellValue::NotReady => Value::Null,
        })
    }

    fn cache_key(&self, descriptor: &CacheDescriptor) -> CacheKey {
        CacheKey {
            call: descriptor.call,
            kind: descriptor.kind,
            state: descriptor
                .dependencies
                .iter()
                .filter_map(|h| self.current_member(*h).map(Member::id))
                .collect(),
            non_empty: self.non_empty,
        }
    }

    /// Compute an entry once per (descriptor, evaluator state) and return
    /// the memoized entry afterwards
    pub fn get_cached_result(
        &mut self,
        descriptor: &CacheDescriptor,
        compute: impl FnOnce(&mut Self) -> EvalResult<CacheEntry>,
    ) -> EvalResult<CacheEntry> {
        if !self.config().enable_expression_cache {
            return compute(self);
        }
        let key = self.cache_key(descriptor);
        if let Some(entry) = self.scope.cached(&key) {
            return Ok(entry);
        }
        let entry = compute(self)?;
        trace!("cached {:?}/{:?}", descriptor.call, descriptor.kind);
        Ok(self.scope.store(key, entry))
    }

    /// Collect an iterable, enforcing the result limit and the execution
    /// budget
    pub fn materialize(&self, iterable: TupleIterable) -> EvalResult<TupleList> {
        let limit = self.config().result_limit;
        let mut list = TupleList::new(iterable.arity());
        for tuple in iterable {
            self.check()?;
            if limit > 0 && list.len() >= limit {
                return Err(EvalError::ResultLimitExceeded {
                    size: list.len() as u128 + 1,
                    limit,
                });
            }
            list.push(tuple)?;
        }
        Ok(list)
    }
}

/// Evaluator guard restoring its savepoint on drop
pub struct ScopedEvaluator<'e, 'q> {
    ev: &'e mut Evaluator<'q>,
    savepoint: Savepoint,
}

impl<'q> Deref for ScopedEvaluator<'_, 'q> {
    type Target = Evaluator<'q>;

    fn deref(&self) -> &Self::Target {
        self.ev
    }
}

impl DerefMut for ScopedEvaluator<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ev
    }
}

impl Drop for ScopedEvaluator<'_, '_> {
    fn drop(&mut self) {
        // The savepoint was taken from this evaluator and nothing below it
        // can be popped while the guard borrows it
        let _ = self.ev.restore(self.savepoint);
    }
}
