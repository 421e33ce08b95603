//! Cross join and the non-empty cross-join optimizer
//!
//! A plain cross join is the cartesian product of its operands. When the
//! evaluator is in non-empty mode (or for `NonEmptyCrossJoin`) and the
//! product is larger than `crossjoin_optimizer_size`, each operand is first
//! pruned of the tuples that cannot produce a non-empty cell under any
//! coordinate the product could later be evaluated at:
//!
//! - hierarchies outside the operand are set to their All member, or, when
//!   a hierarchy has no All member, every top-level member is tried
//! - the cell is tried at the current measure and at every measure
//!   reachable from the query, including the stored measures behind
//!   calculated measures
//! - hierarchies overridden by measure formulas are set to All
//!
//! Tuples holding calculated members, cells that are not loaded yet and
//! cells that fail with a recoverable error are kept. The pruning never drops a tuple the full product would have
//! shown a value for.

use indexmap::IndexSet;
use log::{debug, warn};
use olapcalc_ast::{Identifier, Visitor};
use olapcalc_model::{Catalog, CellValue, Element};
use olapcalc_types::{
    CartesianIter, DataType, HierarchyId, Member, TupleList, Value, cartesian_product,
};
use std::sync::Arc;

use crate::cache::{CacheDescriptor, CacheEntry, CacheKind};
use crate::calc::{Calc, CalcRef, ResultShape, TupleIterable};
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::validator::CallId;

#[derive(Debug)]
pub struct CrossJoinCalc {
    id: CallId,
    operands: Vec<CalcRef>,
    /// Keep only tuples whose cell is non-empty
    non_empty_only: bool,
    /// The first operand is consumed as an iterable
    lazy: bool,
    measures: HierarchyId,
    data_type: DataType,
}

impl CrossJoinCalc {
    pub fn new(
        id: CallId,
        operands: Vec<CalcRef>,
        non_empty_only: bool,
        lazy: bool,
        measures: HierarchyId,
        data_type: DataType,
    ) -> Self {
        Self {
            id,
            operands,
            non_empty_only,
            lazy,
            measures,
            data_type,
        }
    }

    fn arity(&self) -> usize {
        self.operands
            .iter()
            .map(|o| o.data_type().arity().unwrap_or(1))
            .sum()
    }

    fn evaluate_operands(&self, ev: &mut Evaluator<'_>) -> EvalResult<Vec<TupleList>> {
        let limit = ev.config().result_limit;
        let mut lists = Vec::with_capacity(self.operands.len());
        for operand in &self.operands {
            let list = operand.evaluate_list(ev)?;
            if limit > 0 && list.len() > limit {
                return Err(EvalError::ResultLimitExceeded {
                    size: list.len() as u128,
                    limit,
                });
            }
            lists.push(list);
        }
        Ok(lists)
    }

    /// Prune every operand; `None` when the miss-count heuristic gave up
    fn optimize(
        &self,
        ev: &mut Evaluator<'_>,
        lists: Vec<TupleList>,
    ) -> EvalResult<Option<Vec<TupleList>>> {
        let mut pruned = Vec::with_capacity(lists.len());
        for (index, list) in lists.into_iter().enumerate() {
            let before = list.len();
            let Some(list) = self.prune(ev, index, &list)? else {
                return Ok(None);
            };
            debug!(
                "cross join {:?}: operand {index} pruned from {before} to {}",
                self.id,
                list.len()
            );
            let empty = list.is_empty();
            pruned.push(list);
            if empty {
                break;
            }
        }
        Ok(Some(pruned))
    }

    fn prune(
        &self,
        ev: &mut Evaluator<'_>,
        index: usize,
        list: &TupleList,
    ) -> EvalResult<Option<TupleList>> {
        let Some(first) = list.get(0) else {
            return Ok(Some(list.clone()));
        };
        let operand: Vec<HierarchyId> = first.iter().map(Member::hierarchy).collect();
        let on_measures = operand.contains(&self.measures);

        let all_members = self.all_members(ev, index, &operand)?;
        let roots = self.non_all_roots(ev, index, &operand)?;
        let measure_set = if on_measures {
            Arc::new(Vec::new())
        } else {
            let mut measures = self.measure_set(ev)?;
            if let Some(current) = ev.current_member(self.measures).cloned() {
                if !measures.contains(&current) {
                    Arc::make_mut(&mut measures).push(current);
                }
            }
            measures
        };
        let overridden = self.measure_members(ev)?;
        let catalog = ev.catalog();
        let neutral: Vec<Member> = overridden
            .iter()
            .filter(|m| !operand.contains(&m.hierarchy()))
            .filter_map(|m| catalog.all_member(m.hierarchy()))
            .collect();

        let reader = ev.scope().reader();
        let misses = reader.miss_count();
        let mut kept = TupleList::with_capacity(list.arity(), list.len());
        for tuple in list {
            ev.check()?;
            let keep = tuple.contains_calculated() || {
                let mut ev = ev.scoped();
                ev.set_context_tuple(&all_members);
                ev.set_context_tuple(tuple);
                ev.set_context_tuple(&neutral);
                any_non_empty(&mut ev, &roots, &measure_set)?
            };
            if keep {
                kept.push(tuple.clone())?;
            }
        }

        let punt_size = ev.config().punt_miss_count_list_size;
        if reader.miss_count() > misses && kept.len() > punt_size {
            warn!(
                "cross join {:?}: {} tuples survive with unloaded cells, deferring until cells are loaded",
                self.id,
                kept.len()
            );
            return Ok(None);
        }
        Ok(Some(kept))
    }

    /// All members of the hierarchies outside the operand
    fn all_members(
        &self,
        ev: &mut Evaluator<'_>,
        index: usize,
        operand: &[HierarchyId],
    ) -> EvalResult<Arc<Vec<Member>>> {
        let descriptor = CacheDescriptor::query_scoped(self.id, CacheKind::AllMembers(index));
        let measures = self.measures;
        let entry = ev.get_cached_result(&descriptor, |ev| {
            let catalog = ev.catalog();
            let members = other_hierarchies(catalog, operand, measures)
                .filter_map(|h| catalog.all_member(h))
                .collect();
            Ok(CacheEntry::Members(Arc::new(members)))
        })?;
        entry
            .into_members()
            .ok_or_else(|| EvalError::internal("all-member cache holds another entry kind"))
    }

    /// Top-level members of the hierarchies outside the operand that have
    /// no All member, one list per hierarchy
    fn non_all_roots(
        &self,
        ev: &mut Evaluator<'_>,
        index: usize,
        operand: &[HierarchyId],
    ) -> EvalResult<Arc<Vec<Vec<Member>>>> {
        let descriptor = CacheDescriptor::query_scoped(self.id, CacheKind::NonAllRoots(index));
        let measures = self.measures;
        let entry = ev.get_cached_result(&descriptor, |ev| {
            let catalog = ev.catalog();
            let roots = other_hierarchies(catalog, operand, measures)
                .filter(|h| !catalog.has_all(*h))
                .map(|h| catalog.root_members(h))
                .filter(|members| !members.is_empty())
                .collect();
            Ok(CacheEntry::MemberLists(Arc::new(roots)))
        })?;
        entry
            .into_member_lists()
            .ok_or_else(|| EvalError::internal("root cache holds another entry kind"))
    }

    fn measure_set(&self, ev: &mut Evaluator<'_>) -> EvalResult<Arc<Vec<Member>>> {
        let descriptor = CacheDescriptor::query_scoped(self.id, CacheKind::MeasureSet);
        let entry = ev.get_cached_result(&descriptor, |ev| {
            let discovery = MeasureDiscovery::run(ev.catalog(), ev.scope().measures());
            debug!(
                "cross join {:?}: {} reachable measure(s)",
                self.id,
                discovery.measures.len()
            );
            Ok(CacheEntry::Members(Arc::new(
                discovery.measures.into_iter().collect(),
            )))
        })?;
        entry
            .into_members()
            .ok_or_else(|| EvalError::internal("measure cache holds another entry kind"))
    }

    fn measure_members(&self, ev: &mut Evaluator<'_>) -> EvalResult<Arc<Vec<Member>>> {
        let descriptor = CacheDescriptor::query_scoped(self.id, CacheKind::MeasureMembers);
        let entry = ev.get_cached_result(&descriptor, |ev| {
            let discovery = MeasureDiscovery::run(ev.catalog(), ev.scope().measures());
            Ok(CacheEntry::Members(Arc::new(
                discovery.members.into_iter().collect(),
            )))
        })?;
        entry
            .into_members()
            .ok_or_else(|| EvalError::internal("measure member cache holds another entry kind"))
    }

    /// Keep the tuples whose cell at the current context is non-empty
    fn filter_non_empty(&self, ev: &mut Evaluator<'_>, product: TupleList) -> EvalResult<TupleList> {
        let mut kept = TupleList::with_capacity(product.arity(), product.len());
        for tuple in &product {
            ev.check()?;
            let mut ev = ev.scoped();
            ev.set_context_tuple(tuple);
            if cell_non_empty(&mut ev, false)? {
                kept.push(tuple.clone())?;
            }
        }
        Ok(kept)
    }
}

impl Calc for CrossJoinCalc {
    fn name(&self) -> &str {
        if self.non_empty_only {
            "NonEmptyCrossJoin"
        } else {
            "CrossJoin"
        }
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        if self.lazy {
            ResultShape::Iterable
        } else {
            ResultShape::List
        }
    }

    fn children(&self) -> Vec<CalcRef> {
        self.operands.clone()
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        let mut lists = self.evaluate_operands(ev)?;
        if lists.iter().any(TupleList::is_empty) {
            return Ok(TupleList::new(self.arity()));
        }

        if self.non_empty_only || ev.is_non_empty() {
            let size: u128 = lists.iter().map(|l| l.len() as u128).product();
            let threshold = ev.config().crossjoin_optimizer_size as u128;
            if size > threshold {
                debug!(
                    "cross join {:?}: optimizing product of size {size} (threshold {threshold})",
                    self.id
                );
                match self.optimize(ev, lists)? {
                    Some(pruned) => lists = pruned,
                    None => return Ok(TupleList::new(self.arity())),
                }
                if lists.len() < self.operands.len() || lists.iter().any(TupleList::is_empty) {
                    return Ok(TupleList::new(self.arity()));
                }
            }
        }

        let limit = ev.config().result_limit;
        let product = cartesian_product(&lists, limit, || ev.check())?;
        if self.non_empty_only {
            return self.filter_non_empty(ev, product);
        }
        Ok(product)
    }

    fn evaluate_iterable(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleIterable> {
        if !self.lazy || ev.is_non_empty() || self.operands.is_empty() {
            return Ok(TupleIterable::from_list(self.evaluate_list(ev)?));
        }
        let left = self.operands[0].evaluate_iterable(ev)?;
        let mut rights = Vec::with_capacity(self.operands.len() - 1);
        for operand in &self.operands[1..] {
            rights.push(operand.evaluate_list(ev)?);
        }
        Ok(TupleIterable::new(self.arity(), CartesianIter::new(left, rights)))
    }

    /// Pruning reads cells at the current measure; `NonEmptyCrossJoin` reads
    /// them at every hierarchy its operands do not fix
    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        self.operands.iter().any(|o| o.depends_on(hierarchy))
            || hierarchy == self.measures
            || (self.non_empty_only && !self.data_type.uses_hierarchy(hierarchy, true))
    }
}

fn other_hierarchies<'c>(
    catalog: &'c dyn Catalog,
    operand: &'c [HierarchyId],
    measures: HierarchyId,
) -> impl Iterator<Item = HierarchyId> + 'c {
    catalog
        .hierarchies()
        .iter()
        .map(|h| h.id)
        .filter(move |h| *h != measures && !operand.contains(h))
}

/// Whether some combination of `roots` and `measures` gives a non-empty
/// cell. An empty measure list means the current measure.
fn any_non_empty(ev: &mut Evaluator<'_>, roots: &[Vec<Member>], measures: &[Member]) -> EvalResult<bool> {
    if let Some((first, rest)) = roots.split_first() {
        for member in first {
            ev.check()?;
            let mut ev = ev.scoped();
            ev.set_context(member);
            if any_non_empty(&mut ev, rest, measures)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    if measures.is_empty() {
        return cell_non_empty(ev, true);
    }
    for measure in measures {
        let mut ev = ev.scoped();
        ev.set_context(measure);
        if cell_non_empty(&mut ev, true)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// A cell that is not loaded yet counts as non-empty. A recoverable error
/// counts as `on_error`; resource limits unwind.
fn cell_non_empty(ev: &mut Evaluator<'_>, on_error: bool) -> EvalResult<bool> {
    match ev.evaluate_cell() {
        Ok(CellValue::NotReady) => Ok(true),
        Ok(CellValue::Value(v)) => Ok(!v.is_empty_cell()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            debug!("cell failed while testing for emptiness: {e}");
            Ok(on_error)
        }
    }
}

/// Measures reachable from a query and the other members their formulas
/// reference
#[derive(Debug, Default)]
pub struct MeasureDiscovery {
    pub measures: IndexSet<Member>,
    pub members: IndexSet<Member>,
}

impl MeasureDiscovery {
    /// Expand `seeds` transitively through calculated measure formulas;
    /// every calculated measure is expanded once, which stops cycles
    pub fn run(catalog: &dyn Catalog, seeds: &IndexSet<Member>) -> Self {
        let mut discovery = Self::default();
        let mut pending: Vec<Member> = seeds.iter().cloned().collect();
        let mut expanded: IndexSet<Member> = IndexSet::new();
        while let Some(measure) = pending.pop() {
            if !measure.is_measure() {
                discovery.members.insert(measure);
                continue;
            }
            discovery.measures.insert(measure.clone());
            if !measure.is_calculated() || !expanded.insert(measure.clone()) {
                continue;
            }
            let Some(formula) = catalog.formula(&measure) else {
                continue;
            };
            let mut collector = MemberCollector {
                catalog,
                found: Vec::new(),
            };
            collector.walk(&formula.formula);
            for member in collector.found {
                if member.is_measure() {
                    if !discovery.measures.contains(&member) || member.is_calculated() {
                        pending.push(member);
                    }
                } else {
                    discovery.members.insert(member);
                }
            }
        }
        discovery
    }
}

/// Collects the catalog members named in an expression
struct MemberCollector<'c> {
    catalog: &'c dyn Catalog,
    found: Vec<Member>,
}

impl Visitor for MemberCollector<'_> {
    fn visit_id(&mut self, id: &Identifier) -> bool {
        if let Some(Element::Member(m)) = self.catalog.lookup(&id.segments) {
            self.found.push(m);
        }
        true
    }
}
