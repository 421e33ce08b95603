//! Set constructors, set combinators and aggregates

use log::debug;
use olapcalc_diagnostics::OLAP0100;
use olapcalc_types::{
    DataType, HierarchyId, Tuple, TupleList, Value, compare_hierarchically,
};
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::cache::{CacheDescriptor, CacheEntry, CacheKind};
use crate::calc::{Calc, CalcRef, ResultShape};
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::validator::CallId;

/// `{a, b, ...}`
#[derive(Debug)]
pub struct BracesCalc {
    sets: Vec<CalcRef>,
    data_type: DataType,
}

impl BracesCalc {
    pub fn new(sets: Vec<CalcRef>, data_type: DataType) -> Self {
        Self { sets, data_type }
    }
}

impl Calc for BracesCalc {
    fn name(&self) -> &str {
        "{}"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::List
    }

    fn children(&self) -> Vec<CalcRef> {
        self.sets.clone()
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        let mut out = TupleList::new(self.data_type.arity().unwrap_or(1));
        for set in &self.sets {
            let list = set.evaluate_list(ev)?;
            out.extend_from(&list)?;
        }
        Ok(out)
    }

    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        self.sets.iter().any(|s| s.depends_on(hierarchy))
    }
}

/// Reference to a set defined with `AS`, evaluated once per context it
/// depends on
#[derive(Debug)]
pub struct NamedSetCalc {
    name: String,
    call: CallId,
    inner: CalcRef,
    dependencies: Vec<HierarchyId>,
}

impl NamedSetCalc {
    pub fn new(name: String, call: CallId, inner: CalcRef, dependencies: Vec<HierarchyId>) -> Self {
        Self {
            name,
            call,
            inner,
            dependencies,
        }
    }
}

impl Calc for NamedSetCalc {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_type(&self) -> &DataType {
        self.inner.data_type()
    }

    fn shape(&self) -> ResultShape {
        ResultShape::List
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.inner.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        let descriptor =
            CacheDescriptor::new(self.call, CacheKind::Result, self.dependencies.clone());
        let inner = self.inner.clone();
        let entry = ev.get_cached_result(&descriptor, |ev| {
            debug!("evaluating named set {}", self.name);
            Ok(CacheEntry::Value(Value::Set(inner.evaluate_list(ev)?)))
        })?;
        match entry {
            CacheEntry::Value(Value::Set(list)) => Ok(list),
            other => Err(EvalError::internal(format!(
                "named set {} cached as {other:?}",
                self.name
            ))),
        }
    }

    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        self.dependencies.contains(&hierarchy)
    }
}

#[derive(Debug)]
pub struct DistinctCalc {
    set: CalcRef,
}

impl DistinctCalc {
    pub fn new(set: CalcRef) -> Self {
        Self { set }
    }
}

impl Calc for DistinctCalc {
    fn name(&self) -> &str {
        "Distinct"
    }

    fn data_type(&self) -> &DataType {
        self.set.data_type()
    }

    fn shape(&self) -> ResultShape {
        ResultShape::List
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.set.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        Ok(self.set.evaluate_list(ev)?.distinct())
    }
}

/// `Extract(set, h1, h2, ...)`: projection onto hierarchies, deduplicated
#[derive(Debug)]
pub struct ExtractCalc {
    set: CalcRef,
    hierarchies: Vec<CalcRef>,
    data_type: DataType,
}

impl ExtractCalc {
    pub fn new(set: CalcRef, hierarchies: Vec<CalcRef>, data_type: DataType) -> Self {
        Self {
            set,
            hierarchies,
            data_type,
        }
    }
}

impl Calc for ExtractCalc {
    fn name(&self) -> &str {
        "Extract"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::List
    }

    fn children(&self) -> Vec<CalcRef> {
        std::iter::once(self.set.clone())
            .chain(self.hierarchies.iter().cloned())
            .collect()
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        let mut wanted = Vec::with_capacity(self.hierarchies.len());
        for calc in &self.hierarchies {
            match calc.evaluate(ev)? {
                Value::Hierarchy(h) => wanted.push(h),
                other => return Err(EvalError::type_mismatch("Hierarchy", other.category().name())),
            }
        }
        let list = self.set.evaluate_list(ev)?;
        let Some(first) = list.get(0) else {
            return Ok(TupleList::new(wanted.len()));
        };
        let ordinals = wanted
            .iter()
            .map(|h| {
                first.iter().position(|m| m.hierarchy() == *h).ok_or_else(|| {
                    EvalError::invalid_argument("Extract", format!("hierarchy {} is not in the set", h.0))
                })
            })
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(list.project(&ordinals)?.distinct())
    }
}

/// Compare two tuples position by position in hierarchical order
pub fn compare_tuples_hierarchically(a: &Tuple, b: &Tuple, post: bool) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| compare_hierarchically(x, y, post))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[derive(Debug)]
pub struct HierarchizeCalc {
    set: CalcRef,
    post: bool,
}

impl HierarchizeCalc {
    pub fn new(set: CalcRef, post: bool) -> Self {
        Self { set, post }
    }
}

impl Calc for HierarchizeCalc {
    fn name(&self) -> &str {
        "Hierarchize"
    }

    fn data_type(&self) -> &DataType {
        self.set.data_type()
    }

    fn shape(&self) -> ResultShape {
        ResultShape::MutableList
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.set.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        let mut list = self.set.evaluate_list(ev)?;
        let post = self.post;
        list.sort_by(|a, b| compare_tuples_hierarchically(a, b, post));
        Ok(list)
    }
}

#[derive(Debug)]
pub struct CountCalc {
    set: CalcRef,
    data_type: DataType,
}

impl CountCalc {
    pub fn new(set: CalcRef) -> Self {
        Self {
            set,
            data_type: DataType::Integer,
        }
    }
}

impl Calc for CountCalc {
    fn name(&self) -> &str {
        "Count"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Scalar
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.set.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        let mut count: i64 = 0;
        for _ in self.set.evaluate_iterable(ev)? {
            ev.check()?;
            count += 1;
        }
        Ok(Value::Integer(count))
    }
}

/// `Sum(set [, numeric])`: nulls are skipped, the first error value is the
/// result
#[derive(Debug)]
pub struct SumCalc {
    set: CalcRef,
    value: Option<CalcRef>,
    data_type: DataType,
}

impl SumCalc {
    pub fn new(set: CalcRef, value: Option<CalcRef>) -> Self {
        Self {
            set,
            value,
            data_type: DataType::Numeric,
        }
    }
}

impl Calc for SumCalc {
    fn name(&self) -> &str {
        "Sum"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Scalar
    }

    fn children(&self) -> Vec<CalcRef> {
        std::iter::once(self.set.clone())
            .chain(self.value.iter().cloned())
            .collect()
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        let mut total: Option<Decimal> = None;
        for tuple in self.set.evaluate_iterable(ev)? {
            ev.check()?;
            let value = {
                let mut ev = ev.scoped();
                ev.set_context_tuple(&tuple);
                match &self.value {
                    Some(calc) => calc.evaluate(&mut ev)?,
                    None => ev.evaluate_current()?,
                }
            };
            match value {
                Value::Null => {}
                Value::Error(_) => return Ok(value),
                v => {
                    let Some(d) = v.as_decimal() else {
                        return Ok(Value::error(
                            olapcalc_diagnostics::OLAP0101,
                            format!("Cannot sum '{v}'"),
                        ));
                    };
                    match total.unwrap_or(Decimal::ZERO).checked_add(d) {
                        Some(sum) => total = Some(sum),
                        None => return Ok(Value::error(OLAP0100, "Arithmetic overflow")),
                    }
                }
            }
        }
        Ok(total.map_or(Value::Null, Value::Numeric))
    }

    /// The set masks its own hierarchies from the value expression
    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        self.set.depends_on(hierarchy)
            || (!self.set.data_type().uses_hierarchy(hierarchy, true)
                && self.value.as_ref().is_none_or(|v| v.depends_on(hierarchy)))
    }
}
