//! Implicit conversions and result-style adapters

use olapcalc_types::{Category, DataType, HierarchyId, Member, Tuple, TupleList, Value};
use olapcalc_diagnostics::OLAP0101;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::calc::{Calc, CalcRef, ResultShape, ResultStyle, TupleIterable, value_to_list};
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;

/// Cell value at the coordinate formed by member or tuple expressions
#[derive(Debug)]
pub struct TupleValueCalc {
    parts: Vec<CalcRef>,
    data_type: DataType,
}

impl TupleValueCalc {
    pub fn new(parts: Vec<CalcRef>) -> Self {
        Self {
            parts,
            data_type: DataType::Value,
        }
    }
}

impl Calc for TupleValueCalc {
    fn name(&self) -> &str {
        "CellValue"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Scalar
    }

    fn children(&self) -> Vec<CalcRef> {
        self.parts.clone()
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        // All parts see the outer context
        let mut members: SmallVec<[Member; 4]> = SmallVec::new();
        for part in &self.parts {
            match part.evaluate(ev)? {
                Value::Member(m) => members.push(m),
                Value::Tuple(t) => members.extend(t.iter().cloned()),
                Value::Null => return Ok(Value::Null),
                Value::Error(e) => return Ok(Value::Error(e)),
                other => return Err(EvalError::type_mismatch("Member", other.category().name())),
            }
        }
        let mut ev = ev.scoped();
        ev.set_context_tuple(&members);
        ev.evaluate_current()
    }

    /// A member fixed by one of the parts masks that hierarchy
    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        self.parts.iter().any(|p| p.depends_on(hierarchy))
            || !self
                .parts
                .iter()
                .any(|p| p.data_type().uses_hierarchy(hierarchy, true))
    }

    fn constant_context(&self) -> Option<(Vec<Member>, CalcRef)> {
        let mut constants = Vec::new();
        let mut variable = Vec::new();
        for part in &self.parts {
            match part.constant_value() {
                Some(Value::Member(m)) => constants.push(m.clone()),
                _ => variable.push(part.clone()),
            }
        }
        if constants.is_empty() {
            return None;
        }
        Some((constants, Arc::new(TupleValueCalc::new(variable))))
    }
}

/// Runtime coercion of a scalar to a narrower category
#[derive(Debug)]
pub struct ScalarConversionCalc {
    source: CalcRef,
    target: Category,
    data_type: DataType,
}

impl ScalarConversionCalc {
    /// Wrap `source` unless no coercion is needed
    pub fn wrap(source: CalcRef, target: Category) -> CalcRef {
        let data_type = match target {
            Category::Numeric => DataType::Numeric,
            Category::Integer => DataType::Integer,
            Category::Logical => DataType::Logical,
            Category::String => DataType::String,
            _ => return source,
        };
        Arc::new(Self {
            source,
            target,
            data_type,
        })
    }
}

/// Coerce one value; failures become error values
pub fn coerce(value: Value, target: Category) -> Value {
    let failed = |v: &Value| {
        Value::error(
            OLAP0101,
            format!("Cannot convert '{v}' to {}", target.name()),
        )
    };
    match (target, value) {
        (_, v @ (Value::Null | Value::Error(_))) => v,
        (Category::Numeric, v @ (Value::Numeric(_) | Value::Integer(_))) => v,
        (Category::Numeric | Category::Integer, Value::String(s)) => {
            match s.trim().parse::<Decimal>() {
                Ok(d) if target == Category::Numeric => Value::Numeric(d),
                Ok(d) => coerce(Value::Numeric(d), Category::Integer),
                Err(_) => failed(&Value::String(s)),
            }
        }
        (Category::Integer, v) => match v.as_i64() {
            Some(i) if !matches!(v, Value::Logical(_)) => Value::Integer(i),
            _ => failed(&v),
        },
        (Category::Numeric, v) => match v.as_decimal() {
            Some(d) => Value::Numeric(d),
            None => failed(&v),
        },
        (Category::Logical, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Value::Logical(true),
            "false" => Value::Logical(false),
            _ => failed(&Value::String(s)),
        },
        (Category::Logical, v) => match v.as_bool() {
            Some(b) => Value::Logical(b),
            None => failed(&v),
        },
        (Category::String, v @ Value::String(_)) => v,
        (Category::String, v) => Value::String(v.to_string()),
        (_, v) => v,
    }
}

impl Calc for ScalarConversionCalc {
    fn name(&self) -> &str {
        "Convert"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Scalar
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.source.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(coerce(self.source.evaluate(ev)?, self.target))
    }
}

#[derive(Debug)]
pub struct MemberToTupleCalc {
    member: CalcRef,
    data_type: DataType,
}

impl MemberToTupleCalc {
    pub fn new(member: CalcRef) -> Self {
        let data_type = DataType::Tuple(member.data_type().hierarchies());
        Self { member, data_type }
    }
}

impl Calc for MemberToTupleCalc {
    fn name(&self) -> &str {
        "MemberToTuple"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Tuple
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.member.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(match self.member.evaluate(ev)? {
            Value::Member(m) => Value::Tuple(Tuple::unit(m)),
            other => other,
        })
    }
}

/// `<hierarchy>.CurrentMember`
#[derive(Debug)]
pub struct CurrentMemberCalc {
    hierarchy: CalcRef,
    known: Option<HierarchyId>,
    data_type: DataType,
}

impl CurrentMemberCalc {
    pub fn new(hierarchy: CalcRef, known: Option<HierarchyId>) -> Self {
        Self {
            hierarchy,
            known,
            data_type: DataType::Member(known),
        }
    }
}

impl Calc for CurrentMemberCalc {
    fn name(&self) -> &str {
        "CurrentMember"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Member
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.hierarchy.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        match self.hierarchy.evaluate(ev)? {
            Value::Hierarchy(h) => Ok(ev
                .current_member(h)
                .cloned()
                .map_or(Value::Null, Value::Member)),
            other => Err(EvalError::type_mismatch("Hierarchy", other.category().name())),
        }
    }

    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        self.known.is_none_or(|h| h == hierarchy)
    }
}

/// A set holding one member or tuple
#[derive(Debug)]
pub struct UnitSetCalc {
    element: CalcRef,
    data_type: DataType,
}

impl UnitSetCalc {
    pub fn new(element: CalcRef) -> Self {
        let data_type = DataType::Set(element.data_type().hierarchies());
        Self { element, data_type }
    }
}

impl Calc for UnitSetCalc {
    fn name(&self) -> &str {
        "UnitSet"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::List
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.element.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        let arity = self.data_type.arity().unwrap_or(1);
        value_to_list(self.element.evaluate(ev)?, arity)
    }
}

/// Members of a level
#[derive(Debug)]
pub struct LevelMembersCalc {
    level: CalcRef,
    data_type: DataType,
}

impl LevelMembersCalc {
    pub fn new(level: CalcRef, hierarchy: Option<HierarchyId>) -> Self {
        Self {
            level,
            data_type: DataType::member_set(hierarchy),
        }
    }
}

impl Calc for LevelMembersCalc {
    fn name(&self) -> &str {
        "LevelMembers"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::List
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.level.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        match self.level.evaluate(ev)? {
            Value::Level(l) => Ok(TupleList::from_members(ev.catalog().level_members(l))),
            other => Err(EvalError::type_mismatch("Level", other.category().name())),
        }
    }
}

/// Top-level members of a hierarchy
#[derive(Debug)]
pub struct HierarchyRootsCalc {
    hierarchy: CalcRef,
    data_type: DataType,
}

impl HierarchyRootsCalc {
    pub fn new(hierarchy: CalcRef, known: Option<HierarchyId>) -> Self {
        Self {
            hierarchy,
            data_type: DataType::member_set(known),
        }
    }
}

impl Calc for HierarchyRootsCalc {
    fn name(&self) -> &str {
        "HierarchyRoots"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::List
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.hierarchy.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        match self.hierarchy.evaluate(ev)? {
            Value::Hierarchy(h) => Ok(TupleList::from_members(ev.catalog().root_members(h))),
            other => Err(EvalError::type_mismatch("Hierarchy", other.category().name())),
        }
    }
}

/// Presents a set node in another result style
#[derive(Debug)]
pub struct StyleAdapter {
    inner: CalcRef,
    style: ResultStyle,
}

/// Adapt a set node to `style`
pub fn adapt(inner: CalcRef, style: ResultStyle) -> CalcRef {
    Arc::new(StyleAdapter { inner, style })
}

impl Calc for StyleAdapter {
    fn name(&self) -> &str {
        match (self.inner.shape(), self.style) {
            (ResultShape::Iterable, _) => "Materialize",
            (_, ResultStyle::MutableList) => "CopyList",
            (_, ResultStyle::Iterable) => "IterableView",
            _ => "ListView",
        }
    }

    fn data_type(&self) -> &DataType {
        self.inner.data_type()
    }

    fn shape(&self) -> ResultShape {
        self.style.shape()
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.inner.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        if self.inner.shape() == ResultShape::Iterable {
            let iterable = self.inner.evaluate_iterable(ev)?;
            return ev.materialize(iterable);
        }
        let list = self.inner.evaluate_list(ev)?;
        if self.style == ResultStyle::MutableList && !list.is_exclusive() {
            return Ok(TupleList::from_tuples(list.arity(), list.tuples().to_vec())?);
        }
        Ok(list)
    }

    fn evaluate_iterable(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleIterable> {
        self.inner.evaluate_iterable(ev)
    }

    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        self.inner.depends_on(hierarchy)
    }
}
