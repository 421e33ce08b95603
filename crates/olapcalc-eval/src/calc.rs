//! Compiled calculation tree
//!
//! A [`Calc`] is a node of the executable plan. Every node declares the
//! [`ResultShape`] of what it produces; set-valued nodes can be asked for a
//! random-access [`TupleList`] or a single-pass [`TupleIterable`].

use olapcalc_types::{DataType, HierarchyId, Member, Tuple, TupleList, Value};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;

pub type CalcRef = Arc<dyn Calc>;

/// What a compiled node produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultShape {
    Scalar,
    Member,
    Tuple,
    /// Single-pass set
    Iterable,
    /// Random-access immutable set
    List,
    /// Random-access set owned by the caller
    MutableList,
    /// Level, hierarchy, dimension or symbol
    Element,
}

impl ResultShape {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Iterable | Self::List | Self::MutableList)
    }

    /// The result style this shape satisfies directly
    pub fn style(&self) -> ResultStyle {
        match self {
            Self::Iterable => ResultStyle::Iterable,
            Self::List => ResultStyle::List,
            Self::MutableList => ResultStyle::MutableList,
            _ => ResultStyle::Value,
        }
    }
}

/// A representation a caller can accept from a set expression, in order of
/// preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultStyle {
    Iterable,
    List,
    MutableList,
    Value,
}

impl ResultStyle {
    /// Set styles from cheapest to most expensive
    pub const PREFERENCE: [ResultStyle; 3] = [Self::Iterable, Self::List, Self::MutableList];

    pub fn shape(&self) -> ResultShape {
        match self {
            Self::Iterable => ResultShape::Iterable,
            Self::List => ResultShape::List,
            Self::MutableList => ResultShape::MutableList,
            Self::Value => ResultShape::Scalar,
        }
    }
}

/// Single-pass sequence of tuples of one arity
pub struct TupleIterable {
    arity: usize,
    iter: Box<dyn Iterator<Item = Tuple> + Send>,
}

impl TupleIterable {
    pub fn new(arity: usize, iter: impl Iterator<Item = Tuple> + Send + 'static) -> Self {
        Self {
            arity,
            iter: Box::new(iter),
        }
    }

    /// Iterate an existing list without copying it
    pub fn from_list(list: TupleList) -> Self {
        let arity = list.arity();
        let len = list.len();
        Self::new(
            arity,
            (0..len).filter_map(move |i| list.get(i).cloned()),
        )
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn into_inner(self) -> Box<dyn Iterator<Item = Tuple> + Send> {
        self.iter
    }
}

impl Iterator for TupleIterable {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        self.iter.next()
    }
}

impl fmt::Debug for TupleIterable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleIterable").field("arity", &self.arity).finish()
    }
}

/// A compiled expression
pub trait Calc: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn data_type(&self) -> &DataType;

    fn shape(&self) -> ResultShape;

    fn children(&self) -> Vec<CalcRef> {
        Vec::new()
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value>;

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        let arity = self.data_type().arity().unwrap_or(1);
        value_to_list(self.evaluate(ev)?, arity)
    }

    fn evaluate_iterable(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleIterable> {
        Ok(TupleIterable::from_list(self.evaluate_list(ev)?))
    }

    /// Whether the result can change when the current member of
    /// `hierarchy` changes. Nodes without children are assumed dependent
    /// unless they say otherwise.
    fn depends_on(&self, hierarchy: HierarchyId) -> bool {
        let children = self.children();
        children.is_empty() || children.iter().any(|c| c.depends_on(hierarchy))
    }

    /// The value of a node that ignores the evaluation context
    fn constant_value(&self) -> Option<&Value> {
        None
    }

    /// Split into members that can be set once and a residual node to
    /// evaluate per element
    fn constant_context(&self) -> Option<(Vec<Member>, CalcRef)> {
        None
    }
}

/// View any set-like value as a tuple list
pub fn value_to_list(value: Value, arity: usize) -> EvalResult<TupleList> {
    match value {
        Value::Set(list) => Ok(list),
        Value::Member(m) => Ok(TupleList::from_members([m])),
        Value::Tuple(t) => Ok(TupleList::from_tuples(t.arity(), vec![t])?),
        Value::Null => Ok(TupleList::new(arity)),
        other => Err(EvalError::type_mismatch("Set", other.category().name())),
    }
}

/// View any member-like value as a tuple; `None` for the null member
pub fn value_to_tuple(value: Value) -> EvalResult<Option<Tuple>> {
    match value {
        Value::Tuple(t) => Ok(Some(t)),
        Value::Member(m) => Ok(Some(Tuple::unit(m))),
        Value::Null => Ok(None),
        other => Err(EvalError::type_mismatch("Tuple", other.category().name())),
    }
}

/// Explain tree of a compiled plan
#[derive(Debug, Clone, Serialize)]
pub struct PlanNode {
    pub name: String,
    pub data_type: String,
    pub shape: ResultShape,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn from_calc(calc: &CalcRef) -> Self {
        Self {
            name: calc.name().to_string(),
            data_type: calc.data_type().to_string(),
            shape: calc.shape(),
            children: calc.children().iter().map(Self::from_calc).collect(),
        }
    }

    /// Indented text rendering, one node per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("{} : {} [{:?}]\n", self.name, self.data_type, self.shape));
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}
