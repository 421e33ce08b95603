//! Compilation of resolved expressions into calculation trees

use log::debug;
use olapcalc_model::Catalog;
use olapcalc_types::{Category, DataType, HierarchyId, Value};
use std::sync::Arc;

use crate::calc::{CalcRef, ResultStyle};
use crate::error::{EvalError, EvalResult};
use crate::functions::{self, constant::ConstantCalc, convert, sets::NamedSetCalc};
use crate::validator::{Expr, element_hierarchy};

pub struct Compiler<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> Compiler<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a dyn Catalog {
        self.catalog
    }

    /// Hierarchies the context can vary on
    pub fn hierarchy_ids(&self) -> impl Iterator<Item = HierarchyId> + '_ {
        self.catalog.hierarchies().iter().map(|h| h.id)
    }

    /// Hierarchies `calc` depends on
    pub fn dependencies(&self, calc: &CalcRef) -> Vec<HierarchyId> {
        self.hierarchy_ids().filter(|h| calc.depends_on(*h)).collect()
    }

    /// Compile in the expression's own representation
    pub fn compile(&self, expr: &Expr) -> EvalResult<CalcRef> {
        self.compile_with(expr, &[ResultStyle::List])
    }

    pub(crate) fn compile_with(&self, expr: &Expr, styles: &[ResultStyle]) -> EvalResult<CalcRef> {
        let t = expr.data_type();
        let calc: CalcRef = match expr {
            Expr::Literal(v, _) => Arc::new(ConstantCalc::new(v.clone(), t)),
            Expr::Member(m) => Arc::new(ConstantCalc::new(Value::Member(m.clone()), t)),
            Expr::Level(l, _) => Arc::new(ConstantCalc::new(Value::Level(*l), t)),
            Expr::Hierarchy(h) => Arc::new(ConstantCalc::new(Value::Hierarchy(*h), t)),
            Expr::Dimension(d) => Arc::new(ConstantCalc::new(Value::Dimension(*d), t)),
            Expr::Symbol(s) => Arc::new(ConstantCalc::new(Value::Symbol(s.clone()), t)),
            Expr::NamedSet(ns) => {
                let inner = self.compile_set(&ns.expr, &[ResultStyle::List])?;
                let dependencies = self.dependencies(&inner);
                Arc::new(NamedSetCalc::new(ns.name.clone(), ns.call_id, inner, dependencies))
            }
            Expr::Call(call) => functions::compile_call(self, call, styles)?,
        };
        Ok(calc)
    }

    /// Compile `expr` converted to `category`
    pub fn compile_as(&self, expr: &Expr, category: Category) -> EvalResult<CalcRef> {
        let t = expr.data_type();
        let source = t.category();
        if source == category || matches!(category, Category::Unknown | Category::Empty) {
            return self.compile(expr);
        }
        let calc: CalcRef = match (source, category) {
            (Category::Null, _) => Arc::new(ConstantCalc::new(Value::Null, DataType::Null)),
            (Category::Unknown | Category::Empty, _) => self.compile(expr)?,

            (_, Category::Set) => return self.compile_set(expr, &[ResultStyle::List]),
            (Category::Member, Category::Tuple) => {
                Arc::new(convert::MemberToTupleCalc::new(self.compile(expr)?))
            }
            (Category::Hierarchy | Category::Dimension, Category::Member) => {
                let hierarchy = self.compile_as(expr, Category::Hierarchy)?;
                Arc::new(convert::CurrentMemberCalc::new(
                    hierarchy,
                    element_hierarchy(expr, self.catalog),
                ))
            }
            (Category::Dimension, Category::Hierarchy) => self.dimension_hierarchy(expr)?,

            (Category::Member | Category::Tuple, target) if target.is_scalar() => {
                let value = self.tuple_value(expr)?;
                convert::ScalarConversionCalc::wrap(value, target)
            }
            (s, Category::Value) if s.is_scalar() => self.compile(expr)?,
            (Category::Integer, Category::Numeric) => self.compile(expr)?,
            (
                Category::Numeric | Category::Integer | Category::Value,
                Category::Logical | Category::Numeric | Category::String,
            ) => convert::ScalarConversionCalc::wrap(self.compile(expr)?, category),
            _ => return Err(EvalError::type_mismatch(category.name(), t.to_string())),
        };
        Ok(calc)
    }

    /// Cell value at a member or tuple. Tuple constructors are split into
    /// their member expressions so constant members can be recognized.
    fn tuple_value(&self, expr: &Expr) -> EvalResult<CalcRef> {
        let parts = match expr.as_call() {
            Some(call) if call.def.kind == crate::registry::FunctionKind::Tuple => call
                .args
                .iter()
                .map(|a| self.compile_as(a, Category::Member))
                .collect::<EvalResult<Vec<_>>>()?,
            _ => vec![self.compile(expr)?],
        };
        Ok(Arc::new(convert::TupleValueCalc::new(parts)))
    }

    fn dimension_hierarchy(&self, expr: &Expr) -> EvalResult<CalcRef> {
        let Expr::Dimension(d) = expr else {
            return Err(EvalError::type_mismatch("Hierarchy", expr.data_type().to_string()));
        };
        let hierarchy = self
            .catalog
            .dimension(*d)
            .and_then(|info| info.hierarchies.first().copied())
            .ok_or_else(|| EvalError::internal(format!("dimension {} has no hierarchy", d.0)))?;
        Ok(Arc::new(ConstantCalc::new(
            Value::Hierarchy(hierarchy),
            DataType::Hierarchy(Some(hierarchy)),
        )))
    }

    /// Compile a set expression in one of the `accepted` styles.
    ///
    /// The function's own representation is used when it is accepted;
    /// otherwise the cheapest accepted style reachable by an adapter is
    /// chosen, preferring iterable, then list, then mutable list.
    pub fn compile_set(&self, expr: &Expr, accepted: &[ResultStyle]) -> EvalResult<CalcRef> {
        let t = expr.data_type();
        let wanted: Vec<ResultStyle> = ResultStyle::PREFERENCE
            .into_iter()
            .filter(|s| accepted.contains(s))
            .collect();
        if wanted.is_empty() || t.to_set().is_none() {
            return Err(EvalError::UnsupportedResultStyle {
                function: describe(expr),
                accepted: format!("{accepted:?}"),
            });
        }

        let calc = match t.category() {
            Category::Set => self.compile_with(expr, &wanted)?,
            Category::Member | Category::Tuple => {
                let element = if t.category() == Category::Member {
                    self.compile(expr)?
                } else {
                    self.compile_as(expr, Category::Tuple)?
                };
                Arc::new(convert::UnitSetCalc::new(element)) as CalcRef
            }
            Category::Level => Arc::new(convert::LevelMembersCalc::new(
                self.compile(expr)?,
                element_hierarchy(expr, self.catalog),
            )),
            Category::Hierarchy | Category::Dimension => Arc::new(convert::HierarchyRootsCalc::new(
                self.compile_as(expr, Category::Hierarchy)?,
                element_hierarchy(expr, self.catalog),
            )),
            _ => return Err(EvalError::type_mismatch("Set", t.to_string())),
        };

        let native = calc.shape().style();
        if wanted.contains(&native) {
            return Ok(calc);
        }
        let style = wanted[0];
        debug!("{}: adapting {:?} result to {:?}", calc.name(), native, style);
        Ok(convert::adapt(calc, style))
    }

    /// Compile a scalar expression
    pub fn compile_scalar(&self, expr: &Expr) -> EvalResult<CalcRef> {
        self.compile_as(expr, Category::Value)
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Call(c) => c.def.name.clone(),
        other => other.data_type().to_string(),
    }
}
