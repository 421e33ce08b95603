//! Name resolution and overload selection
//!
//! The validator turns an unresolved [`Exp`] into a typed [`Expr`]:
//! identifiers are resolved against query named sets and the catalog, and
//! every call is matched against the function table. Each resolved call
//! gets a [`CallId`] that is unique within the query; evaluation caches are
//! keyed by it.

use indexmap::{IndexMap, IndexSet};
use log::debug;
use olapcalc_ast::{Call, Exp, Identifier, Literal, Syntax};
use olapcalc_model::{Catalog, Element};
use olapcalc_types::{
    Category, Conversion, ConversionRules, DataType, DimensionId, HierarchyId, HierarchyList,
    LevelId, Member, Signature, Value,
};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{EvalError, EvalResult};
use crate::registry::{FunctionDef, FunctionKind, FunctionTable};

/// Identity of one resolved call within a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CallId(pub u32);

/// Allocator of [`CallId`]s, shared by everything compiled for one query
#[derive(Debug, Default)]
pub struct CallIdGen(AtomicU32);

impl CallIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> CallId {
        CallId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Query-level facts discovered during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryFlags {
    /// False once a cross join argument could be a measure at run time
    pub native_cross_join: bool,
}

impl Default for QueryFlags {
    fn default() -> Self {
        Self {
            native_cross_join: true,
        }
    }
}

/// A set defined with `AS`
#[derive(Debug)]
pub struct NamedSet {
    pub name: String,
    pub call_id: CallId,
    pub expr: Expr,
    pub data_type: DataType,
}

/// A call matched to a function definition
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    pub id: CallId,
    pub def: Arc<FunctionDef>,
    pub args: Vec<Expr>,
    pub data_type: DataType,
    /// Implicit conversions applied to the arguments
    pub conversions: Vec<Conversion>,
}

/// A resolved, typed expression
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value, DataType),
    Member(Member),
    Level(LevelId, HierarchyId),
    Hierarchy(HierarchyId),
    Dimension(DimensionId),
    /// Reserved word such as `DESC`
    Symbol(String),
    NamedSet(Arc<NamedSet>),
    Call(ResolvedCall),
}

impl Expr {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Literal(_, t) => t.clone(),
            Self::Member(m) => DataType::Member(Some(m.hierarchy())),
            Self::Level(_, h) => DataType::Level(Some(*h)),
            Self::Hierarchy(h) => DataType::Hierarchy(Some(*h)),
            Self::Dimension(d) => DataType::Dimension(Some(*d)),
            Self::Symbol(_) => DataType::Symbol,
            Self::NamedSet(ns) => ns.data_type.clone(),
            Self::Call(c) => c.data_type.clone(),
        }
    }

    pub fn as_call(&self) -> Option<&ResolvedCall> {
        match self {
            Self::Call(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

/// Resolves unresolved expressions for one query
pub struct Validator<'a> {
    catalog: &'a dyn Catalog,
    table: &'a FunctionTable,
    ids: &'a CallIdGen,
    rules: ConversionRules,
    named_sets: IndexMap<String, Arc<NamedSet>>,
    measures: IndexSet<Member>,
    flags: QueryFlags,
}

impl<'a> Validator<'a> {
    pub fn new(catalog: &'a dyn Catalog, table: &'a FunctionTable, ids: &'a CallIdGen) -> Self {
        Self {
            catalog,
            table,
            ids,
            rules: ConversionRules::new(),
            named_sets: IndexMap::new(),
            measures: IndexSet::new(),
            flags: QueryFlags::default(),
        }
    }

    /// Measures referenced so far, in first-seen order
    pub fn measures(&self) -> &IndexSet<Member> {
        &self.measures
    }

    pub fn flags(&self) -> QueryFlags {
        self.flags
    }

    pub fn named_set(&self, name: &str) -> Option<&Arc<NamedSet>> {
        self.named_sets.get(&name.to_ascii_lowercase())
    }

    pub fn resolve(&mut self, exp: &Exp) -> EvalResult<Expr> {
        match exp {
            Exp::Literal(l) => Ok(resolve_literal(l)),
            Exp::Id(id) => self.resolve_identifier(id),
            Exp::Call(call) => self.resolve_call(call),
        }
    }

    fn resolve_identifier(&mut self, id: &Identifier) -> EvalResult<Expr> {
        if id.is_simple() {
            if let Some(ns) = self.named_set(id.name()) {
                return Ok(Expr::NamedSet(ns.clone()));
            }
        }
        match self.catalog.lookup(&id.segments) {
            Some(Element::Member(m)) => {
                if m.is_measure() {
                    self.measures.insert(m.clone());
                }
                Ok(Expr::Member(m))
            }
            Some(Element::Level(l)) => {
                let info = self
                    .catalog
                    .level(l)
                    .ok_or_else(|| EvalError::unknown_identifier(id.to_string()))?;
                Ok(Expr::Level(l, info.hierarchy))
            }
            Some(Element::Hierarchy(h)) => Ok(Expr::Hierarchy(h)),
            Some(Element::Dimension(d)) => Ok(Expr::Dimension(d)),
            None if id.is_simple() => Ok(Expr::Symbol(id.name().to_string())),
            None => Err(EvalError::unknown_identifier(id.to_string())),
        }
    }

    fn resolve_call(&mut self, call: &Call) -> EvalResult<Expr> {
        if call.syntax == Syntax::Infix && call.name.eq_ignore_ascii_case("AS") {
            return self.resolve_alias(call);
        }
        let args = call
            .args
            .iter()
            .map(|a| self.resolve(a))
            .collect::<EvalResult<Vec<_>>>()?;
        self.resolve_function(&call.name, call.syntax, args)
    }

    /// `set AS name` registers the named set before resolving the call, so
    /// the alias resolver can match on the named-set reference.
    fn resolve_alias(&mut self, call: &Call) -> EvalResult<Expr> {
        let [set, alias] = call.args.as_slice() else {
            return Err(EvalError::InvalidAlias {
                message: format!("AS takes a set and a name, got {} arguments", call.args.len()),
            });
        };
        let Some(name) = alias.as_id().filter(|id| id.is_simple()) else {
            return Err(EvalError::InvalidAlias {
                message: format!("'{alias}' is not a simple name"),
            });
        };
        let set = self.resolve(set)?;
        let data_type = set.data_type().to_set().ok_or_else(|| EvalError::InvalidAlias {
            message: format!("'{}' is not a set", name.name()),
        })?;
        let named = Arc::new(NamedSet {
            name: name.name().to_string(),
            call_id: self.ids.next(),
            expr: set.clone(),
            data_type,
        });
        debug!("defined named set {}", named.name);
        self.named_sets
            .insert(named.name.to_ascii_lowercase(), named.clone());
        self.resolve_function(&call.name, call.syntax, vec![set, Expr::NamedSet(named)])
    }

    fn resolve_function(&mut self, name: &str, syntax: Syntax, args: Vec<Expr>) -> EvalResult<Expr> {
        let Some((def, conversions)) = self.table.resolve(name, syntax, &args, &self.rules) else {
            let candidates = self.table.lookup_any(name);
            if candidates.is_empty() {
                return Err(EvalError::UnknownFunction {
                    name: name.to_string(),
                });
            }
            let actual = Signature::new(
                syntax,
                Category::Unknown,
                args.iter().map(|a| a.data_type().category()).collect(),
            );
            return Err(EvalError::NoApplicableFunction {
                name: name.to_string(),
                signature: actual.describe(name),
                candidates: candidates.iter().map(|d| d.describe()).collect(),
            });
        };

        let data_type = result_type(def.kind, &def, &args, self.catalog)?;
        if matches!(def.kind, FunctionKind::CrossJoin | FunctionKind::NonEmptyCrossJoin) {
            let measures = self.catalog.measures_hierarchy();
            if args
                .iter()
                .any(|a| a.data_type().uses_hierarchy(measures, false))
            {
                debug!("{name}: argument may be a measure, native cross join disabled");
                self.flags.native_cross_join = false;
            }
        }
        let id = self.ids.next();
        debug!("resolved {} as {} ({:?})", name, def.describe(), id);
        Ok(Expr::Call(ResolvedCall {
            id,
            def,
            args,
            data_type,
            conversions,
        }))
    }
}

fn resolve_literal(literal: &Literal) -> Expr {
    match literal {
        Literal::Null => Expr::Literal(Value::Null, DataType::Null),
        Literal::Numeric(d) => Expr::Literal(Value::Numeric(*d), DataType::Numeric),
        Literal::Integer(i) => Expr::Literal(Value::Integer(*i), DataType::Integer),
        Literal::String(s) => Expr::Literal(Value::String(s.clone()), DataType::String),
        Literal::Logical(b) => Expr::Literal(Value::Logical(*b), DataType::Logical),
    }
}

/// Hierarchy of a member, level, hierarchy or single-hierarchy dimension
/// expression, when statically known
pub(crate) fn element_hierarchy(expr: &Expr, catalog: &dyn Catalog) -> Option<HierarchyId> {
    match expr.data_type() {
        DataType::Dimension(Some(d)) => {
            let info = catalog.dimension(d)?;
            match info.hierarchies.as_slice() {
                [h] => Some(*h),
                _ => None,
            }
        }
        t => t.hierarchy(),
    }
}

fn set_hierarchies(expr: &Expr, catalog: &dyn Catalog) -> EvalResult<HierarchyList> {
    let t = expr.data_type();
    match t.category() {
        Category::Level | Category::Hierarchy | Category::Dimension => {
            Ok(smallvec::smallvec![element_hierarchy(expr, catalog)])
        }
        _ => t
            .to_set()
            .map(|s| s.hierarchies())
            .ok_or_else(|| EvalError::type_mismatch("Set", t.to_string())),
    }
}

/// Static type of a call to `kind` with the given arguments
fn result_type(
    kind: FunctionKind,
    def: &FunctionDef,
    args: &[Expr],
    catalog: &dyn Catalog,
) -> EvalResult<DataType> {
    use FunctionKind as K;

    let t = match kind {
        K::Braces => {
            let mut hierarchies: Option<HierarchyList> = None;
            for arg in args {
                let hs = set_hierarchies(arg, catalog)?;
                match &mut hierarchies {
                    None => hierarchies = Some(hs),
                    Some(acc) if acc.len() != hs.len() => {
                        return Err(EvalError::ArityMismatch {
                            expected: acc.len(),
                            found: hs.len(),
                        });
                    }
                    Some(acc) => {
                        for (a, h) in acc.iter_mut().zip(hs) {
                            if *a != h {
                                *a = None;
                            }
                        }
                    }
                }
            }
            DataType::Set(hierarchies.unwrap_or_else(|| smallvec::smallvec![None]))
        }
        K::Tuple => {
            let hierarchies: HierarchyList =
                args.iter().map(|a| element_hierarchy(a, catalog)).collect();
            for (i, h) in hierarchies.iter().enumerate() {
                if let Some(h) = h {
                    if hierarchies[..i].contains(&Some(*h)) {
                        return Err(EvalError::hierarchy_mismatch(format!(
                            "tuple uses hierarchy {} more than once",
                            h.0
                        )));
                    }
                }
            }
            DataType::Tuple(hierarchies)
        }
        K::Grouping => args
            .first()
            .map_or(DataType::Unknown, Expr::data_type),
        K::Arithmetic(op) => {
            let all_integer = args.iter().all(|a| a.data_type() == DataType::Integer);
            if all_integer && op != crate::registry::ArithmeticOp::Divide {
                DataType::Integer
            } else {
                DataType::Numeric
            }
        }
        K::Negate => match args.first().map(Expr::data_type) {
            Some(DataType::Integer) => DataType::Integer,
            _ => DataType::Numeric,
        },
        K::Compare(_) => DataType::Logical,
        K::Members | K::Children => {
            DataType::member_set(args.first().and_then(|a| element_hierarchy(a, catalog)))
        }
        K::Parent | K::CurrentMember => {
            DataType::Member(args.first().and_then(|a| element_hierarchy(a, catalog)))
        }
        K::CrossJoin | K::NonEmptyCrossJoin => {
            let mut hierarchies = HierarchyList::new();
            for arg in args {
                hierarchies.extend(set_hierarchies(arg, catalog)?);
            }
            DataType::Set(hierarchies)
        }
        K::Order | K::Distinct | K::Hierarchize | K::Alias => {
            DataType::Set(set_hierarchies(&args[0], catalog)?)
        }
        K::Extract => {
            let source = set_hierarchies(&args[0], catalog)?;
            let mut hierarchies = HierarchyList::new();
            for arg in &args[1..] {
                let h = element_hierarchy(arg, catalog);
                if h.is_some() && source.iter().all(Option::is_some) && !source.contains(&h) {
                    return Err(EvalError::invalid_argument(
                        def.name.clone(),
                        format!("hierarchy {} is not in the set", describe_hierarchy(h, catalog)),
                    ));
                }
                hierarchies.push(h);
            }
            DataType::Set(hierarchies)
        }
        K::Rank | K::Count => DataType::Integer,
        K::Sum => DataType::Numeric,
    };
    Ok(t)
}

fn describe_hierarchy(h: Option<HierarchyId>, catalog: &dyn Catalog) -> String {
    h.and_then(|h| catalog.hierarchy(h))
        .map_or_else(|| "?".to_string(), |info| info.unique_name.clone())
}
