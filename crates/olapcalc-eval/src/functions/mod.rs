//! Built-in function implementations
//!
//! Each [`FunctionKind`] compiles to one node type. Arguments are compiled
//! to the category their signature declares; set arguments are compiled
//! in the result styles the function can consume.

pub mod arithmetic;
pub mod constant;
pub mod convert;
pub mod navigation;
pub mod sets;

use log::debug;
use olapcalc_types::{Category, HierarchyId};
use std::sync::Arc;

use crate::calc::{CalcRef, ResultStyle};
use crate::compiler::Compiler;
use crate::crossjoin::CrossJoinCalc;
use crate::error::{EvalError, EvalResult};
use crate::order::{Direction, OrderCalc};
use crate::rank::RankCalc;
use crate::registry::FunctionKind;
use crate::validator::{Expr, ResolvedCall, element_hierarchy};

const LIST: &[ResultStyle] = &[ResultStyle::List];
const SORTABLE: &[ResultStyle] = &[ResultStyle::MutableList, ResultStyle::List];
const SCAN: &[ResultStyle] = &[ResultStyle::Iterable, ResultStyle::List];

/// Compile a resolved call into its calculation node
pub(crate) fn compile_call(
    compiler: &Compiler<'_>,
    call: &ResolvedCall,
    styles: &[ResultStyle],
) -> EvalResult<CalcRef> {
    use FunctionKind as K;

    let def = &call.def;
    let args = &call.args;
    let t = call.data_type.clone();
    let arg = |i: usize| compiler.compile_as(&args[i], def.param_category(i));
    debug!("compiling {} as {}", def.describe(), t);

    let calc: CalcRef = match def.kind {
        K::Braces => {
            let sets = args
                .iter()
                .map(|a| compiler.compile_set(a, LIST))
                .collect::<EvalResult<Vec<_>>>()?;
            Arc::new(sets::BracesCalc::new(sets, t))
        }
        K::Tuple => {
            let members = args
                .iter()
                .map(|a| compiler.compile_as(a, Category::Member))
                .collect::<EvalResult<Vec<_>>>()?;
            Arc::new(navigation::TupleCalc::new(members, t))
        }
        K::Grouping => return compiler.compile_with(&args[0], styles),
        K::Arithmetic(op) => Arc::new(arithmetic::ArithmeticCalc::new(op, arg(0)?, arg(1)?, t)),
        K::Negate => Arc::new(arithmetic::NegateCalc::new(arg(0)?, t)),
        K::Compare(op) => Arc::new(arithmetic::ComparisonCalc::new(op, arg(0)?, arg(1)?)),

        K::Members if def.param_category(0) == Category::Level => Arc::new(
            convert::LevelMembersCalc::new(arg(0)?, element_hierarchy(&args[0], compiler.catalog())),
        ),
        K::Members => Arc::new(navigation::HierarchyMembersCalc::new(
            compiler.compile_as(&args[0], Category::Hierarchy)?,
            t,
        )),
        K::Children => Arc::new(navigation::ChildrenCalc::new(arg(0)?, t)),
        K::Parent => Arc::new(navigation::ParentCalc::new(arg(0)?, t)),
        K::CurrentMember => Arc::new(convert::CurrentMemberCalc::new(
            compiler.compile_as(&args[0], Category::Hierarchy)?,
            element_hierarchy(&args[0], compiler.catalog()),
        )),

        K::CrossJoin | K::NonEmptyCrossJoin => {
            let non_empty_only = def.kind == K::NonEmptyCrossJoin;
            let lazy = !non_empty_only && styles.contains(&ResultStyle::Iterable);
            let mut operands = Vec::with_capacity(args.len());
            for (i, a) in args.iter().enumerate() {
                let accepted = if lazy && i == 0 { SCAN } else { LIST };
                operands.push(compiler.compile_set(a, accepted)?);
            }
            Arc::new(CrossJoinCalc::new(
                call.id,
                operands,
                non_empty_only,
                lazy,
                compiler.catalog().measures_hierarchy(),
                t,
            ))
        }
        K::Order => compile_order(compiler, call)?,
        K::Rank => {
            let tuple = compiler.compile_as(&args[0], Category::Tuple)?;
            let set = compiler.compile_set(&args[1], LIST)?;
            let key = args
                .get(2)
                .map(|a| compiler.compile_as(a, Category::Numeric))
                .transpose()?;
            let mut dependencies = compiler.dependencies(&set);
            if let Some(key) = &key {
                let set_type = set.data_type();
                for h in compiler.dependencies(key) {
                    if !set_type.uses_hierarchy(h, true) && !dependencies.contains(&h) {
                        dependencies.push(h);
                    }
                }
            }
            Arc::new(RankCalc::new(call.id, tuple, set, key, dependencies))
        }
        K::Distinct => Arc::new(sets::DistinctCalc::new(compiler.compile_set(&args[0], LIST)?)),
        K::Extract => {
            let set = compiler.compile_set(&args[0], LIST)?;
            let hierarchies = args[1..]
                .iter()
                .map(|a| compiler.compile_as(a, Category::Hierarchy))
                .collect::<EvalResult<Vec<_>>>()?;
            Arc::new(sets::ExtractCalc::new(set, hierarchies, t))
        }
        K::Hierarchize => {
            let post = match args.get(1) {
                None => false,
                Some(flag) => match flag.as_symbol() {
                    Some(s) if s.eq_ignore_ascii_case("POST") => true,
                    _ => {
                        return Err(EvalError::invalid_argument(
                            "Hierarchize",
                            "the only allowed flag is POST",
                        ));
                    }
                },
            };
            Arc::new(sets::HierarchizeCalc::new(compiler.compile_set(&args[0], SORTABLE)?, post))
        }
        K::Count => Arc::new(sets::CountCalc::new(compiler.compile_set(&args[0], SCAN)?)),
        K::Sum => {
            let set = compiler.compile_set(&args[0], SCAN)?;
            let value = args
                .get(1)
                .map(|a| compiler.compile_as(a, Category::Numeric))
                .transpose()?;
            Arc::new(sets::SumCalc::new(set, value))
        }
        K::Alias => match &args[1] {
            named @ Expr::NamedSet(_) => compiler.compile(named)?,
            other => {
                return Err(EvalError::InvalidAlias {
                    message: format!("expected a set name, found {}", other.data_type()),
                });
            }
        },
    };
    Ok(calc)
}

/// `Order(set, key [, direction] [, key, direction ...])`
fn compile_order(compiler: &Compiler<'_>, call: &ResolvedCall) -> EvalResult<CalcRef> {
    let set = compiler.compile_set(&call.args[0], SORTABLE)?;
    let set_hierarchies: Vec<Option<HierarchyId>> =
        set.data_type().hierarchies().into_iter().collect();

    let mut keys: Vec<(CalcRef, Direction)> = Vec::new();
    for a in &call.args[1..] {
        if let Some(symbol) = a.as_symbol() {
            let direction = Direction::parse(symbol).ok_or_else(|| {
                EvalError::invalid_argument(
                    "Order",
                    format!("unknown direction '{symbol}', expected ASC, DESC, BASC or BDESC"),
                )
            })?;
            match keys.last_mut() {
                Some(last) => last.1 = direction,
                None => {
                    return Err(EvalError::invalid_argument("Order", "direction without a key"));
                }
            }
            continue;
        }
        keys.push((compiler.compile_as(a, Category::Value)?, Direction::Asc));
    }

    // A key that cannot vary with the sorted members orders nothing
    let known: Option<Vec<HierarchyId>> = set_hierarchies.iter().copied().collect();
    if let Some(known) = known {
        let before = keys.len();
        keys.retain(|(key, _)| known.iter().any(|h| key.depends_on(*h)));
        if keys.len() < before {
            debug!("Order: dropped {} constant sort key(s)", before - keys.len());
        }
    }

    let mut constant = Vec::new();
    if let [(key, _)] = keys.as_mut_slice() {
        let split = key.constant_context().filter(|(members, _)| {
            members
                .iter()
                .all(|m| !set_hierarchies.contains(&Some(m.hierarchy())))
        });
        if let Some((members, residual)) = split {
            debug!("Order: applying {} constant key member(s) once", members.len());
            constant = members;
            *key = residual;
        }
    }
    Ok(Arc::new(OrderCalc::new(set, keys, constant)))
}
