//! Statement execution
//!
//! A [`Statement`] binds a catalog, a cell reader, an [`EngineConfig`] and a
//! function table. Each execution validates and compiles the query, builds
//! a fresh [`QueryScope`], evaluates the axes and then the cell grid.

use indexmap::IndexSet;
use log::{debug, info};
use olapcalc_ast::{Exp, Query};
use olapcalc_model::{Catalog, CellReader};
use olapcalc_types::{Category, Member, Tuple, TupleList, Value, product_size};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::calc::{CalcRef, PlanNode, ResultStyle, value_to_tuple};
use crate::compiler::Compiler;
use crate::config::EngineConfig;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::registry::FunctionTable;
use crate::scope::QueryScope;
use crate::validator::{CallIdGen, QueryFlags, Validator};

/// Result of executing a query.
///
/// Cells are stored with the first axis varying fastest.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub axes: Vec<TupleList>,
    pub cells: Vec<Value>,
}

impl QueryResult {
    /// The cell at one position per axis
    pub fn cell(&self, coordinates: &[usize]) -> Option<&Value> {
        if coordinates.len() != self.axes.len() {
            return None;
        }
        let mut index = 0;
        let mut stride = 1;
        for (position, axis) in coordinates.iter().zip(&self.axes) {
            if *position >= axis.len() {
                return None;
            }
            index += position * stride;
            stride *= axis.len();
        }
        self.cells.get(index)
    }
}

/// Compiled plan of a query, for display
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub axes: Vec<PlanNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slicer: Option<PlanNode>,
    pub flags: QueryFlags,
}

impl QueryPlan {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, axis) in self.axes.iter().enumerate() {
            out.push_str(&format!("Axis {i}:\n"));
            out.push_str(&axis.render());
        }
        if let Some(slicer) = &self.slicer {
            out.push_str("Slicer:\n");
            out.push_str(&slicer.render());
        }
        if !self.flags.native_cross_join {
            out.push_str("Native cross join: disabled (an argument may be a measure)\n");
        }
        out
    }
}

struct Prepared {
    axes: Vec<(CalcRef, bool)>,
    slicer: Option<CalcRef>,
    measures: IndexSet<Member>,
    flags: QueryFlags,
    ids: Arc<CallIdGen>,
}

pub struct Statement {
    catalog: Arc<dyn Catalog>,
    reader: Arc<dyn CellReader>,
    config: EngineConfig,
    table: Arc<FunctionTable>,
    cancel: Arc<AtomicBool>,
}

impl Statement {
    pub fn new(catalog: Arc<dyn Catalog>, reader: Arc<dyn CellReader>) -> EvalResult<Self> {
        Ok(Self {
            catalog,
            reader,
            config: EngineConfig::default(),
            table: FunctionTable::standard()?,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_function_table(mut self, table: Arc<FunctionTable>) -> Self {
        self.table = table;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn function_table(&self) -> &FunctionTable {
        &self.table
    }

    /// Flag that cancels the running execution when set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn prepare(&self, query: &Query) -> EvalResult<Prepared> {
        let ids = Arc::new(CallIdGen::new());
        let catalog = self.catalog.as_ref();
        let mut validator = Validator::new(catalog, &self.table, &ids);
        let compiler = Compiler::new(catalog);

        let mut axes = Vec::with_capacity(query.axes.len());
        for axis in &query.axes {
            let expr = validator.resolve(&axis.set)?;
            axes.push((compiler.compile_set(&expr, &[ResultStyle::List])?, axis.non_empty));
        }
        let slicer = match &query.slicer {
            Some(exp) => {
                let expr = validator.resolve(exp)?;
                Some(compiler.compile_as(&expr, Category::Tuple)?)
            }
            None => None,
        };
        Ok(Prepared {
            axes,
            slicer,
            measures: validator.measures().clone(),
            flags: validator.flags(),
            ids,
        })
    }

    fn scope(&self, prepared: &Prepared) -> QueryScope {
        QueryScope::new(
            self.catalog.clone(),
            self.reader.clone(),
            self.config.clone(),
            self.table.clone(),
            prepared.ids.clone(),
            self.cancel.clone(),
        )
        .with_measures(prepared.measures.clone())
    }

    /// Compile a query without executing it
    pub fn explain(&self, query: &Query) -> EvalResult<QueryPlan> {
        let prepared = self.prepare(query)?;
        Ok(QueryPlan {
            axes: prepared.axes.iter().map(|(c, _)| PlanNode::from_calc(c)).collect(),
            slicer: prepared.slicer.as_ref().map(PlanNode::from_calc),
            flags: prepared.flags,
        })
    }

    pub fn execute(&self, query: &Query) -> EvalResult<QueryResult> {
        self.cancel.store(false, Ordering::Relaxed);
        let prepared = self.prepare(query)?;
        let scope = self.scope(&prepared);
        let mut ev = Evaluator::new(&scope)?;

        if let Some(slicer) = &prepared.slicer {
            if let Some(tuple) = value_to_tuple(slicer.evaluate(&mut ev)?)? {
                debug!("slicer {tuple}");
                ev.set_context_tuple(&tuple);
            }
        }

        let mut axes = Vec::with_capacity(prepared.axes.len());
        for (calc, non_empty) in &prepared.axes {
            let mut ev = ev.scoped();
            ev.set_non_empty(*non_empty);
            axes.push(calc.evaluate_list(&mut ev)?);
        }
        for i in 0..axes.len() {
            if prepared.axes[i].1 {
                let before = axes[i].len();
                axes[i] = non_empty_axis(&mut ev, &axes, i)?;
                debug!("axis {i}: NON EMPTY kept {} of {before}", axes[i].len());
            }
        }

        let cells = evaluate_cells(&mut ev, &axes)?;
        info!(
            "executed query: {} cell(s), {} iteration(s), {} cache entries",
            cells.len(),
            scope.execution().iterations(),
            scope.cache_len()
        );
        Ok(QueryResult { axes, cells })
    }

    /// Evaluate a single expression at the default coordinates
    pub fn evaluate_expression(&self, exp: &Exp) -> EvalResult<Value> {
        self.cancel.store(false, Ordering::Relaxed);
        let ids = Arc::new(CallIdGen::new());
        let mut validator = Validator::new(self.catalog.as_ref(), &self.table, &ids);
        let expr = validator.resolve(exp)?;
        let calc = Compiler::new(self.catalog.as_ref()).compile(&expr)?;
        let prepared = Prepared {
            axes: Vec::new(),
            slicer: None,
            measures: validator.measures().clone(),
            flags: validator.flags(),
            ids,
        };
        let scope = self.scope(&prepared);
        let mut ev = Evaluator::new(&scope)?;
        calc.evaluate(&mut ev)
    }
}

/// Tuples of axis `index` with a non-empty cell for some tuple of the
/// other axes
fn non_empty_axis(ev: &mut Evaluator<'_>, axes: &[TupleList], index: usize) -> EvalResult<TupleList> {
    let others: Vec<&TupleList> = axes
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != index)
        .map(|(_, a)| a)
        .collect();
    let axis = &axes[index];
    let mut kept = TupleList::with_capacity(axis.arity(), axis.len());
    for tuple in axis {
        ev.check()?;
        let mut ev = ev.scoped();
        ev.set_context_tuple(tuple);
        if row_non_empty(&mut ev, &others)? {
            kept.push(tuple.clone())?;
        }
    }
    Ok(kept)
}

fn row_non_empty(ev: &mut Evaluator<'_>, others: &[&TupleList]) -> EvalResult<bool> {
    let Some((first, rest)) = others.split_first() else {
        return Ok(!cell(ev)?.is_empty_cell());
    };
    for tuple in first.iter() {
        ev.check()?;
        let mut ev = ev.scoped();
        ev.set_context_tuple(tuple);
        if row_non_empty(&mut ev, rest)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Value of the current cell. Recoverable failures become error values;
/// resource limits abort the statement.
fn cell(ev: &mut Evaluator<'_>) -> EvalResult<Value> {
    match ev.evaluate_current() {
        Ok(v) => Ok(v),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            debug!("cell failed: {e}");
            Ok(Value::Error(e.to_cell_error()))
        }
    }
}

fn evaluate_cells(ev: &mut Evaluator<'_>, axes: &[TupleList]) -> EvalResult<Vec<Value>> {
    let size = product_size(axes, ev.config().result_limit)?;
    let mut cells = Vec::with_capacity(size);
    let mut coordinates: Vec<&Tuple> = Vec::with_capacity(axes.len());
    for n in 0..size {
        ev.check()?;
        coordinates.clear();
        let mut rest = n;
        for axis in axes {
            let Some(tuple) = axis.get(rest % axis.len()) else {
                return Err(EvalError::internal("cell position outside its axis"));
            };
            coordinates.push(tuple);
            rest /= axis.len();
        }
        let mut ev = ev.scoped();
        for tuple in &coordinates {
            ev.set_context_tuple(tuple);
        }
        cells.push(cell(&mut ev)?);
    }
    Ok(cells)
}
