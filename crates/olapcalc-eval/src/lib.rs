//! olapcalc evaluation engine
//!
//! This crate turns unresolved expressions into executable calculation
//! trees and evaluates them against a metadata catalog and a cell reader:
//!
//! - **Resolution**: overload selection over a closed registry of built-in
//!   functions, with implicit conversions between argument categories
//! - **Compilation**: a tree of [`Calc`] nodes, each declaring the shape of
//!   its result; set arguments are compiled in the cheapest result style the
//!   consumer accepts
//! - **Evaluation**: an [`Evaluator`] holding the current member of every
//!   hierarchy, with savepoints that unwind context changes on every exit
//! - **Set algebra**: cross joins (with a non-empty optimizer), ordering,
//!   ranking, projection and aggregation
//!
//! # Example
//!
//! ```ignore
//! use olapcalc_eval::Statement;
//! use olapcalc_ast::{Axis, Exp, Query};
//!
//! let statement = Statement::new(catalog, reader)?;
//! let query = Query::new(vec![Axis::non_empty(Exp::property(
//!     Exp::id("[Product]"),
//!     "Members",
//! ))]);
//! let result = statement.execute(&query)?;
//! ```
//!
//! # Architecture
//!
//! - `registry`: function definitions and overload resolution
//! - `validator`: name resolution, `CallId` allocation, named sets
//! - `compiler`: conversion of resolved expressions into `Calc` trees
//! - `functions`: the node types of the built-in functions
//! - `evaluator` and `scope`: evaluation context and per-query state
//! - `crossjoin`, `order`, `rank`: the set engines
//! - `statement`: query execution

pub mod cache;
pub mod calc;
pub mod compiler;
pub mod config;
pub mod crossjoin;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod order;
pub mod rank;
pub mod registry;
pub mod scope;
pub mod statement;
pub mod validator;

// Re-export main types
pub use cache::{CacheDescriptor, CacheEntry, CacheKey, CacheKind};
pub use calc::{Calc, CalcRef, PlanNode, ResultShape, ResultStyle, TupleIterable};
pub use compiler::Compiler;
pub use config::EngineConfig;
pub use crossjoin::{CrossJoinCalc, MeasureDiscovery};
pub use error::{ErrorClass, EvalError, EvalResult};
pub use evaluator::{Evaluator, Savepoint, ScopedEvaluator};
pub use order::{Direction, OrderCalc};
pub use rank::{RankCalc, Ranking};
pub use registry::{FunctionDef, FunctionKind, FunctionTable, Resolver, StructuralResolver};
pub use scope::{Execution, QueryScope};
pub use statement::{QueryPlan, QueryResult, Statement};
pub use validator::{CallId, CallIdGen, Expr, QueryFlags, ResolvedCall, Validator};
